//! Diffusion recipes built on top of the propagation operators.
use log::{debug, info};
use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::algos::normalize::Normalization;
use crate::algos::propagation::{appnp, diffuse_powers, power, simple, Diffuser};
use crate::algos::propagation::{DEFAULT_ALPHA, DEFAULT_ITERATIONS};
use crate::cache::AdjacencyCache;
use crate::error::{DiffusionError, Result};
use crate::graph::AdjacencyMatrix;
use crate::progress::CLProgressBar;

pub trait Diffusion {
    /// Number of output feature columns for `in_features` input columns.
    fn num_features(&self, in_features: usize) -> usize;

    /// Diffuses `x` over `adj`, reusing derived matrices held by `cache`.
    fn propagate_cached<'a>(
        &self,
        adj: &'a AdjacencyMatrix,
        x: ArrayView2<f32>,
        cache: &mut AdjacencyCache<'a>,
    ) -> Result<Array2<f32>>;

    /// Diffuses `x` over `adj` with a cache local to this call.
    fn propagate(&self, adj: &AdjacencyMatrix, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut cache = AdjacencyCache::new();
        self.propagate_cached(adj, x, &mut cache)
    }
}

/// SGC style diffusion: `k` hops over the GCN normalized adjacency.
#[derive(Clone, Debug)]
pub struct SimpleGcnDiffusion {
    k: usize,
}

impl SimpleGcnDiffusion {
    pub fn new(k: usize) -> Self {
        SimpleGcnDiffusion { k }
    }

    /// Number of propagation hops.
    pub fn hops(&self) -> usize {
        self.k
    }
}

impl Diffusion for SimpleGcnDiffusion {
    fn num_features(&self, in_features: usize) -> usize {
        in_features
    }

    fn propagate_cached<'a>(
        &self,
        adj: &'a AdjacencyMatrix,
        x: ArrayView2<f32>,
        cache: &mut AdjacencyCache<'a>,
    ) -> Result<Array2<f32>> {
        debug!("GCN diffusion with k={} over {} nodes", self.k, adj.dim());
        let adj_gcn = cache.normalized(adj, Normalization::Gcn);
        power(&adj_gcn, self.k).diffuse(x)
    }
}

/// SIGN diffusion.  Concatenates every intermediate step of up to three
/// branches: simple propagation (`s` steps), personalized PageRank (`p`
/// steps) and simple propagation over the triangle adjacency (`t` steps).
#[derive(Clone, Debug)]
pub struct SignDiffusion {
    s: usize,
    p: usize,
    t: usize,
    s_norm: Normalization,
    p_norm: Normalization,
    t_norm: Normalization,

    /// Teleport probability of the PageRank branch
    alpha: f32,

    /// Fixed-point iterations of the PageRank branch
    iterations: usize,

    progress: bool,
}

impl SignDiffusion {
    /// Creates the recipe with GCN normalization for the simple branch and
    /// random-walk normalization for the other two.
    pub fn new(s: usize, p: usize, t: usize) -> Result<Self> {
        if s + p + t < 1 {
            return Err(DiffusionError::NoBranches { s, p, t });
        }

        Ok(SignDiffusion {
            s,
            p,
            t,
            s_norm: Normalization::Gcn,
            p_norm: Normalization::RandomWalk,
            t_norm: Normalization::RandomWalk,
            alpha: DEFAULT_ALPHA,
            iterations: DEFAULT_ITERATIONS,
            progress: false,
        })
    }

    pub fn with_norms(mut self, s_norm: Normalization, p_norm: Normalization, t_norm: Normalization) -> Self {
        self.s_norm = s_norm;
        self.p_norm = p_norm;
        self.t_norm = t_norm;
        self
    }

    pub fn with_ppr(mut self, alpha: f32, iterations: usize) -> Self {
        self.alpha = alpha;
        self.iterations = iterations;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Total number of diffusion steps across branches.
    pub fn branches(&self) -> usize {
        self.s + self.p + self.t
    }
}

fn collect_powers<D: Diffuser + ?Sized>(
    diffuser: &D,
    x: ArrayView2<f32>,
    k: usize,
    pb: &CLProgressBar,
    outputs: &mut Vec<Array2<f32>>,
) -> Result<()> {
    for step in diffuse_powers(diffuser, x.to_owned(), k) {
        outputs.push(step?);
        pb.inc(1);
    }
    Ok(())
}

impl Diffusion for SignDiffusion {
    fn num_features(&self, in_features: usize) -> usize {
        self.branches() * in_features
    }

    fn propagate_cached<'a>(
        &self,
        adj: &'a AdjacencyMatrix,
        x: ArrayView2<f32>,
        cache: &mut AdjacencyCache<'a>,
    ) -> Result<Array2<f32>> {
        adj.check_features(x.nrows())?;
        info!(
            "SIGN diffusion (s={}, p={}, t={}) over {} nodes with {} features",
            self.s,
            self.p,
            self.t,
            adj.dim(),
            x.ncols()
        );

        let pb = CLProgressBar::new(self.branches() as u64, self.progress);
        let mut outputs = Vec::with_capacity(self.branches());

        if self.s > 0 {
            pb.set_message("simple");
            let adj_s = cache.normalized(adj, self.s_norm);
            collect_powers(&simple(&adj_s), x, self.s, &pb, &mut outputs)?;
        }

        if self.p > 0 {
            pb.set_message("ppr");
            let adj_p = cache.normalized(adj, self.p_norm);
            let ppr = appnp(&adj_p, self.alpha, self.iterations);
            collect_powers(&ppr, x, self.p, &pb, &mut outputs)?;
        }

        if self.t > 0 {
            pb.set_message("triangle");
            let adj_t = cache.normalized_triangle(adj, false, self.t_norm);
            collect_powers(&simple(&adj_t), x, self.t, &pb, &mut outputs)?;
        }
        pb.finish();

        let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
        Ok(concatenate(Axis(1), &views)?)
    }
}
