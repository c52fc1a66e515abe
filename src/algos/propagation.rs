//! Propagation operators.  Each operator closes over one adjacency matrix and
//! maps a node feature matrix to its diffused counterpart, one feature column
//! at a time.
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::Result;
use crate::graph::AdjacencyMatrix;

/// Teleport probability used by personalized PageRank propagation.
pub const DEFAULT_ALPHA: f32 = 0.15;

/// Number of fixed-point iterations used by personalized PageRank propagation.
pub const DEFAULT_ITERATIONS: usize = 50;

/// Maps an N x F feature matrix to its diffused N x F counterpart.  Features
/// are `f32`; wider inputs are narrowed by the caller before diffusion and
/// outputs keep the same element type.
pub trait Diffuser {
    fn diffuse(&self, x: ArrayView2<f32>) -> Result<Array2<f32>>;
}

impl<F> Diffuser for F
where
    F: Fn(ArrayView2<f32>) -> Result<Array2<f32>>,
{
    fn diffuse(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self(x)
    }
}

/// Single application of the adjacency: `x -> A @ x`.
pub struct Simple<'a> {
    adj: &'a AdjacencyMatrix,
}

/// K-fold power iteration: `x -> A^k @ x`.
pub struct Power<'a> {
    adj: &'a AdjacencyMatrix,
    k: usize,
}

/// Personalized PageRank (APPNP) propagation.
pub struct Appnp<'a> {
    adj: &'a AdjacencyMatrix,

    /// Teleport weight given back to the original features each step
    alpha: f32,

    /// Number of fixed-point steps; there is no convergence check
    iterations: usize,
}

pub fn simple(adj: &AdjacencyMatrix) -> Simple<'_> {
    Simple { adj }
}

pub fn power(adj: &AdjacencyMatrix, k: usize) -> Power<'_> {
    Power { adj, k }
}

pub fn appnp(adj: &AdjacencyMatrix, alpha: f32, iterations: usize) -> Appnp<'_> {
    Appnp { adj, alpha, iterations }
}

impl<'a> Appnp<'a> {
    pub fn default_params(adj: &'a AdjacencyMatrix) -> Self {
        appnp(adj, DEFAULT_ALPHA, DEFAULT_ITERATIONS)
    }
}

/// Propagates every column of `x` independently with `f` and reassembles the
/// results in column order.
fn diffuse_columns<F>(adj: &AdjacencyMatrix, x: ArrayView2<f32>, f: F) -> Result<Array2<f32>>
where
    F: Fn(Vec<f32>) -> Vec<f32> + Send + Sync,
{
    adj.check_features(x.nrows())?;

    let columns: Vec<Vec<f32>> = (0..x.ncols())
        .into_par_iter()
        .map(|c| f(x.column(c).iter().copied().collect()))
        .collect();

    Ok(Array2::from_shape_fn((x.nrows(), x.ncols()), |(i, c)| columns[c][i]))
}

impl<'a> Diffuser for Simple<'a> {
    fn diffuse(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        diffuse_columns(self.adj, x, |col| self.adj.mul_vec(&col))
    }
}

impl<'a> Diffuser for Power<'a> {
    fn diffuse(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        diffuse_columns(self.adj, x, |mut col| {
            for _ in 0..self.k {
                col = self.adj.mul_vec(&col);
            }
            col
        })
    }
}

impl<'a> Diffuser for Appnp<'a> {
    fn diffuse(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let beta = 1. - self.alpha;
        diffuse_columns(self.adj, x, |x0| {
            let mut x_hat = x0.clone();
            for _ in 0..self.iterations {
                x_hat = self
                    .adj
                    .mul_vec(&x_hat)
                    .into_iter()
                    .zip(x0.iter())
                    .map(|(ax, xi)| beta * ax + self.alpha * xi)
                    .collect();
            }
            x_hat
        })
    }
}

/// Lazily applies a diffuser `k` times, yielding every intermediate result.
/// Stops after the first error.
pub struct DiffusePowers<'d, D: ?Sized> {
    diffuser: &'d D,
    state: Option<Array2<f32>>,
    remaining: usize,
}

pub fn diffuse_powers<D>(diffuser: &D, x: Array2<f32>, k: usize) -> DiffusePowers<'_, D>
where
    D: Diffuser + ?Sized,
{
    DiffusePowers {
        diffuser,
        state: Some(x),
        remaining: k,
    }
}

impl<'d, D> Iterator for DiffusePowers<'d, D>
where
    D: Diffuser + ?Sized,
{
    type Item = Result<Array2<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let state = self.state.take()?;
        match self.diffuser.diffuse(state.view()) {
            Ok(next) => {
                self.remaining -= 1;
                if self.remaining > 0 {
                    self.state = Some(next.clone());
                }
                Some(Ok(next))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
