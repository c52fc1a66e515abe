use std::sync::Arc;

use ndarray::Array2;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::algos::diffusion::{Diffusion, SignDiffusion, SimpleGcnDiffusion};
use crate::algos::normalize::{normalize, Normalization};
use crate::algos::propagation::{appnp, power, simple, Diffuser};
use crate::algos::propagation::{DEFAULT_ALPHA, DEFAULT_ITERATIONS};
use crate::algos::triangle::triangle;
use crate::error::DiffusionError;
use crate::graph::{AdjacencyMatrix, NodeID};
use crate::io::{EdgeType, GraphReader};
use crate::vocab::Vocab;

fn to_py_err(e: DiffusionError) -> PyErr {
    match e {
        DiffusionError::Io(e) => PyIOError::new_err(format!("{:?}", e)),
        e => PyValueError::new_err(e.to_string()),
    }
}

fn to_array(features: Vec<Vec<f32>>) -> PyResult<Array2<f32>> {
    let rows = features.len();
    let cols = features.first().map(|r| r.len()).unwrap_or(0);
    if features.iter().any(|r| r.len() != cols) {
        return Err(PyValueError::new_err("Feature rows have different sizes!"));
    }

    Array2::from_shape_vec((rows, cols), features.into_iter().flatten().collect())
        .map_err(|e| PyValueError::new_err(format!("{}", e)))
}

fn from_array(features: Array2<f32>) -> Vec<Vec<f32>> {
    features.outer_iter().map(|row| row.to_vec()).collect()
}

fn parse_norm(method: Option<String>, default: Normalization) -> PyResult<Normalization> {
    match method {
        Some(m) => m.parse().map_err(to_py_err),
        None => Ok(default),
    }
}

#[pyclass]
struct Adjacency {
    adj: Arc<AdjacencyMatrix>,
    vocab: Option<Arc<Vocab>>,
}

impl Adjacency {
    fn wrap(adj: AdjacencyMatrix) -> Self {
        Adjacency { adj: Arc::new(adj), vocab: None }
    }
}

#[pymethods]
impl Adjacency {
    #[staticmethod]
    pub fn from_edge_index(
        sources: Vec<NodeID>,
        targets: Vec<NodeID>,
        num_nodes: Option<usize>,
        weights: Option<Vec<f32>>,
    ) -> PyResult<Self> {
        let adj = AdjacencyMatrix::from_edge_index(&sources, &targets, weights.as_deref(), num_nodes)
            .map_err(to_py_err)?;
        Ok(Adjacency::wrap(adj))
    }

    #[staticmethod]
    pub fn from_csr(
        indptr: Vec<usize>,
        indices: Vec<NodeID>,
        values: Option<Vec<f32>>,
        weighted: Option<bool>,
    ) -> PyResult<Self> {
        let adj = AdjacencyMatrix::from_csr(&indptr, &indices, values.as_deref(), weighted.unwrap_or(false))
            .map_err(to_py_err)?;
        Ok(Adjacency::wrap(adj))
    }

    #[staticmethod]
    pub fn load(
        path: String,
        directed: Option<bool>,
        weighted: Option<bool>,
        chunk_size: Option<usize>,
        skip_rows: Option<usize>,
    ) -> PyResult<Self> {
        let edge_type = if directed.unwrap_or(false) {
            EdgeType::Directed
        } else {
            EdgeType::Undirected
        };

        let (vocab, adj) = GraphReader::load(
            &path,
            edge_type,
            chunk_size.unwrap_or(1),
            skip_rows.unwrap_or(0),
            weighted.unwrap_or(false),
        )
        .map_err(to_py_err)?;

        Ok(Adjacency {
            adj: Arc::new(adj),
            vocab: Some(Arc::new(vocab)),
        })
    }

    pub fn nodes(&self) -> usize {
        self.adj.dim()
    }

    pub fn edges(&self) -> usize {
        self.adj.nnz()
    }

    /// Node names in id order, when the graph was loaded from a file.
    pub fn node_names(&self) -> Option<Vec<String>> {
        self.vocab.as_ref().map(|vocab| {
            (0..vocab.len())
                .filter_map(|node_id| vocab.get_name(node_id))
                .map(|name| name.to_string())
                .collect()
        })
    }

    pub fn to_edges(&self) -> Vec<(NodeID, NodeID, f32)> {
        self.adj.iter().collect()
    }

    pub fn normalize(&self, method: String) -> PyResult<Adjacency> {
        let method: Normalization = method.parse().map_err(to_py_err)?;
        Ok(Adjacency {
            adj: Arc::new(normalize(&self.adj, method)),
            vocab: self.vocab.clone(),
        })
    }

    pub fn triangle(&self, directed: Option<bool>) -> Adjacency {
        Adjacency {
            adj: Arc::new(triangle(&self.adj, directed.unwrap_or(true))),
            vocab: self.vocab.clone(),
        }
    }

    pub fn simple(&self, features: Vec<Vec<f32>>) -> PyResult<Vec<Vec<f32>>> {
        let x = to_array(features)?;
        let out = simple(&self.adj).diffuse(x.view()).map_err(to_py_err)?;
        Ok(from_array(out))
    }

    pub fn power(&self, features: Vec<Vec<f32>>, k: usize) -> PyResult<Vec<Vec<f32>>> {
        let x = to_array(features)?;
        let out = power(&self.adj, k).diffuse(x.view()).map_err(to_py_err)?;
        Ok(from_array(out))
    }

    pub fn appnp(
        &self,
        features: Vec<Vec<f32>>,
        alpha: Option<f32>,
        iterations: Option<usize>,
    ) -> PyResult<Vec<Vec<f32>>> {
        let x = to_array(features)?;
        let op = appnp(
            &self.adj,
            alpha.unwrap_or(DEFAULT_ALPHA),
            iterations.unwrap_or(DEFAULT_ITERATIONS),
        );
        let out = op.diffuse(x.view()).map_err(to_py_err)?;
        Ok(from_array(out))
    }
}

#[pyclass(name = "SimpleGCNDiffusion")]
struct PySimpleGcnDiffusion {
    model: SimpleGcnDiffusion,
}

#[pymethods]
impl PySimpleGcnDiffusion {
    #[new]
    pub fn new(k: usize) -> Self {
        PySimpleGcnDiffusion {
            model: SimpleGcnDiffusion::new(k),
        }
    }

    pub fn num_features(&self, in_features: usize) -> usize {
        self.model.num_features(in_features)
    }

    pub fn propagate(&self, adj: &Adjacency, features: Vec<Vec<f32>>) -> PyResult<Vec<Vec<f32>>> {
        let x = to_array(features)?;
        let out = self.model.propagate(&adj.adj, x.view()).map_err(to_py_err)?;
        Ok(from_array(out))
    }
}

#[pyclass(name = "SIGNDiffusion")]
struct PySignDiffusion {
    model: SignDiffusion,
}

#[pymethods]
impl PySignDiffusion {
    #[new]
    pub fn new(
        s: usize,
        p: usize,
        t: usize,
        s_norm: Option<String>,
        p_norm: Option<String>,
        t_norm: Option<String>,
        alpha: Option<f32>,
        iterations: Option<usize>,
        progress: Option<bool>,
    ) -> PyResult<Self> {
        let model = SignDiffusion::new(s, p, t)
            .map_err(to_py_err)?
            .with_norms(
                parse_norm(s_norm, Normalization::Gcn)?,
                parse_norm(p_norm, Normalization::RandomWalk)?,
                parse_norm(t_norm, Normalization::RandomWalk)?,
            )
            .with_ppr(
                alpha.unwrap_or(DEFAULT_ALPHA),
                iterations.unwrap_or(DEFAULT_ITERATIONS),
            )
            .with_progress(progress.unwrap_or(false));

        Ok(PySignDiffusion { model })
    }

    pub fn num_features(&self, in_features: usize) -> usize {
        self.model.num_features(in_features)
    }

    pub fn propagate(&self, adj: &Adjacency, features: Vec<Vec<f32>>) -> PyResult<Vec<Vec<f32>>> {
        let x = to_array(features)?;
        let out = self.model.propagate(&adj.adj, x.view()).map_err(to_py_err)?;
        Ok(from_array(out))
    }
}

#[pymodule]
fn graph_diffusers(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<Adjacency>()?;
    m.add_class::<PySimpleGcnDiffusion>()?;
    m.add_class::<PySignDiffusion>()?;
    Ok(())
}
