use ndarray::Array2;
use sprs::{prod, CsMat, TriMat};

use crate::error::{DiffusionError, Result};

pub type NodeID = usize;

pub trait Graph {
    /// Get number of nodes in graph
    fn len(&self) -> usize;

    /// Get number of edges in graph
    fn edges(&self) -> usize;

    /// Get degree of node in graph
    fn degree(&self, idx: NodeID) -> usize;

    /// Get edges and corresponding weights
    fn get_edges(&self, idx: NodeID) -> (&[NodeID], &[f32]);
}

/// Square sparse adjacency matrix stored in Compressed Sparse Row format.
/// Rows and columns are node ids, values are edge weights.
#[derive(Clone, Debug)]
pub struct AdjacencyMatrix {
    matrix: CsMat<f32>,
}

impl AdjacencyMatrix {
    /// Builds the matrix from a list of weighted edges, sizing it from the
    /// largest node id seen.  Duplicate edges are summed.
    pub fn construct_from_edges(edges: Vec<(NodeID, NodeID, f32)>) -> Self {
        let num_nodes = edges
            .iter()
            .map(|(from_node, to_node, _)| *from_node.max(to_node) + 1)
            .max()
            .unwrap_or(0);

        AdjacencyMatrix::build(num_nodes, edges)
    }

    /// Builds an `num_nodes` x `num_nodes` matrix from a list of weighted edges.
    pub fn with_nodes(num_nodes: usize, edges: Vec<(NodeID, NodeID, f32)>) -> Result<Self> {
        if let Some(&(f, t, _)) = edges.iter().find(|(f, t, _)| *f >= num_nodes || *t >= num_nodes) {
            return Err(DiffusionError::NodeOutOfRange { node: f.max(t), nodes: num_nodes });
        }
        Ok(AdjacencyMatrix::build(num_nodes, edges))
    }

    /// Converts a COO edge index (parallel source/target arrays) into an
    /// adjacency matrix.  Missing weights mean an unweighted graph.
    pub fn from_edge_index(
        sources: &[NodeID],
        targets: &[NodeID],
        weights: Option<&[f32]>,
        num_nodes: Option<usize>,
    ) -> Result<Self> {
        if sources.len() != targets.len() {
            return Err(DiffusionError::MalformedInput(format!(
                "edge index has {} sources but {} targets",
                sources.len(),
                targets.len()
            )));
        }

        if let Some(w) = weights {
            if w.len() != sources.len() {
                return Err(DiffusionError::MalformedInput(format!(
                    "edge index has {} edges but {} weights",
                    sources.len(),
                    w.len()
                )));
            }
        }

        let edges: Vec<_> = sources
            .iter()
            .zip(targets.iter())
            .enumerate()
            .map(|(i, (f, t))| (*f, *t, weights.map(|w| w[i]).unwrap_or(1.)))
            .collect();

        match num_nodes {
            Some(n) => AdjacencyMatrix::with_nodes(n, edges),
            None => Ok(AdjacencyMatrix::construct_from_edges(edges)),
        }
    }

    /// Converts raw CSR arrays into an adjacency matrix.  When `weighted` is
    /// false every stored entry gets the value 1.0.
    pub fn from_csr(
        indptr: &[usize],
        indices: &[NodeID],
        values: Option<&[f32]>,
        weighted: bool,
    ) -> Result<Self> {
        if indptr.is_empty() {
            return Err(DiffusionError::MalformedInput("indptr must not be empty".into()));
        }

        let num_nodes = indptr.len() - 1;
        if indptr[0] != 0 || indptr[num_nodes] != indices.len() {
            return Err(DiffusionError::MalformedInput(format!(
                "indptr must span [0, {}], got [{}, {}]",
                indices.len(),
                indptr[0],
                indptr[num_nodes]
            )));
        }

        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(DiffusionError::MalformedInput("indptr must be non-decreasing".into()));
        }

        let values = match (weighted, values) {
            (true, Some(v)) if v.len() == indices.len() => Some(v),
            (true, Some(v)) => {
                return Err(DiffusionError::MalformedInput(format!(
                    "{} column indices but {} values",
                    indices.len(),
                    v.len()
                )))
            }
            (true, None) => {
                return Err(DiffusionError::MalformedInput(
                    "weighted conversion requires values".into(),
                ))
            }
            (false, _) => None,
        };

        let mut edges = Vec::with_capacity(indices.len());
        for (row, start_stop) in indptr.windows(2).enumerate() {
            for idx in start_stop[0]..start_stop[1] {
                let w = values.map(|v| v[idx]).unwrap_or(1.);
                edges.push((row, indices[idx], w));
            }
        }

        AdjacencyMatrix::with_nodes(num_nodes, edges)
    }

    /// Wraps an existing sprs matrix.  CSC inputs are converted to CSR.
    pub fn from_csmat(matrix: CsMat<f32>) -> Result<Self> {
        let (rows, cols) = matrix.shape();
        if rows != cols {
            return Err(DiffusionError::NotSquare { rows, cols });
        }

        let matrix = if matrix.is_csr() { matrix } else { matrix.to_other_storage() };
        Ok(AdjacencyMatrix { matrix })
    }

    fn build(num_nodes: usize, edges: Vec<(NodeID, NodeID, f32)>) -> Self {
        let mut triplets = TriMat::with_capacity((num_nodes, num_nodes), edges.len());
        edges.into_iter().for_each(|(from_node, to_node, weight)| {
            triplets.add_triplet(from_node, to_node, weight);
        });

        AdjacencyMatrix { matrix: triplets.to_csr() }
    }

    /// Number of rows (and columns) of the matrix.
    pub fn dim(&self) -> usize {
        self.matrix.rows()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    pub fn as_csmat(&self) -> &CsMat<f32> {
        &self.matrix
    }

    pub fn into_csmat(self) -> CsMat<f32> {
        self.matrix
    }

    /// Returns the stored value at (row, col), if any.
    pub fn get(&self, row: NodeID, col: NodeID) -> Option<f32> {
        self.matrix.get(row, col).copied()
    }

    /// True when (row, col) is part of the sparsity pattern, even if the
    /// stored value is zero.
    pub fn contains(&self, row: NodeID, col: NodeID) -> bool {
        self.matrix.get(row, col).is_some()
    }

    /// Iterates over stored entries as (row, col, weight) in row order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeID, NodeID, f32)> + '_ {
        self.matrix.iter().map(|(w, (row, col))| (row, col, *w))
    }

    /// Sum of the stored entries of each row.
    pub fn row_sums(&self) -> Vec<f32> {
        self.mul_vec(&vec![1f32; self.dim()])
    }

    /// Sparse matrix-vector product `self @ x`.
    pub fn mul_vec(&self, x: &[f32]) -> Vec<f32> {
        let mut out = vec![0f32; self.dim()];
        prod::mul_acc_mat_vec_csr(self.matrix.view(), x, out.as_mut_slice());
        out
    }

    /// Rewrites every stored entry in place without touching the sparsity
    /// pattern.
    pub fn map_entries<F>(&mut self, mut f: F)
    where
        F: FnMut(NodeID, NodeID, f32) -> f32,
    {
        let updated: Vec<f32> = self
            .matrix
            .iter()
            .map(|(w, (row, col))| f(row, col, *w))
            .collect();

        self.matrix.data_mut().copy_from_slice(&updated);
    }

    /// Makes sure a feature matrix with `rows` rows can be propagated over
    /// this graph.
    pub fn check_features(&self, rows: usize) -> Result<()> {
        if rows != self.dim() {
            return Err(DiffusionError::ShapeMismatch { nodes: self.dim(), rows });
        }
        Ok(())
    }

    pub fn to_dense(&self) -> Array2<f32> {
        self.matrix.to_dense()
    }
}

impl Graph for AdjacencyMatrix {
    // Get number of nodes in graph
    fn len(&self) -> usize {
        self.dim()
    }

    // Get number of edges in graph
    fn edges(&self) -> usize {
        self.matrix.nnz()
    }

    // Get degree of node in graph
    fn degree(&self, idx: NodeID) -> usize {
        self.matrix.indptr().outer_inds_sz(idx).len()
    }

    // Get edges and corresponding weights
    fn get_edges(&self, idx: NodeID) -> (&[NodeID], &[f32]) {
        let range = self.matrix.indptr().outer_inds_sz(idx);
        (&self.matrix.indices()[range.clone()], &self.matrix.data()[range])
    }
}
