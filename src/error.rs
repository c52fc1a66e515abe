//! Error types shared by the operators, models and readers.
use thiserror::Error;

use crate::graph::NodeID;

#[derive(Debug, Error)]
pub enum DiffusionError {
    #[error("at least one diffusion branch is required (s={s}, p={p}, t={t})")]
    NoBranches { s: usize, p: usize, t: usize },

    #[error("adjacency matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("feature matrix has {rows} rows but the graph has {nodes} nodes")]
    ShapeMismatch { nodes: usize, rows: usize },

    #[error("node {node} is out of range for a graph with {nodes} nodes")]
    NodeOutOfRange { node: NodeID, nodes: usize },

    #[error("malformed graph input: {0}")]
    MalformedInput(String),

    #[error("unknown normalization '{0}', expected 'gcn' or 'rw'")]
    UnknownNormalization(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{line}: malformed file: {reason}")]
    Parse { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, DiffusionError>;
