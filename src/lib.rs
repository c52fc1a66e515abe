//! Graph diffusion operators for precomputing GNN input features.
//!
//! Given a sparse adjacency matrix and a dense node feature matrix, the
//! operators here produce normalized and diffused feature variants (simple
//! and power propagation, personalized PageRank and triangle propagation)
//! that feed models such as SIGN and SGC.

pub mod algos;
pub mod cache;
pub mod error;
pub mod graph;
pub mod io;
pub mod vocab;
mod progress;

#[cfg(feature = "python")]
mod python;

pub use crate::algos::diffusion::{Diffusion, SignDiffusion, SimpleGcnDiffusion};
pub use crate::algos::normalize::{normalize, normalize_in_place, Normalization};
pub use crate::algos::propagation::{appnp, diffuse_powers, power, simple, Diffuser};
pub use crate::algos::triangle::triangle;
pub use crate::cache::AdjacencyCache;
pub use crate::error::{DiffusionError, Result};
pub use crate::graph::{AdjacencyMatrix, Graph, NodeID};
