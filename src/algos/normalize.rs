//! Degree normalization of adjacency matrices.
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::DiffusionError;
use crate::graph::AdjacencyMatrix;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// Row-stochastic: every row is divided by its out-degree.
    RandomWalk,

    /// Symmetric GCN normalization, D^-1/2 A D^-1/2 with self-loops.
    Gcn,
}

impl FromStr for Normalization {
    type Err = DiffusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rw" => Ok(Normalization::RandomWalk),
            "gcn" => Ok(Normalization::Gcn),
            other => Err(DiffusionError::UnknownNormalization(other.to_string())),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::RandomWalk => write!(f, "rw"),
            Normalization::Gcn => write!(f, "gcn"),
        }
    }
}

/// Returns a normalized copy of `adj`, leaving the input untouched.
pub fn normalize(adj: &AdjacencyMatrix, method: Normalization) -> AdjacencyMatrix {
    let mut normed = adj.clone();
    normalize_in_place(&mut normed, method);
    normed
}

/// Normalizes `adj` in place.
pub fn normalize_in_place(adj: &mut AdjacencyMatrix, method: Normalization) {
    debug!("Normalizing {}x{} adjacency with '{}'", adj.dim(), adj.dim(), method);
    match method {
        Normalization::RandomWalk => rw_norm(adj),
        Normalization::Gcn => gcn_norm(adj),
    }
}

// Rows whose entries sum to zero come out non-finite.
fn rw_norm(adj: &mut AdjacencyMatrix) {
    let degree = adj.row_sums();
    adj.map_entries(|row, _col, w| w / degree[row]);
}

fn gcn_norm(adj: &mut AdjacencyMatrix) {
    // Self-loops only overwrite diagonal slots already in the pattern
    adj.map_entries(|row, col, w| if row == col { 1. } else { w });

    let inv_sqrt_deg: Vec<f32> = adj
        .row_sums()
        .into_iter()
        .map(|d| 1. / d.sqrt())
        .collect();

    adj.map_entries(|row, col, w| w * inv_sqrt_deg[row] * inv_sqrt_deg[col]);
}

#[cfg(test)]
mod normalize_tests {
    use super::*;

    fn build_edges() -> Vec<(usize, usize, f32)> {
        vec![
            (0, 1, 1.),
            (1, 1, 3.),
            (1, 2, 2.),
            (2, 0, 2.5),
            (1, 0, 10.),
        ]
    }

    fn symmetric_edges() -> Vec<(usize, usize, f32)> {
        vec![
            (0, 1, 1.),
            (1, 0, 1.),
            (1, 2, 2.),
            (2, 1, 2.),
            (2, 3, 0.5),
            (3, 2, 0.5),
            (0, 3, 1.),
            (3, 0, 1.),
            (0, 2, 3.),
            (2, 0, 3.),
        ]
    }

    #[test]
    fn parse_methods() {
        assert_eq!("rw".parse::<Normalization>().unwrap(), Normalization::RandomWalk);
        assert_eq!("gcn".parse::<Normalization>().unwrap(), Normalization::Gcn);
        assert!("sym".parse::<Normalization>().is_err());
        assert_eq!(Normalization::Gcn.to_string(), "gcn");
    }

    #[test]
    fn random_walk_rows_sum_to_one() {
        let adj = AdjacencyMatrix::construct_from_edges(build_edges());
        let rw = normalize(&adj, Normalization::RandomWalk);

        for s in rw.row_sums() {
            assert!((s - 1.).abs() < 1e-6, "row sum {}", s);
        }
        assert_eq!(rw.get(1, 0), Some(10. / 15.));
        assert_eq!(rw.get(1, 1), Some(3. / 15.));

        // The input is left alone
        assert_eq!(adj.get(1, 0), Some(10.));
    }

    #[test]
    fn random_walk_skips_empty_rows() {
        let adj = AdjacencyMatrix::with_nodes(3, vec![(0, 1, 2.), (1, 0, 4.)]).unwrap();
        let rw = normalize(&adj, Normalization::RandomWalk);
        assert_eq!(rw.row_sums(), vec![1., 1., 0.]);
    }

    #[test]
    fn random_walk_zero_degree_is_not_finite() {
        let adj = AdjacencyMatrix::construct_from_edges(vec![(0, 1, 1.), (0, 0, -1.), (1, 0, 1.)]);
        let rw = normalize(&adj, Normalization::RandomWalk);
        assert!(!rw.get(0, 1).unwrap().is_finite());
    }

    #[test]
    fn gcn_zero_degree_is_not_finite() {
        let adj = AdjacencyMatrix::construct_from_edges(vec![
            (0, 1, 1.),
            (0, 2, -1.),
            (1, 0, 1.),
            (2, 0, -1.),
        ]);
        let gcn = normalize(&adj, Normalization::Gcn);

        // Row 0 sums to zero
        assert!(!gcn.get(0, 1).unwrap().is_finite());
        assert!(!gcn.get(0, 2).unwrap().is_finite());
        assert_eq!(gcn.nnz(), 4);
    }

    #[test]
    fn gcn_is_symmetric() {
        let adj = AdjacencyMatrix::construct_from_edges(symmetric_edges());
        let gcn = normalize(&adj, Normalization::Gcn).to_dense();

        for i in 0..4 {
            for j in 0..4 {
                assert!((gcn[[i, j]] - gcn[[j, i]]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn gcn_scales_by_degree() {
        let adj = AdjacencyMatrix::construct_from_edges(symmetric_edges());
        let gcn = normalize(&adj, Normalization::Gcn);

        // Degrees are 5, 3, 5.5 and 1.5
        let expected = 3. / (5f32.sqrt() * 5.5f32.sqrt());
        assert!((gcn.get(0, 2).unwrap() - expected).abs() < 1e-6);
        assert_eq!(gcn.get(0, 0), None);
    }

    #[test]
    fn gcn_overwrites_stored_diagonal() {
        let adj = AdjacencyMatrix::construct_from_edges(vec![
            (0, 0, 5.),
            (0, 1, 1.),
            (1, 0, 1.),
        ]);
        let gcn = normalize(&adj, Normalization::Gcn);

        // deg(0) = 1 + 1, deg(1) = 1
        assert!((gcn.get(0, 0).unwrap() - 0.5).abs() < 1e-6);
        assert!((gcn.get(0, 1).unwrap() - 1. / 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(gcn.get(1, 1), None);
    }

    #[test]
    fn in_place_matches_copy() {
        let adj = AdjacencyMatrix::construct_from_edges(symmetric_edges());
        let copied = normalize(&adj, Normalization::RandomWalk);
        let mut owned = adj.clone();
        normalize_in_place(&mut owned, Normalization::RandomWalk);
        assert_eq!(copied.to_dense(), owned.to_dense());
    }
}
