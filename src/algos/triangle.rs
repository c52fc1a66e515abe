//! Triangle adjacency.  Keeps the edges of a graph that close at least one
//! triangle, weighted by the number of common-neighbour paths through them.
//!
//! The counts come from a masked sparse square of the 0/1 off-diagonal
//! indicator `A`.  Every edge starts at 1 and accumulates `-2 (A @ A)[i, j]`,
//! so its value `x = 1 - 2c` is odd and the path count `c` is recovered with
//! `(1 - x) / 2`.
use log::debug;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::graph::{AdjacencyMatrix, NodeID};

/// Recovers the triad count from an accumulated signed value.
pub fn recover_triad_count(x: i32) -> f32 {
    if x % 2 != 0 {
        (1 - x) as f32 / 2.
    } else {
        x as f32
    }
}

/// 0/1 indicator of the off-diagonal pattern of `adj`.
fn indicator(adj: &AdjacencyMatrix) -> CsMat<i32> {
    let n = adj.dim();
    let mut triplets = TriMat::with_capacity((n, n), adj.nnz());
    adj.iter()
        .filter(|(i, j, _)| i != j)
        .for_each(|(i, j, _)| triplets.add_triplet(i, j, 1i32));
    triplets.to_csr()
}

/// Builds the triangle adjacency of `adj`.  When `directed` is false the
/// masked product is transposed before accumulation.
pub fn triangle(adj: &AdjacencyMatrix, directed: bool) -> AdjacencyMatrix {
    let n = adj.dim();
    let a = indicator(adj);

    let paths: CsMat<i32> = &a * &a;
    let paths = if directed {
        paths
    } else {
        paths.transpose_view().to_other_storage()
    };

    // Accumulate -2 * paths into the stored positions of A only
    let triads: Vec<(NodeID, NodeID, f32)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row = a.outer_view(i).map(|row| row.indices().to_vec()).unwrap_or_default();
            let paths = &paths;
            row.into_iter().map(move |j| {
                let count = paths.get(i, j).copied().unwrap_or(0);
                (i, j, recover_triad_count(1 - 2 * count))
            })
        })
        .filter(|(_, _, count)| *count > 0.)
        .collect();

    debug!(
        "Triangle adjacency keeps {} of {} edges (directed: {})",
        triads.len(),
        adj.nnz(),
        directed
    );

    let mut triplets = TriMat::with_capacity((n, n), triads.len());
    triads.into_iter().for_each(|(i, j, count)| triplets.add_triplet(i, j, count));

    // Every position is unique, so no summing takes place here
    AdjacencyMatrix::from_csmat(triplets.to_csr())
        .expect("triangle adjacency has the same shape as its source")
}

#[cfg(test)]
mod triangle_tests {
    use super::*;
    use rand::prelude::*;
    use rand_xorshift::XorShiftRng;

    fn undirected(edges: &[(usize, usize)]) -> AdjacencyMatrix {
        let edges = edges
            .iter()
            .flat_map(|&(f, t)| vec![(f, t, 1.), (t, f, 1.)])
            .collect();
        AdjacencyMatrix::construct_from_edges(edges)
    }

    #[test]
    fn recover_counts() {
        assert_eq!(recover_triad_count(1), 0.);
        assert_eq!(recover_triad_count(-1), 1.);
        assert_eq!(recover_triad_count(-5), 3.);
        assert_eq!(recover_triad_count(4), 4.);
        assert_eq!(recover_triad_count(0), 0.);
    }

    #[test]
    fn ring_has_no_triangles() {
        let ring = undirected(&[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let tri = triangle(&ring, false);
        assert_eq!(tri.dim(), 4);
        assert_eq!(tri.nnz(), 0);
        assert!(tri.to_dense().iter().all(|v| *v == 0.));
    }

    #[test]
    fn full_triangle() {
        let k3 = undirected(&[(0, 1), (1, 2), (2, 0)]);
        let tri = triangle(&k3, false);
        assert_eq!(tri.nnz(), 6);
        for (i, j, count) in tri.iter() {
            assert_ne!(i, j);
            assert_eq!(count, 1.);
        }
    }

    #[test]
    fn only_original_edges_survive() {
        // Two triangles sharing the edge 1-2 plus a pendant edge 3-4
        let graph = undirected(&[(0, 1), (1, 2), (2, 0), (1, 3), (2, 3), (3, 4)]);
        let tri = triangle(&graph, false);

        for (i, j, _) in tri.iter() {
            assert!(graph.contains(i, j));
        }
        assert_eq!(tri.get(1, 2), Some(2.));
        assert_eq!(tri.get(0, 1), Some(1.));
        assert_eq!(tri.get(3, 4), None);
        assert_eq!(tri.get(4, 3), None);
    }

    #[test]
    fn self_loops_are_ignored() {
        let mut edges = vec![(0, 0, 1.), (1, 1, 1.)];
        edges.extend(vec![(0, 1, 1.), (1, 0, 1.), (1, 2, 1.), (2, 1, 1.)]);
        let graph = AdjacencyMatrix::construct_from_edges(edges);
        assert_eq!(triangle(&graph, false).nnz(), 0);
        assert_eq!(triangle(&graph, true).nnz(), 0);
    }

    #[test]
    fn directed_cycle() {
        // 0 -> 1 -> 2 -> 0 plus the shortcut 0 -> 2.  The only two-step path
        // landing on an edge is 0 -> 1 -> 2.
        let graph = AdjacencyMatrix::construct_from_edges(vec![
            (0, 1, 1.),
            (1, 2, 1.),
            (2, 0, 1.),
            (0, 2, 1.),
        ]);

        let directed = triangle(&graph, true);
        assert_eq!(directed.nnz(), 1);
        assert_eq!(directed.get(0, 2), Some(1.));

        // Transposed, edge (i, j) counts paths j -> k -> i
        let transposed = triangle(&graph, false);
        assert_eq!(transposed.get(0, 1), Some(1.));
        assert_eq!(transposed.get(1, 2), Some(1.));
        assert_eq!(transposed.get(2, 0), Some(1.));
        assert_eq!(transposed.get(0, 2), None);
    }

    #[test]
    fn weights_are_ignored() {
        let graph = AdjacencyMatrix::construct_from_edges(vec![
            (0, 1, 5.),
            (1, 0, 5.),
            (1, 2, 0.1),
            (2, 1, 0.1),
            (2, 0, 3.),
            (0, 2, 3.),
        ]);
        let tri = triangle(&graph, false);
        assert!(tri.iter().all(|(_, _, count)| count == 1.));
    }

    #[test]
    fn matches_dense_common_neighbours() {
        let n = 30;
        let mut rng = XorShiftRng::seed_from_u64(20221);
        let mut edges = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if rng.gen::<f32>() < 0.2 {
                    edges.push((i, j, rng.gen::<f32>() + 0.5));
                }
            }
        }
        let graph = AdjacencyMatrix::with_nodes(n, edges).unwrap();
        let dense = graph.to_dense();
        let is_edge = |i: usize, j: usize| i != j && dense[[i, j]] != 0.;

        for &directed in [true, false].iter() {
            let tri = triangle(&graph, directed);
            for i in 0..n {
                for j in 0..n {
                    let (from_node, to_node) = if directed { (i, j) } else { (j, i) };
                    let count = (0..n)
                        .filter(|&k| is_edge(from_node, k) && is_edge(k, to_node))
                        .count() as f32;

                    let expected = if is_edge(i, j) && count > 0. { Some(count) } else { None };
                    assert_eq!(tri.get(i, j), expected, "({}, {}) directed={}", i, j, directed);
                }
            }
        }
    }
}
