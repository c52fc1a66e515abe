//! Memoization of matrices derived from an adjacency matrix.
//!
//! Entries are keyed on the address of the source matrix.  The cache borrows
//! every source for `'a`, so a source cannot be mutated, moved or dropped
//! while derived matrices for it are held here.
use std::marker::PhantomData;
use std::sync::Arc;

use hashbrown::HashMap;
use log::trace;

use crate::algos::normalize::{normalize, normalize_in_place, Normalization};
use crate::algos::triangle::triangle;
use crate::graph::AdjacencyMatrix;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Derivation {
    Normalized(Normalization),
    Triangle { directed: bool },
    NormalizedTriangle { directed: bool, method: Normalization },
}

pub struct AdjacencyCache<'a> {
    derived: HashMap<(usize, Derivation), Arc<AdjacencyMatrix>>,
    sources: PhantomData<&'a AdjacencyMatrix>,
}

impl<'a> Default for AdjacencyCache<'a> {
    fn default() -> Self {
        AdjacencyCache::new()
    }
}

impl<'a> AdjacencyCache<'a> {
    pub fn new() -> Self {
        AdjacencyCache {
            derived: HashMap::new(),
            sources: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derived.is_empty()
    }

    fn get_or_insert_with<F>(
        &mut self,
        adj: &'a AdjacencyMatrix,
        derivation: Derivation,
        build: F,
    ) -> Arc<AdjacencyMatrix>
    where
        F: FnOnce(&AdjacencyMatrix) -> AdjacencyMatrix,
    {
        let key = (adj as *const AdjacencyMatrix as usize, derivation);
        if let Some(m) = self.derived.get(&key) {
            trace!("Cache hit for {:?}", derivation);
            return m.clone();
        }

        trace!("Cache miss for {:?}", derivation);
        let m = Arc::new(build(adj));
        self.derived.insert(key, m.clone());
        m
    }

    /// Normalized copy of `adj`, computed once per (source, method).
    pub fn normalized(&mut self, adj: &'a AdjacencyMatrix, method: Normalization) -> Arc<AdjacencyMatrix> {
        self.get_or_insert_with(adj, Derivation::Normalized(method), |a| normalize(a, method))
    }

    /// Triangle adjacency of `adj`, computed once per (source, directed).
    pub fn triangle(&mut self, adj: &'a AdjacencyMatrix, directed: bool) -> Arc<AdjacencyMatrix> {
        self.get_or_insert_with(adj, Derivation::Triangle { directed }, |a| triangle(a, directed))
    }

    /// Normalized triangle adjacency.  The intermediate triangle matrix is
    /// normalized in place rather than copied.
    pub fn normalized_triangle(
        &mut self,
        adj: &'a AdjacencyMatrix,
        directed: bool,
        method: Normalization,
    ) -> Arc<AdjacencyMatrix> {
        let derivation = Derivation::NormalizedTriangle { directed, method };
        self.get_or_insert_with(adj, derivation, |a| {
            let mut tri = triangle(a, directed);
            normalize_in_place(&mut tri, method);
            tri
        })
    }
}
