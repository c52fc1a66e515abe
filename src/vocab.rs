use std::sync::Arc;

use hashbrown::HashMap;

use crate::graph::NodeID;

/// Maps external node names to dense node ids, in order of first sight.
#[derive(Debug, Default)]
pub struct Vocab {
    vocab_to_idx: HashMap<Arc<str>, NodeID>,
    idx_to_vocab: Vec<Arc<str>>,
}

impl Vocab {
    pub fn new() -> Self {
        Vocab::default()
    }

    pub fn get_node_id(&self, name: &str) -> Option<NodeID> {
        self.vocab_to_idx.get(name).copied()
    }

    pub fn get_or_insert(&mut self, name: String) -> NodeID {
        if let Some(node_id) = self.vocab_to_idx.get(name.as_str()) {
            return *node_id;
        }

        let node: Arc<str> = Arc::from(name);
        let new_idx = self.idx_to_vocab.len();
        self.vocab_to_idx.insert(node.clone(), new_idx);
        self.idx_to_vocab.push(node);
        new_idx
    }

    pub fn get_name(&self, node: NodeID) -> Option<Arc<str>> {
        self.idx_to_vocab.get(node).cloned()
    }

    pub fn len(&self) -> usize {
        self.idx_to_vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx_to_vocab.is_empty()
    }
}
