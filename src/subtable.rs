//! Per-variable unique table.
//!
//! All nodes labelled with the same variable live in one subtable keyed by
//! their `(low, high)` children, so the variable does not need to be part of
//! the key and a reorder only has to rebuild subtables, never rehash them.

use std::collections::HashMap;

use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct Subtable {
    pub variable: Var,
    nodes: HashMap<(Ref, Ref), u32>,
}

impl Subtable {
    pub fn new(variable: Var) -> Self {
        Self {
            variable,
            nodes: HashMap::new(),
        }
    }

    /// Look up a node by its children, returning its storage index.
    pub fn find(&self, low: Ref, high: Ref) -> Option<u32> {
        self.nodes.get(&(low, high)).copied()
    }

    pub fn insert(&mut self, low: Ref, high: Ref, index: u32) {
        self.nodes.insert((low, high), index);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
