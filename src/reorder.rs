//! Variable reordering and garbage collection.
//!
//! Both are implemented as a rebuild: the node store is snapshotted, cleared,
//! and every root is reconstructed bottom-up (through ITE, so the result is
//! canonical for the new order). Everything not reachable from the roots is
//! dropped. Handles that were not passed as roots are invalid afterwards, so
//! callers run these only at phase boundaries, with every live function in
//! hand.
//!
//! The size of a diagram depends heavily on the order: for
//! `(x₁ ∧ y₁) ∨ … ∨ (xₙ ∧ yₙ)` the interleaved order is linear while the
//! separated one is exponential. Moving related variables next to each other
//! is what the locality shuffler relies on.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::bdd::{Bdd, Node};
use crate::reference::Ref;
use crate::types::Var;

/// Node counts around a rebuild.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RebuildStats {
    pub nodes_before: usize,
    pub nodes_after: usize,
}

impl Bdd {
    /// Install a new variable order, remapping `roots` in place.
    ///
    /// # Panics
    ///
    /// Panics if `order` is not a permutation of the allocated variables.
    pub fn reorder(&self, roots: &mut [Ref], order: &[Var]) -> RebuildStats {
        let n = self.num_vars();
        assert_eq!(order.len(), n, "Order must list every variable exactly once");
        let distinct: HashSet<Var> = order.iter().copied().collect();
        assert_eq!(distinct.len(), n, "Order must list every variable exactly once");

        let stats = self.rebuild(roots, Some(order));
        info!(
            "reordered {} variables: {} -> {} nodes",
            n, stats.nodes_before, stats.nodes_after
        );
        stats
    }

    /// Drop every node not reachable from `roots`, remapping them in place.
    pub fn collect_garbage(&self, roots: &mut [Ref]) -> RebuildStats {
        let stats = self.rebuild(roots, None);
        debug!(
            "garbage collected: {} -> {} nodes",
            stats.nodes_before, stats.nodes_after
        );
        stats
    }

    fn rebuild(&self, roots: &mut [Ref], order: Option<&[Var]>) -> RebuildStats {
        let nodes_before = self.num_nodes();
        let snapshot: Vec<Node> = self.nodes.borrow().clone();

        if let Some(order) = order {
            let mut level_map = self.level_map.borrow_mut();
            for (level, var) in order.iter().enumerate() {
                level_map[var.index()] = level;
            }
            *self.var_order.borrow_mut() = order.to_vec();
        }
        self.reset_storage();

        let mut memo: HashMap<usize, Ref> = HashMap::new();
        memo.insert(1, self.one());
        for root in roots.iter_mut() {
            if *root != Ref::INVALID {
                *root = self.rebuild_node(&snapshot, *root, &mut memo);
            }
        }

        RebuildStats {
            nodes_before,
            nodes_after: self.num_nodes(),
        }
    }

    fn rebuild_node(&self, snapshot: &[Node], f: Ref, memo: &mut HashMap<usize, Ref>) -> Ref {
        let res = if let Some(&res) = memo.get(&f.index()) {
            res
        } else {
            let node = snapshot[f.index()];
            let low = self.rebuild_node(snapshot, node.low, memo);
            let high = self.rebuild_node(snapshot, node.high, memo);
            let res = self.apply_ite(self.mk_var(node.variable), high, low);
            memo.insert(f.index(), res);
            res
        };
        if f.is_negated() {
            -res
        } else {
            res
        }
    }

    /// Number of distinct nodes reachable from `roots`, terminal included.
    pub fn count_nodes(&self, roots: &[Ref]) -> usize {
        self.descendants(roots.iter().copied()).len()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// (x1 ∧ y1) ∨ (x2 ∧ y2) ∨ (x3 ∧ y3) under the order x1 x2 x3 y1 y2 y3.
    fn separated_pairs(bdd: &Bdd) -> (Vec<Var>, Vec<Var>, Ref) {
        let xs: Vec<Var> = (0..3).map(|_| bdd.allocate_variable()).collect();
        let ys: Vec<Var> = (0..3).map(|_| bdd.allocate_variable()).collect();
        let f = bdd.apply_or_many(
            xs.iter()
                .zip(&ys)
                .map(|(&x, &y)| bdd.apply_and(bdd.mk_var(x), bdd.mk_var(y))),
        );
        (xs, ys, f)
    }

    #[test]
    fn test_reorder_preserves_function() {
        let bdd = Bdd::default();
        let (xs, ys, f) = separated_pairs(&bdd);
        let size_before = bdd.size(f);

        // Truth table before the rebuild.
        let all: Vec<Var> = xs.iter().chain(&ys).copied().collect();
        let table: Vec<bool> = (0..64u32)
            .map(|m| bdd.eval(f, |v| m >> all.iter().position(|&u| u == v).unwrap() & 1 == 1))
            .collect();

        let interleaved: Vec<Var> = xs.iter().zip(&ys).flat_map(|(&x, &y)| [x, y]).collect();
        let mut roots = [f];
        bdd.reorder(&mut roots, &interleaved);
        let g = roots[0];

        assert_eq!(bdd.order(), interleaved);
        assert!(bdd.size(g) < size_before);
        for (m, &expected) in table.iter().enumerate() {
            let got = bdd.eval(g, |v| m >> all.iter().position(|&u| u == v).unwrap() & 1 == 1);
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_collect_garbage_drops_unreachable() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(bdd.allocate_variable());
        let y = bdd.mk_var(bdd.allocate_variable());
        let keep = bdd.apply_and(x, y);
        let _garbage = bdd.apply_xor(x, y);
        let before = bdd.num_nodes();

        let mut roots = [-keep];
        let stats = bdd.collect_garbage(&mut roots);
        assert_eq!(stats.nodes_before, before);
        assert_eq!(bdd.num_nodes(), 2);
        assert_eq!(roots[0], -bdd.apply_and(bdd.mk_var(Var::new(1)), bdd.mk_var(Var::new(2))));
    }

    #[test]
    #[should_panic(expected = "Order must list every variable exactly once")]
    fn test_reorder_rejects_partial_order() {
        let bdd = Bdd::default();
        let x = bdd.allocate_variable();
        bdd.allocate_variable();
        bdd.reorder(&mut [], &[x]);
    }
}
