//! Locality shuffling of the variable order.
//!
//! Variables that are always used together (a latch's current and next
//! state, an unknown-component input and the signal it is computed from)
//! are moved next to each other. Everything else keeps its relative
//! position. Only the physical order changes: the functions stay the same.

use std::collections::{HashMap, HashSet};

use log::info;

use crate::bdd::Bdd;
use crate::mv::{Encoding, MvId};
use crate::reference::Ref;
use crate::reorder::RebuildStats;
use crate::types::Var;

/// Pairs `(anchor, follower)`: the bits of `follower` go right below the
/// bits of `anchor`.
#[derive(Debug, Clone, Default)]
pub struct Shuffle {
    pairs: Vec<(MvId, MvId)>,
}

impl Shuffle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_after(&mut self, anchor: MvId, follower: MvId) -> &mut Self {
        if anchor != follower {
            self.pairs.push((anchor, follower));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The shuffled permutation of the current order.
    pub fn order(&self, bdd: &Bdd, encoding: &Encoding) -> Vec<Var> {
        let current = bdd.order();

        let mut followers: HashMap<MvId, Vec<MvId>> = HashMap::new();
        let mut moved: HashSet<Var> = HashSet::new();
        for &(anchor, follower) in &self.pairs {
            // A variable follows at most one anchor; the first pair wins.
            if encoding.bits(follower).iter().any(|v| moved.contains(v)) {
                continue;
            }
            followers.entry(anchor).or_default().push(follower);
            moved.extend(encoding.bits(follower).iter().copied());
        }

        // Bottom-most bit of each anchor: followers are emitted after it.
        let mut last_bit: HashMap<Var, MvId> = HashMap::new();
        for &anchor in followers.keys() {
            if let Some(&bit) = encoding.bits(anchor).iter().max_by_key(|&&v| bdd.level(v)) {
                last_bit.insert(bit, anchor);
            }
        }

        let mut order = Vec::with_capacity(current.len());
        let mut emitted: HashSet<Var> = HashSet::new();
        for &v in &current {
            if !moved.contains(&v) {
                self.emit(bdd, encoding, v, &followers, &last_bit, &mut emitted, &mut order);
            }
        }
        // Followers whose anchors were never emitted (anchor cycles).
        for &v in &current {
            if !emitted.contains(&v) {
                self.emit(bdd, encoding, v, &followers, &last_bit, &mut emitted, &mut order);
            }
        }
        debug_assert_eq!(order.len(), current.len());
        order
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        bdd: &Bdd,
        encoding: &Encoding,
        v: Var,
        followers: &HashMap<MvId, Vec<MvId>>,
        last_bit: &HashMap<Var, MvId>,
        emitted: &mut HashSet<Var>,
        order: &mut Vec<Var>,
    ) {
        if !emitted.insert(v) {
            return;
        }
        order.push(v);
        let Some(anchor) = last_bit.get(&v) else {
            return;
        };
        for follower in &followers[anchor] {
            let mut bits = encoding.bits(*follower).to_vec();
            bits.sort_by_key(|&b| bdd.level(b));
            for b in bits {
                self.emit(bdd, encoding, b, followers, last_bit, emitted, order);
            }
        }
    }

    /// Install the shuffled order, remapping `roots` in place.
    pub fn apply(&self, bdd: &Bdd, encoding: &Encoding, roots: &mut [Ref]) -> RebuildStats {
        let order = self.order(bdd, encoding);
        if order == bdd.order() {
            let size = bdd.num_nodes();
            return RebuildStats {
                nodes_before: size,
                nodes_after: size,
            };
        }
        let stats = bdd.reorder(roots, &order);
        info!(
            "shuffled {} pairs: {} -> {} nodes",
            self.pairs.len(),
            stats.nodes_before,
            stats.nodes_after
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::mv::{MvVar, Role};

    #[test]
    fn test_followers_land_below_anchors() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let a = enc.add(&bdd, MvVar::new("a", 4, Role::CS));
        let b = enc.add(&bdd, MvVar::new("b", 2, Role::CS));
        let a_ns = enc.add(&bdd, MvVar::new("a'", 4, Role::NS));
        let b_ns = enc.add(&bdd, MvVar::new("b'", 2, Role::NS));

        let mut shuffle = Shuffle::new();
        shuffle.place_after(a, a_ns).place_after(b, b_ns);
        let order = shuffle.order(&bdd, &enc);

        let expected: Vec<Var> = [a, a_ns, b, b_ns]
            .iter()
            .flat_map(|&id| enc.bits(id).to_vec())
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_untouched_variables_keep_relative_order() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let u = enc.add(&bdd, MvVar::new("u", 2, Role::U));
        let x = enc.add(&bdd, MvVar::new("x", 2, Role::I));
        let y = enc.add(&bdd, MvVar::new("y", 2, Role::I));
        let z = enc.add(&bdd, MvVar::new("z", 2, Role::I));

        let mut shuffle = Shuffle::new();
        shuffle.place_after(y, u);
        let order = shuffle.order(&bdd, &enc);
        let expected: Vec<Var> = [x, y, u, z].iter().map(|&id| enc.bits(id)[0]).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_apply_keeps_functions() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let cs = enc.add(&bdd, MvVar::new("q", 3, Role::CS));
        let i = enc.add(&bdd, MvVar::new("i", 2, Role::I));
        let ns = enc.add(&bdd, MvVar::new("q'", 3, Role::NS));
        let eq = enc.equal(&bdd, cs, ns);
        let rel = bdd.apply_and(eq, enc.value(&bdd, i, 1));

        let mut shuffle = Shuffle::new();
        shuffle.place_after(cs, ns);
        let mut roots = [rel];
        shuffle.apply(&bdd, &enc, &mut roots);

        assert_eq!(bdd.level(enc.bits(ns)[0]).index(), 2);
        let rebuilt = bdd.apply_and(enc.equal(&bdd, cs, ns), enc.value(&bdd, i, 1));
        assert_eq!(roots[0], rebuilt);
    }
}
