use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::{Lit, Var};

impl Bdd {
    /// Returns one satisfying path of `node` as a vector of literals, if any.
    ///
    /// Variables not on the path are unconstrained.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<Lit>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        while !self.is_one(current) {
            let var = self.variable(current);
            let high = self.high_node(current);
            let low = self.low_node(current);

            // Prefer the low branch, so picked codes stay small.
            if !self.is_zero(low) {
                path.push(var.neg());
                current = low;
            } else {
                path.push(var.pos());
                current = high;
            }
        }

        Some(path)
    }

    /// Returns one satisfying assignment of `node` that is total over `vars`.
    ///
    /// `node` must not depend on anything outside `vars`; free variables of
    /// the chosen path are set to false.
    pub fn pick_minterm(&self, node: Ref, vars: &[Var]) -> Option<Vec<Lit>> {
        let path = self.one_sat(node)?;
        let fixed: HashMap<Var, bool> = path.iter().map(|lit| (lit.var(), lit.value())).collect();
        debug_assert!(fixed.keys().all(|v| vars.contains(v)));
        Some(
            vars.iter()
                .map(|&v| Lit::new(v, fixed.get(&v).copied().unwrap_or(false)))
                .collect(),
        )
    }

    /// Number of satisfying assignments of `node` over `num_vars` variables.
    ///
    /// `num_vars` must cover the support of `node`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let mut cache = HashMap::new();
        let max = BigUint::one() << num_vars;
        self.sat_count_(node, &max, &mut cache)
    }

    fn sat_count_(&self, node: Ref, max: &BigUint, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::zero();
        } else if self.is_one(node) {
            return max.clone();
        }

        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        let count_low = self.sat_count_(self.low_node(node), max, cache);
        let count_high = self.sat_count_(self.high_node(node), max, cache);
        let count: BigUint = (count_low + count_high) >> 1;

        cache.insert(node, count.clone());
        count
    }
}
