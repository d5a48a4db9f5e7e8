//! The decision-diagram manager.
//!
//! A [`Bdd`] owns every node it ever creates. Functions are referred to by
//! [`Ref`] handles with complement edges; the high edge of a stored node is
//! never complemented, which keeps the representation canonical so that
//! logically equal functions get identical handles.
//!
//! The manager is an arena: nodes are only reclaimed by an explicit
//! [`collect_garbage`][Bdd::collect_garbage] or [`reorder`][Bdd::reorder] call
//! that is handed every live root. Between such calls any handle can be held
//! across any number of operations.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::subtable::Subtable;
use crate::types::{Level, Lit, Var};
use crate::utils::{pairing2, pairing3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Node {
    pub(crate) variable: Var,
    pub(crate) low: Ref,
    pub(crate) high: Ref,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
    RelProduct(Ref, Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match *self {
            OpKey::Ite(f, g, h) => pairing3(f.raw() as u64, g.raw() as u64, h.raw() as u64),
            OpKey::Exists(f, c) => pairing2(f.raw() as u64, c.raw() as u64) ^ 0x9e37_79b9,
            OpKey::RelProduct(f, g, c) => {
                pairing3(f.raw() as u64, g.raw() as u64, c.raw() as u64) ^ 0x7f4a_7c15
            }
        }
    }
}

/// Level reported for the terminal node: below every variable.
const TERMINAL_LEVEL: usize = usize::MAX;

pub struct Bdd {
    pub(crate) nodes: RefCell<Vec<Node>>,
    /// Subtable per variable, indexed by `var.id() - 1`.
    pub(crate) subtables: RefCell<Vec<Subtable>>,
    /// Variable at each level.
    pub(crate) var_order: RefCell<Vec<Var>>,
    /// Level of each variable, indexed by `var.id()` (slot 0 unused).
    pub(crate) level_map: RefCell<Vec<usize>>,
    pub(crate) cache: RefCell<Cache<OpKey, Ref>>,
}

impl Bdd {
    /// Create a manager with a computed table of `2^cache_bits` slots.
    pub fn new(cache_bits: usize) -> Self {
        let bdd = Self {
            nodes: RefCell::new(Vec::new()),
            subtables: RefCell::new(Vec::new()),
            var_order: RefCell::new(Vec::new()),
            level_map: RefCell::new(vec![TERMINAL_LEVEL]),
            cache: RefCell::new(Cache::new(cache_bits)),
        };
        bdd.reset_storage();
        bdd
    }

    /// Reset node storage to just the sentinel and the terminal node.
    pub(crate) fn reset_storage(&self) {
        let mut nodes = self.nodes.borrow_mut();
        nodes.clear();
        let terminal = Node {
            variable: Var::TERMINAL,
            low: Ref::INVALID,
            high: Ref::INVALID,
        };
        // Slot 0 is a sentinel, slot 1 is the terminal node.
        nodes.push(terminal);
        nodes.push(terminal);
        for subtable in self.subtables.borrow_mut().iter_mut() {
            subtable.clear();
        }
        self.cache.borrow_mut().clear();
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("variables", &self.num_vars())
            .field("nodes", &self.num_nodes())
            .finish()
    }
}

impl Bdd {
    pub fn one(&self) -> Ref {
        Ref::positive(1)
    }
    pub fn zero(&self) -> Ref {
        -Ref::positive(1)
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero()
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one()
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 1
    }

    /// Number of allocated nodes, excluding the terminal.
    pub fn num_nodes(&self) -> usize {
        self.nodes.borrow().len() - 2
    }

    pub fn num_vars(&self) -> usize {
        self.var_order.borrow().len()
    }

    /// Allocate a fresh variable at the bottom of the current order.
    pub fn allocate_variable(&self) -> Var {
        let mut order = self.var_order.borrow_mut();
        let var = Var::new(order.len() as u32 + 1);
        self.level_map.borrow_mut().push(order.len());
        order.push(var);
        self.subtables.borrow_mut().push(Subtable::new(var));
        debug!("allocated {} at level {}", var, order.len() - 1);
        var
    }

    pub fn level(&self, var: Var) -> Level {
        Level::new(self.level_map.borrow()[var.index()])
    }

    pub fn var_at_level(&self, level: Level) -> Var {
        self.var_order.borrow()[level.index()]
    }

    /// The current order, top to bottom.
    pub fn order(&self) -> Vec<Var> {
        self.var_order.borrow().clone()
    }

    pub fn variable(&self, node: Ref) -> Var {
        self.nodes.borrow()[node.index()].variable
    }

    /// Level of the top variable of `node`; terminals sit below everything.
    pub(crate) fn node_level(&self, node: Ref) -> usize {
        if self.is_terminal(node) {
            TERMINAL_LEVEL
        } else {
            self.level_map.borrow()[self.variable(node).index()]
        }
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.nodes.borrow()[node.index()].low;
        if node.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.nodes.borrow()[node.index()].high;
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn mk_node(&self, v: Var, low: Ref, high: Ref) -> Ref {
        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        debug_assert!(self.node_level(low) > self.level(v).index());
        debug_assert!(self.node_level(high) > self.level(v).index());

        let slot = v.index() - 1;
        if let Some(index) = self.subtables.borrow()[slot].find(low, high) {
            return Ref::positive(index);
        }

        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len() as u32;
        nodes.push(Node {
            variable: v,
            low,
            high,
        });
        self.subtables.borrow_mut()[slot].insert(low, high, index);
        Ref::positive(index)
    }

    pub fn mk_var(&self, v: Var) -> Ref {
        self.mk_node(v, self.zero(), self.one())
    }

    /// Conjunction of literals.
    pub fn mk_cube(&self, literals: impl IntoIterator<Item = Lit>) -> Ref {
        let mut literals: Vec<Lit> = literals.into_iter().collect();
        // Build bottom-up: deepest level first.
        literals.sort_by_key(|lit| std::cmp::Reverse(self.level(lit.var())));
        let mut current = self.one();
        for lit in literals {
            current = if lit.is_positive() {
                self.mk_node(lit.var(), self.zero(), current)
            } else {
                self.mk_node(lit.var(), current, self.zero())
            };
        }
        current
    }

    /// Positive cube over `vars`, the form quantification expects.
    pub fn mk_var_cube(&self, vars: &[Var]) -> Ref {
        self.mk_cube(vars.iter().map(|&v| v.pos()))
    }

    pub fn top_cofactors(&self, node: Ref, v: Var) -> (Ref, Ref) {
        if self.is_terminal(node) || self.node_level(node) > self.level(v).index() {
            return (node, node);
        }
        debug_assert_eq!(self.variable(node), v);
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, self.one(), h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero());
        }
        if g == -f {
            return self.apply_ite(f, self.zero(), h);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one());
        }

        let i = self.node_level(f);
        let j = self.node_level(g);
        let k = self.node_level(h);

        // Equivalent pairs, choose the one with the topmost first argument:
        //   ite(F,1,H) == ite(H,1,F) == F ∨ H
        //   ite(F,G,0) == ite(G,F,0) == F ∧ G
        //   ite(F,G,1) == ite(~G,~F,1) == F -> G
        //   ite(F,0,H) == ite(~H,0,~F) == ~F ∧ H
        if self.is_one(g) && k < i {
            return self.apply_ite(h, self.one(), f);
        }
        if self.is_zero(h) && j < i {
            return self.apply_ite(g, f, self.zero());
        }
        if self.is_one(h) && j < i {
            return self.apply_ite(-g, -f, self.one());
        }
        if self.is_zero(g) && k < i {
            return self.apply_ite(-h, self.zero(), -f);
        }

        // ite(~F,G,H) => ite(F,H,G)
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        let m = i.min(j).min(k);
        let v = self.var_order.borrow()[m];

        let (f0, f1) = self.top_cofactors(f, v);
        let (g0, g1) = self.top_cofactors(g, v);
        let (h0, h1) = self.top_cofactors(h, v);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);

        let res = self.mk_node(v, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero())
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one(), v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one())
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one();
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero();
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.is_zero(self.apply_and(f, -g))
    }

    /// Drop the leading variables of a positive cube that sit above `level`.
    fn skip_cube_above(&self, mut cube: Ref, level: usize) -> Ref {
        while !self.is_one(cube) && self.node_level(cube) < level {
            cube = self.high_node(cube);
        }
        cube
    }

    /// Existential quantification: `∃vars. f`.
    pub fn exists(&self, f: Ref, vars: &[Var]) -> Ref {
        if vars.is_empty() {
            return f;
        }
        let cube = self.mk_var_cube(vars);
        self.exists_cube(f, cube)
    }

    /// Universal quantification: `∀vars. f`.
    pub fn forall(&self, f: Ref, vars: &[Var]) -> Ref {
        -self.exists(-f, vars)
    }

    /// Existential quantification over the variables of a positive cube.
    pub fn exists_cube(&self, f: Ref, cube: Ref) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        let top = self.node_level(f);
        let cube = self.skip_cube_above(cube, top);
        if self.is_one(cube) {
            return f;
        }

        let key = OpKey::Exists(f, cube);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let v = self.variable(f);
        let f0 = self.low_node(f);
        let f1 = self.high_node(f);
        let res = if self.node_level(cube) == top {
            let rest = self.high_node(cube);
            let r0 = self.exists_cube(f0, rest);
            if self.is_one(r0) {
                r0
            } else {
                let r1 = self.exists_cube(f1, rest);
                self.apply_or(r0, r1)
            }
        } else {
            let r0 = self.exists_cube(f0, cube);
            let r1 = self.exists_cube(f1, cube);
            self.mk_node(v, r0, r1)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Relational product: `∃vars. f ∧ g`, without building the conjunction first.
    pub fn rel_product(&self, f: Ref, g: Ref, vars: &[Var]) -> Ref {
        let cube = self.mk_var_cube(vars);
        self.and_exists(f, g, cube)
    }

    pub fn and_exists(&self, f: Ref, g: Ref, cube: Ref) -> Ref {
        if self.is_zero(f) || self.is_zero(g) || f == -g {
            return self.zero();
        }
        if self.is_one(f) {
            return self.exists_cube(g, cube);
        }
        if self.is_one(g) || f == g {
            return self.exists_cube(f, cube);
        }

        // Conjunction is commutative: normalize argument order for the cache.
        let (f, g) = if f.raw() <= g.raw() { (f, g) } else { (g, f) };

        let top = self.node_level(f).min(self.node_level(g));
        let cube = self.skip_cube_above(cube, top);
        if self.is_one(cube) {
            return self.apply_and(f, g);
        }

        let key = OpKey::RelProduct(f, g, cube);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let v = self.var_order.borrow()[top];
        let (f0, f1) = self.top_cofactors(f, v);
        let (g0, g1) = self.top_cofactors(g, v);

        let res = if self.node_level(cube) == top {
            let rest = self.high_node(cube);
            let r0 = self.and_exists(f0, g0, rest);
            if self.is_one(r0) {
                r0
            } else {
                let r1 = self.and_exists(f1, g1, rest);
                self.apply_or(r0, r1)
            }
        } else {
            let r0 = self.and_exists(f0, g0, cube);
            let r1 = self.and_exists(f1, g1, cube);
            self.mk_node(v, r0, r1)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Simultaneous variable substitution `f[v := map(v)]`.
    ///
    /// The map does not need to preserve the order: every node is rebuilt
    /// through ITE, so swapping current- and next-state variables works even
    /// when they are interleaved.
    pub fn rename_vars(&self, f: Ref, map: &HashMap<Var, Var>) -> Ref {
        if map.is_empty() {
            return f;
        }
        let mut cache = HashMap::new();
        self.rename_(f, map, &mut cache)
    }

    fn rename_(&self, f: Ref, map: &HashMap<Var, Var>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        let node = f.regular();
        let res = if let Some(&res) = cache.get(&node) {
            res
        } else {
            let v = self.variable(node);
            let low = self.rename_(self.low_node(node), map, cache);
            let high = self.rename_(self.high_node(node), map, cache);
            let target = map.get(&v).copied().unwrap_or(v);
            let res = self.apply_ite(self.mk_var(target), high, low);
            cache.insert(node, res);
            res
        };
        if f.is_negated() {
            -res
        } else {
            res
        }
    }

    /// Cofactor of `f` with respect to a partial assignment.
    pub fn restrict(&self, f: Ref, values: &HashMap<Var, bool>) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_(f, values, &mut cache)
    }

    fn restrict_(&self, f: Ref, values: &HashMap<Var, bool>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) || values.is_empty() {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f);
        let res = match values.get(&v) {
            Some(true) => self.restrict_(self.high_node(f), values, cache),
            Some(false) => self.restrict_(self.low_node(f), values, cache),
            None => {
                let low = self.restrict_(self.low_node(f), values, cache);
                let high = self.restrict_(self.high_node(f), values, cache);
                self.mk_node(v, low, high)
            }
        };
        cache.insert(f, res);
        res
    }

    /// Evaluate `f` under a total assignment.
    pub fn eval(&self, f: Ref, assignment: impl Fn(Var) -> bool) -> bool {
        let mut current = f;
        while !self.is_terminal(current) {
            current = if assignment(self.variable(current)) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }

    /// All nodes reachable from the given roots, terminal included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<usize> {
        let mut visited = HashSet::new();
        let mut stack: Vec<Ref> = nodes.into_iter().collect();
        while let Some(node) = stack.pop() {
            if visited.insert(node.index()) && !self.is_terminal(node) {
                stack.push(self.low_node(node));
                stack.push(self.high_node(node));
            }
        }
        visited
    }

    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }

    /// Variables `f` depends on, top to bottom.
    pub fn support(&self, f: Ref) -> Vec<Var> {
        let mut vars: HashSet<Var> = HashSet::new();
        for index in self.descendants([f]) {
            if index != 1 {
                vars.insert(self.nodes.borrow()[index].variable);
            }
        }
        let mut vars: Vec<Var> = vars.into_iter().collect();
        vars.sort_by_key(|&v| self.level(v));
        vars
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        format!(
            "{}:({}, {}, {})",
            node,
            self.variable(node),
            self.to_bracket_string(self.high_node(node)),
            self.to_bracket_string(self.low_node(node))
        )
    }
}
