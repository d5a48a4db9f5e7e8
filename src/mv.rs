//! Multi-valued variables and their binary encoding.
//!
//! A variable of arity `k` is encoded with `ceil(log2 k)` diagram variables,
//! most significant bit first. Value `j` is the code whose bits spell `j` in
//! binary; codes `>= k` are invalid and excluded by [`Encoding::domain`].
//! The encoding of a variable never changes once allocated.

use std::collections::HashMap;
use std::fmt;

use crate::bdd::Bdd;
use crate::error::ModelingError;
use crate::reference::Ref;
use crate::types::{Lit, Var};
use crate::utils::bits_for;

/// Role of a variable in a synthesis problem.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    /// Environment input.
    I,
    /// Observable output.
    O,
    /// Signal from the fixed component into the unknown one.
    U,
    /// Signal from the unknown component into the fixed one.
    V,
    /// Current state of a latch.
    CS,
    /// Next state of a latch.
    NS,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::I => "I",
            Role::O => "O",
            Role::U => "U",
            Role::V => "V",
            Role::CS => "CS",
            Role::NS => "NS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MvVar {
    pub name: String,
    pub arity: usize,
    pub role: Role,
    /// Symbolic value names, `values.len() == arity` when present.
    pub values: Option<Vec<String>>,
}

impl MvVar {
    pub fn new(name: impl Into<String>, arity: usize, role: Role) -> Self {
        assert!(arity >= 2, "Multi-valued variables need at least two values");
        MvVar {
            name: name.into(),
            arity,
            role,
            values: None,
        }
    }

    /// Like [`MvVar::new`], but reports a single-valued signal `name`
    /// instead of panicking.
    pub fn checked(name: impl Into<String>, arity: usize, role: Role) -> Result<Self, ModelingError> {
        let name = name.into();
        if arity < 2 {
            return Err(ModelingError::SingleValued(name));
        }
        Ok(MvVar::new(name, arity, role))
    }

    pub fn with_values(mut self, values: Option<Vec<String>>) -> Self {
        if let Some(names) = &values {
            assert_eq!(names.len(), self.arity, "One name per value");
        }
        self.values = values;
        self
    }

    pub fn num_bits(&self) -> usize {
        bits_for(self.arity)
    }

    pub fn value_name(&self, value: usize) -> String {
        match &self.values {
            Some(names) => names[value].clone(),
            None => value.to_string(),
        }
    }
}

/// Index of a variable inside an [`Encoding`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MvId(pub usize);

/// The mapping from multi-valued variables to diagram variables.
#[derive(Debug, Clone, Default)]
pub struct Encoding {
    vars: Vec<MvVar>,
    bits: Vec<Vec<Var>>,
    by_name: HashMap<String, MvId>,
}

impl Encoding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the bits of `var` at the bottom of the current order.
    ///
    /// # Panics
    ///
    /// Panics if a variable with the same name is already encoded.
    pub fn add(&mut self, bdd: &Bdd, var: MvVar) -> MvId {
        assert!(
            !self.by_name.contains_key(&var.name),
            "Variable '{}' is already encoded",
            var.name
        );
        let bits = (0..var.num_bits()).map(|_| bdd.allocate_variable()).collect();
        let id = MvId(self.vars.len());
        self.by_name.insert(var.name.clone(), id);
        self.vars.push(var);
        self.bits.push(bits);
        id
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn var(&self, id: MvId) -> &MvVar {
        &self.vars[id.0]
    }

    pub fn bits(&self, id: MvId) -> &[Var] {
        &self.bits[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<MvId> {
        self.by_name.get(name).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = MvId> {
        (0..self.vars.len()).map(MvId)
    }

    pub fn with_role(&self, role: Role) -> Vec<MvId> {
        self.ids().filter(|&id| self.var(id).role == role).collect()
    }

    /// The variable a diagram bit belongs to.
    pub fn owner_of(&self, bit: Var) -> Option<MvId> {
        self.ids().find(|&id| self.bits(id).contains(&bit))
    }

    /// Find an unused name, starting from `base`.
    pub fn fresh_name(&self, base: &str) -> String {
        if !self.by_name.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|name| !self.by_name.contains_key(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// All bits of the given variables, in encoding order.
    pub fn bits_of(&self, ids: &[MvId]) -> Vec<Var> {
        ids.iter().flat_map(|&id| self.bits(id).iter().copied()).collect()
    }

    /// Literals of the code of `value`.
    pub fn code(&self, id: MvId, value: usize) -> Vec<Lit> {
        let bits = self.bits(id);
        let n = bits.len();
        bits.iter()
            .enumerate()
            .map(|(i, &v)| Lit::new(v, (value >> (n - 1 - i)) & 1 == 1))
            .collect()
    }

    /// Characteristic function of `id == value`.
    pub fn value(&self, bdd: &Bdd, id: MvId, value: usize) -> Ref {
        debug_assert!(value < self.var(id).arity);
        bdd.mk_cube(self.code(id, value))
    }

    /// Characteristic function of `id ∈ values`.
    pub fn values(&self, bdd: &Bdd, id: MvId, values: &[usize]) -> Ref {
        bdd.apply_or_many(values.iter().map(|&v| self.value(bdd, id, v)))
    }

    /// Valid codes of `id`: `true` when the arity is a power of two.
    pub fn domain(&self, bdd: &Bdd, id: MvId) -> Ref {
        let arity = self.var(id).arity;
        if arity == 1 << self.bits(id).len() {
            return bdd.one();
        }
        let all: Vec<usize> = (0..arity).collect();
        self.values(bdd, id, &all)
    }

    /// Conjunction of the domains of `ids`.
    pub fn domains(&self, bdd: &Bdd, ids: &[MvId]) -> Ref {
        bdd.apply_and_many(ids.iter().map(|&id| self.domain(bdd, id)))
    }

    /// `a == b` for two variables with the same number of bits.
    pub fn equal(&self, bdd: &Bdd, a: MvId, b: MvId) -> Ref {
        let (xs, ys) = (self.bits(a), self.bits(b));
        assert_eq!(xs.len(), ys.len(), "Encodings differ in width");
        bdd.apply_and_many(
            xs.iter()
                .zip(ys)
                .map(|(&x, &y)| bdd.apply_eq(bdd.mk_var(x), bdd.mk_var(y))),
        )
    }

    /// Decode the value of `id` from a (partial) bit assignment.
    ///
    /// Missing bits read as false. Returns `None` for an invalid code.
    pub fn decode(&self, id: MvId, assignment: &HashMap<Var, bool>) -> Option<usize> {
        let value = self
            .bits(id)
            .iter()
            .fold(0usize, |acc, v| (acc << 1) | assignment.get(v).copied().unwrap_or(false) as usize);
        (value < self.var(id).arity).then_some(value)
    }

    /// Values of `id` allowed by a cube, given as literals over any variables.
    pub fn cube_values(&self, id: MvId, cube: &[Lit]) -> Vec<usize> {
        let bits = self.bits(id);
        let n = bits.len();
        (0..self.var(id).arity)
            .filter(|&value| {
                cube.iter().all(|lit| match bits.iter().position(|&b| b == lit.var()) {
                    Some(i) => ((value >> (n - 1 - i)) & 1 == 1) == lit.value(),
                    None => true,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_encoding_widths() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let a = enc.add(&bdd, MvVar::new("a", 2, Role::I));
        let b = enc.add(&bdd, MvVar::new("b", 3, Role::CS));
        let c = enc.add(&bdd, MvVar::new("c", 5, Role::O));
        assert_eq!(enc.bits(a).len(), 1);
        assert_eq!(enc.bits(b).len(), 2);
        assert_eq!(enc.bits(c).len(), 3);
        assert_eq!(bdd.num_vars(), 6);
        assert_eq!(enc.lookup("b"), Some(b));
        assert_eq!(enc.with_role(Role::O), vec![c]);
    }

    #[test]
    fn test_values_are_disjoint_and_cover_domain() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let x = enc.add(&bdd, MvVar::new("x", 3, Role::I));

        let codes: Vec<Ref> = (0..3).map(|v| enc.value(&bdd, x, v)).collect();
        for i in 0..3 {
            for j in (i + 1)..3 {
                assert!(bdd.is_zero(bdd.apply_and(codes[i], codes[j])));
            }
        }
        assert_eq!(bdd.apply_or_many(codes), enc.domain(&bdd, x));
        assert!(!bdd.is_one(enc.domain(&bdd, x)));
    }

    #[test]
    fn test_decode_roundtrip() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let x = enc.add(&bdd, MvVar::new("x", 5, Role::CS));

        for value in 0..5 {
            let assignment: HashMap<Var, bool> = enc
                .code(x, value)
                .into_iter()
                .map(|lit| (lit.var(), lit.value()))
                .collect();
            assert_eq!(enc.decode(x, &assignment), Some(value));
        }
        let invalid: HashMap<Var, bool> = enc.bits(x).iter().map(|&v| (v, true)).collect();
        assert_eq!(enc.decode(x, &invalid), None);
    }

    #[test]
    fn test_cube_values() {
        let bdd = Bdd::default();
        let mut enc = Encoding::new();
        let x = enc.add(&bdd, MvVar::new("x", 3, Role::I));
        let msb = enc.bits(x)[0];
        assert_eq!(enc.cube_values(x, &[msb.neg()]), vec![0, 1]);
        assert_eq!(enc.cube_values(x, &[msb.pos()]), vec![2]);
        assert_eq!(enc.cube_values(x, &[]), vec![0, 1, 2]);
    }
}
