//! Partitioned image computation with early quantification.
//!
//! The image of a set `Q` under partitions `P₁ … Pₙ` is
//! `∃X. Q ∧ P₁ ∧ … ∧ Pₙ`, where `X` is everything that does not have to
//! survive. Building the conjunction first is hopeless for real systems, so
//! the partitions are conjoined one at a time and each variable is
//! quantified right after the last partition that mentions it.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::bdd::Bdd;
use crate::error::{Phase, Result, SynthError};
use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Clone)]
struct Scheduled {
    relation: Ref,
    support: HashSet<Var>,
}

pub struct ImageScheduler<'a> {
    bdd: &'a Bdd,
    parts: Vec<Scheduled>,
    keep: HashSet<Var>,
    node_limit: usize,
}

impl<'a> ImageScheduler<'a> {
    /// Schedule `relations` for images that keep only the variables in `keep`.
    pub fn new(bdd: &'a Bdd, relations: &[Ref], keep: &[Var], node_limit: usize) -> Self {
        let keep: HashSet<Var> = keep.iter().copied().collect();
        let mut pending: Vec<Scheduled> = relations
            .iter()
            .filter(|&&r| !bdd.is_one(r))
            .map(|&relation| Scheduled {
                relation,
                support: bdd.support(relation).into_iter().collect(),
            })
            .collect();

        // Greedy order: next is the part that lets the most variables go
        // while introducing the fewest new ones.
        let mut parts = Vec::with_capacity(pending.len());
        let mut seen: HashSet<Var> = HashSet::new();
        while !pending.is_empty() {
            let best = (0..pending.len())
                .max_by_key(|&i| {
                    let part = &pending[i];
                    let dying = part
                        .support
                        .iter()
                        .filter(|v| !keep.contains(v))
                        .filter(|v| {
                            pending
                                .iter()
                                .enumerate()
                                .all(|(j, other)| j == i || !other.support.contains(v))
                        })
                        .count() as isize;
                    let fresh = part.support.iter().filter(|v| !seen.contains(v)).count() as isize;
                    // Ties go to the earliest part.
                    (dying - fresh, -(i as isize))
                })
                .unwrap_or(0);
            let part = pending.remove(best);
            seen.extend(part.support.iter().copied());
            parts.push(part);
        }
        debug!("scheduled {} partitions, keeping {} variables", parts.len(), keep.len());

        ImageScheduler {
            bdd,
            parts,
            keep,
            node_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `∃(everything not kept). from ∧ ⋀ parts`.
    pub fn image(&self, from: Ref) -> Result<Ref> {
        let bdd = self.bdd;
        if bdd.is_zero(from) {
            return Ok(from);
        }

        // Position of the last conjunct mentioning each quantified variable;
        // 0 is `from` itself.
        let mut last: HashMap<Var, usize> = HashMap::new();
        for v in bdd.support(from) {
            if !self.keep.contains(&v) {
                last.insert(v, 0);
            }
        }
        for (i, part) in self.parts.iter().enumerate() {
            for &v in &part.support {
                if !self.keep.contains(&v) {
                    last.insert(v, i + 1);
                }
            }
        }
        let mut dying: Vec<Vec<Var>> = vec![Vec::new(); self.parts.len() + 1];
        for (v, i) in last {
            dying[i].push(v);
        }

        let mut acc = bdd.exists(from, &dying[0]);
        for (i, part) in self.parts.iter().enumerate() {
            let cube = bdd.mk_var_cube(&dying[i + 1]);
            acc = bdd.and_exists(acc, part.relation, cube);
            if bdd.is_zero(acc) {
                break;
            }
            // Leftovers of earlier images stay in the arena, so only the
            // product itself counts.
            let size = bdd.size(acc);
            if size > self.node_limit {
                return Err(SynthError::Diagram {
                    phase: Phase::Exploration,
                    message: format!(
                        "product of {} nodes exceeds the limit of {} after conjoining {} of {} partitions",
                        size,
                        self.node_limit,
                        i + 1,
                        self.parts.len()
                    ),
                });
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_image_matches_monolithic() {
        let bdd = Bdd::default();
        // cs0 cs1 -> ns0 = cs1, ns1 = cs0 ^ i
        let i = bdd.allocate_variable();
        let cs: Vec<Var> = (0..2).map(|_| bdd.allocate_variable()).collect();
        let ns: Vec<Var> = (0..2).map(|_| bdd.allocate_variable()).collect();
        let x = |v: Var| bdd.mk_var(v);
        let p0 = bdd.apply_eq(x(ns[0]), x(cs[1]));
        let p1 = bdd.apply_eq(x(ns[1]), bdd.apply_xor(x(cs[0]), x(i)));

        let from = bdd.mk_cube([cs[0].pos(), cs[1].neg()]);
        let scheduler = ImageScheduler::new(&bdd, &[p0, p1], &ns, 1 << 20);
        let image = scheduler.image(from).unwrap();

        let all = bdd.apply_and_many([from, p0, p1]);
        let expected = bdd.exists(all, &[i, cs[0], cs[1]]);
        assert_eq!(image, expected);
        // ns0 = 0, ns1 free
        assert_eq!(image, bdd.mk_cube([ns[0].neg()]));
    }

    #[test]
    fn test_kept_variables_survive() {
        let bdd = Bdd::default();
        let a = bdd.allocate_variable();
        let b = bdd.allocate_variable();
        let rel = bdd.apply_eq(bdd.mk_var(a), bdd.mk_var(b));
        let scheduler = ImageScheduler::new(&bdd, &[rel], &[a, b], 1 << 20);
        assert_eq!(scheduler.image(bdd.mk_var(a)).unwrap(), bdd.mk_cube([a.pos(), b.pos()]));
        assert_eq!(scheduler.image(bdd.zero()).unwrap(), bdd.zero());
    }

    #[test]
    fn test_node_limit_is_reported() {
        let bdd = Bdd::default();
        let a = bdd.allocate_variable();
        let b = bdd.allocate_variable();
        let rel = bdd.apply_xor(bdd.mk_var(a), bdd.mk_var(b));
        let scheduler = ImageScheduler::new(&bdd, &[rel], &[a, b], 0);
        let err = scheduler.image(bdd.mk_var(a)).unwrap_err();
        assert!(matches!(err, SynthError::Diagram { phase: Phase::Exploration, .. }));
    }

    #[test]
    fn test_node_limit_ignores_unrelated_nodes() {
        let bdd = Bdd::default();
        let a = bdd.allocate_variable();
        let b = bdd.allocate_variable();
        let rel = bdd.apply_eq(bdd.mk_var(a), bdd.mk_var(b));

        // Fill the arena with a function the image never touches.
        let others: Vec<Var> = (0..24).map(|_| bdd.allocate_variable()).collect();
        let mut junk = bdd.zero();
        for (k, &v) in others.iter().enumerate() {
            let term = bdd.apply_and(bdd.mk_var(v), bdd.mk_var(others[(k * 7 + 3) % others.len()]));
            junk = bdd.apply_xor(junk, term);
        }
        assert!(bdd.size(junk) > 8);
        assert!(bdd.num_nodes() > 50);

        let scheduler = ImageScheduler::new(&bdd, &[rel], &[a, b], 8);
        assert_eq!(scheduler.image(bdd.mk_var(a)).unwrap(), bdd.mk_cube([a.pos(), b.pos()]));
    }
}
