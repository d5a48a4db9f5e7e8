//! Subset construction over a partitioned relation.
//!
//! States are sets of concrete states. From a state `Q`, the successor
//! relation `P(a, ns)` is the image of `Q` under the transition partitions,
//! restricted to the legal alphabet assignments `P2(a)`. `P` is then split
//! into classes of alphabet assignments that reach exactly the same set of
//! next states; each class becomes one transition, each reached set one
//! state. States are explored in discovery order.
//!
//! Equation solving and STG extraction both run this loop; they differ in
//! the partitions they hand in and in whether there are conformance checks.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::automaton::{Automaton, StateId};
use crate::bdd::Bdd;
use crate::error::{Phase, Result, SynthError};
use crate::image::ImageScheduler;
use crate::reference::Ref;
use crate::types::Var;

pub struct SubsetConstruction<'a> {
    pub bdd: &'a Bdd,
    /// Image producing the successor relation over the alphabet and NS.
    pub transitions: ImageScheduler<'a>,
    /// Images producing the alphabet assignments violating one output.
    pub violations: Vec<ImageScheduler<'a>>,
    pub alphabet: Vec<Var>,
    /// Valid alphabet codes.
    pub domain: Ref,
    /// Alphabet bits the automaton cannot observe in Moore mode, with their
    /// valid codes.
    pub universal: Vec<Var>,
    pub universal_domain: Ref,
    pub moore: bool,
    pub ns: Vec<Var>,
    pub ns_to_cs: HashMap<Var, Var>,
    pub state_limit: usize,
    pub dont_care_accepting: bool,
}

impl SubsetConstruction<'_> {
    /// Explore everything reachable from `initial` (a set over CS).
    pub fn explore(&self, automaton: &mut Automaton, initial: Ref) -> Result<()> {
        let bdd = self.bdd;
        if bdd.is_zero(initial) {
            return Err(SynthError::inconsistency(
                Phase::Exploration,
                "initial states are inconsistent",
            ));
        }

        let start = automaton.add_state(initial, true);
        automaton.add_initial(start);
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            let subset = automaton.state(id).subset;
            debug!("exploring state {} ({} queued)", id, queue.len());

            let legal = self.legal_assignments(automaton, id, subset)?;

            let successors = self.transitions.image(subset)?;
            if bdd.is_zero(successors) {
                return Err(SynthError::inconsistency(
                    Phase::Exploration,
                    format!("state {} has no successor under any input", id),
                ));
            }

            let illegal = bdd.apply_and(self.domain, -legal);
            if !bdd.is_zero(illegal) {
                let dc = automaton.dont_care_state(self.dont_care_accepting);
                automaton.add_transition(id, dc, illegal);
            }

            let remaining = bdd.apply_and(successors, legal);
            self.split(automaton, &mut queue, id, remaining)?;
        }

        automaton.log_summary("exploration finished");
        Ok(())
    }

    /// Alphabet assignments under which every output conforms from every
    /// member of `subset`. Marks the state non-accepting when a Moore
    /// restriction leaves nothing.
    fn legal_assignments(&self, automaton: &mut Automaton, id: StateId, subset: Ref) -> Result<Ref> {
        let bdd = self.bdd;
        let mut legal = self.domain;
        for violation in &self.violations {
            let bad = violation.image(subset)?;
            legal = bdd.apply_and(legal, -bad);
        }

        if self.moore && !self.universal.is_empty() {
            let guarded = bdd.apply_imply(self.universal_domain, legal);
            let moore = bdd.apply_and(bdd.forall(guarded, &self.universal), self.domain);
            if bdd.is_zero(moore) {
                debug!("state {} is not accepting under the Moore restriction", id);
                automaton.state_mut(id).accepting = false;
            } else {
                legal = moore;
            }
        }
        Ok(legal)
    }

    /// Split `relation(a, ns)` into transitions to the sets of next states.
    fn split(
        &self,
        automaton: &mut Automaton,
        queue: &mut VecDeque<StateId>,
        from: StateId,
        mut relation: Ref,
    ) -> Result<()> {
        let bdd = self.bdd;
        while !bdd.is_zero(relation) {
            let enabled = bdd.exists(relation, &self.ns);
            let Some(minterm) = bdd.pick_minterm(enabled, &self.alphabet) else {
                break;
            };
            let point = bdd.mk_cube(minterm);

            // Everything reachable under this one assignment.
            let reached = bdd.rel_product(relation, point, &self.alphabet);
            let subset = bdd.rename_vars(reached, &self.ns_to_cs);

            let to = match automaton.lookup(subset) {
                Some(to) => to,
                None => {
                    let discovered = automaton.num_states() - usize::from(automaton.dont_care().is_some());
                    if discovered >= self.state_limit {
                        return Err(SynthError::ResourceExceeded {
                            phase: Phase::Exploration,
                            limit: self.state_limit,
                        });
                    }
                    let to = automaton.add_state(subset, true);
                    queue.push_back(to);
                    to
                }
            };

            // All assignments whose image is exactly `reached`.
            let differs = bdd.exists(bdd.apply_xor(relation, reached), &self.ns);
            let guard = bdd.apply_and(-differs, self.domain);
            debug_assert!(!bdd.is_zero(bdd.apply_and(guard, point)));
            automaton.add_transition(from, to, guard);
            relation = bdd.apply_and(relation, -guard);
        }
        Ok(())
    }
}
