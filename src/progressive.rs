//! Progressive restriction of a solution.
//!
//! A state is progressive when it is accepting and, whatever the fixed
//! component presents on `U`, some choice of `V` leads to another
//! progressive state. Non-progressive states are removed until none are
//! left; transitions into them go to the don't-care state instead.

use std::rc::Rc;

use log::{debug, info};

use crate::automaton::{Automaton, StateId};
use crate::error::{Result, SynthError};
use crate::mv::MvId;

pub fn make_progressive(automaton: &mut Automaton, u: &[MvId], v: &[MvId], dc_accepting: bool) -> Result<()> {
    let bdd = Rc::clone(automaton.bdd());
    let u_bits = automaton.encoding().bits_of(u);
    let v_bits = automaton.encoding().bits_of(v);
    let u_domain = automaton.encoding().domains(&bdd, u);
    let before = automaton.num_states();

    loop {
        let mut doomed: Vec<StateId> = Vec::new();
        for (id, state) in automaton.states() {
            if automaton.is_dont_care(id) {
                continue;
            }
            let progressive = state.accepting && {
                let onward = bdd.apply_or_many(
                    automaton
                        .outgoing(id)
                        .filter(|t| !automaton.is_dont_care(t.to))
                        .map(|t| t.guard),
                );
                let some_v = bdd.exists(bdd.apply_and(onward, automaton.domain()), &v_bits);
                let every_u = bdd.forall(bdd.apply_imply(u_domain, some_v), &u_bits);
                bdd.is_one(every_u)
            };
            if !progressive {
                doomed.push(id);
            }
        }
        if doomed.is_empty() {
            break;
        }
        for id in doomed {
            if automaton.initial().contains(&id) {
                return Err(SynthError::EmptySolution);
            }
            debug!("state {} is not progressive", id);
            automaton.redirect_to_dont_care(id, dc_accepting);
        }
    }

    automaton.complete(dc_accepting);
    info!(
        "progressive pass kept {} of {} states",
        automaton.num_states(),
        before
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;
    use crate::mv::{Encoding, MvVar, Role};

    /// s0 --(v=0)--> s1 --(any)--> s1, s0 --(v=1)--> DC; s1 may be rejecting.
    fn chain(s1_accepting: bool) -> Automaton {
        let bdd = Rc::new(Bdd::default());
        let mut enc = Encoding::new();
        let u = enc.add(&bdd, MvVar::new("u", 2, Role::U));
        let v = enc.add(&bdd, MvVar::new("v", 2, Role::V));
        let q = enc.add(&bdd, MvVar::new("q", 2, Role::CS));
        let mut aut = Automaton::new(Rc::clone(&bdd), enc.clone(), vec![u, v], vec![], vec![q]);
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        let s1 = aut.add_state(enc.value(&bdd, q, 1), s1_accepting);
        aut.add_initial(s0);
        aut.add_transition(s0, s1, enc.value(&bdd, v, 0));
        aut.add_transition(s1, s1, bdd.one());
        aut.complete(false);
        aut
    }

    fn ids(aut: &Automaton) -> (Vec<MvId>, Vec<MvId>) {
        (vec![aut.alphabet()[0]], vec![aut.alphabet()[1]])
    }

    #[test]
    fn test_progressive_solution_is_kept() {
        let mut aut = chain(true);
        let (u, v) = ids(&aut);
        make_progressive(&mut aut, &u, &v, false).unwrap();
        // v=0 always has a way forward; the don't-care state stays reachable.
        assert_eq!(aut.num_states(), 3);
        assert_eq!(aut.check_complete(), Ok(()));
    }

    #[test]
    fn test_rejecting_successor_empties_solution() {
        let mut aut = chain(false);
        let (u, v) = ids(&aut);
        let err = make_progressive(&mut aut, &u, &v, false).unwrap_err();
        assert!(matches!(err, SynthError::EmptySolution));
    }
}
