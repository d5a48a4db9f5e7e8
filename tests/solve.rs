//! End-to-end tests for language equation solving.
//!
//! The fixed component in most tests forwards the environment input `i` to
//! the unknown component as `u` and drives its output `o` from `v`, so the
//! unknown component has to produce on `v` whatever the specification wants
//! on `o`.

use mvsynth::automaton::Automaton;
use mvsynth::expr::Expr;
use mvsynth::network::{lit, Network};
use mvsynth::solve::{solve, SolveOptions};
use mvsynth::{ModelingError, Phase, SynthError};
use test_log::test;

fn forwarding() -> Network {
    let mut net = Network::new("forward");
    net.add_input("i", 2)
        .add_input("v", 2)
        .add_buffer("u", "i")
        .add_buffer("o", "v")
        .add_output("o");
    net
}

/// `o` equals `i`.
fn identity_spec() -> Network {
    let mut net = Network::new("identity");
    net.add_input("i", 2).add_buffer("o", "i").add_output("o");
    net
}

/// `o` equals `i` delayed by one step, starting at 0.
fn delay_spec() -> Network {
    let mut net = Network::new("delay");
    net.add_input("i", 2)
        .add_buffer("n", "i")
        .add_latch("n", "p", 0)
        .add_buffer("o", "p")
        .add_output("o");
    net
}

/// Completeness, guard partition and dedup soundness.
fn assert_well_formed(aut: &Automaton) {
    let bdd = aut.bdd();
    assert_eq!(aut.check_complete(), Ok(()));
    assert_eq!(aut.check_deterministic(), Ok(()));
    for id in aut.state_ids() {
        let covered = bdd.apply_and(aut.covered(id), aut.domain());
        assert_eq!(covered, aut.domain(), "guards of {} do not cover the alphabet", id);
    }
    let ids: Vec<_> = aut.state_ids().into_iter().filter(|&id| !aut.is_dont_care(id)).collect();
    for (n, &a) in ids.iter().enumerate() {
        for &b in &ids[n + 1..] {
            let same = bdd.apply_eq(aut.state(a).subset, aut.state(b).subset);
            assert!(!bdd.is_one(same), "states {} and {} denote the same set", a, b);
        }
    }
}

// ─── Solutions ─────────────────────────────────────────────────────────────────

#[test]
fn combinational_solution_copies_u_to_v() {
    let aut = solve(&forwarding(), &identity_spec(), "u", "v", &SolveOptions::default()).unwrap();
    assert_well_formed(&aut);

    let enc = aut.encoding();
    let bdd = aut.bdd();
    let u = enc.lookup("u").unwrap();
    let v = enc.lookup("v").unwrap();

    assert_eq!(aut.num_states(), 2);
    let s0 = aut.initial()[0];
    let dc = aut.dont_care().unwrap();
    let stay = aut.outgoing(s0).find(|t| t.to == s0).unwrap();
    assert_eq!(stay.guard, enc.equal(bdd, u, v));
    let bail = aut.outgoing(s0).find(|t| t.to == dc).unwrap();
    assert_eq!(bail.guard, -enc.equal(bdd, u, v));
}

#[test]
fn sequential_solution_remembers_u() {
    let aut = solve(&forwarding(), &delay_spec(), "u", "v", &SolveOptions::default()).unwrap();
    assert_well_formed(&aut);
    // Two remembered values and the don't-care state.
    assert_eq!(aut.num_states(), 3);
    assert_eq!(aut.num_transitions(), 7);
    assert!(aut.states().all(|(id, s)| s.accepting != aut.is_dont_care(id)));
}

#[test]
fn impossible_specification_goes_to_dont_care() {
    let mut fixed = Network::new("identity");
    fixed.add_input("i", 2).add_buffer("o", "i").add_output("o");
    let mut spec = Network::new("inverter");
    spec.add_input("i", 2)
        .add_node("o", 2, vec![lit("i", &[1]), lit("i", &[0])])
        .add_output("o");

    let aut = solve(&fixed, &spec, "", "", &SolveOptions::default()).unwrap();
    assert_well_formed(&aut);
    let s0 = aut.initial()[0];
    let out: Vec<_> = aut.outgoing(s0).collect();
    assert_eq!(out.len(), 1);
    assert_eq!(Some(out[0].to), aut.dont_care());
}

#[test]
fn long_names_use_latch_values() {
    let options = SolveOptions::default().with_long_names(true);
    let aut = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap();
    let mut names: Vec<_> = aut.states().map(|(_, s)| s.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["0", "1", "DC"]);
}

#[test]
fn dont_care_can_be_accepting() {
    let options = SolveOptions::default().with_dont_care_accepting(true);
    let aut = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap();
    let dc = aut.dont_care().unwrap();
    assert!(aut.state(dc).accepting);
}

#[test]
fn shuffling_does_not_change_the_result() {
    let plain = solve(
        &forwarding(),
        &delay_spec(),
        "u",
        "v",
        &SolveOptions::default().with_shuffle(false),
    )
    .unwrap();
    let shuffled = solve(&forwarding(), &delay_spec(), "u", "v", &SolveOptions::default()).unwrap();
    assert_eq!(plain.stats(), shuffled.stats());
}

// ─── Moore and progressive modes ───────────────────────────────────────────────

#[test]
fn moore_rejects_same_step_reaction() {
    let options = SolveOptions::default().with_moore(true);
    let aut = solve(&forwarding(), &identity_spec(), "u", "v", &options).unwrap();
    assert!(!aut.state(aut.initial()[0]).accepting);
}

#[test]
fn moore_accepts_delayed_reaction() {
    let options = SolveOptions::default().with_moore(true);
    let aut = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap();
    assert_eq!(aut.num_states(), 3);
    assert!(aut.states().all(|(id, s)| s.accepting || aut.is_dont_care(id)));
}

#[test]
fn progressive_keeps_a_progressive_solution() {
    let options = SolveOptions::default().with_progressive(true);
    let aut = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap();
    assert_well_formed(&aut);
    assert_eq!(aut.num_states(), 3);
}

#[test]
fn progressive_moore_identity_has_no_solution() {
    let options = SolveOptions::default().with_moore(true).with_progressive(true);
    let err = solve(&forwarding(), &identity_spec(), "u", "v", &options).unwrap_err();
    assert!(matches!(err, SynthError::EmptySolution));
}

// ─── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn state_budget_is_enforced() {
    let options = SolveOptions::default().with_state_limit(1);
    let err = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap_err();
    assert!(matches!(
        err,
        SynthError::ResourceExceeded {
            phase: Phase::Exploration,
            limit: 1
        }
    ));
}

#[test]
fn node_budget_is_enforced() {
    let options = SolveOptions::default().with_node_limit(1);
    let err = solve(&forwarding(), &delay_spec(), "u", "v", &options).unwrap_err();
    assert!(matches!(err, SynthError::Diagram { .. }));
}

#[test]
fn structural_checks_fail_before_solving() {
    let err = solve(&forwarding(), &identity_spec(), "u, u", "v", &SolveOptions::default()).unwrap_err();
    assert!(matches!(err, SynthError::Modeling(ModelingError::DuplicateU(ref name)) if name == "u"));

    let err = solve(&forwarding(), &identity_spec(), "u", "i", &SolveOptions::default()).unwrap_err();
    assert!(matches!(err, SynthError::Modeling(ModelingError::InputIsV(ref name)) if name == "i"));

    let err = solve(&forwarding(), &identity_spec(), "x", "v", &SolveOptions::default()).unwrap_err();
    assert!(matches!(err, SynthError::Modeling(ModelingError::UNotFixedNode(ref name)) if name == "x"));
}

#[test]
fn partial_transition_function_is_inconsistent() {
    let mut spec = Network::new("partial");
    // No value at all when `i` is 1.
    spec.add_input("i", 2)
        .add_node("n", 2, vec![lit("i", &[0]), Expr::from(false)])
        .add_latch("n", "p", 0)
        .add_buffer("o", "p")
        .add_output("o");
    let err = solve(&forwarding(), &spec, "u", "v", &SolveOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        SynthError::Inconsistency {
            phase: Phase::Partitioning,
            ..
        }
    ));
}
