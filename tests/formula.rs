//! End-to-end tests for formula-driven synthesis.

use mvsynth::expr::Expr;
use mvsynth::formula::{synthesize_from_formula, Formula, FormulaMachine, FormulaOptions, FormulaVar};
use mvsynth::{ModelingError, Phase, SynthError};
use test_log::test;

type F = Expr<FormulaVar>;

fn eq(a: F, b: F) -> F {
    F::not(F::xor(a, b))
}

// ─── Normalization ─────────────────────────────────────────────────────────────

#[test]
fn rank_one_groups_become_marks() {
    // Two letters a, b. After a=1 the letter must be 11, after a=0 it must be 00.
    let body = F::or(
        F::and(Formula::var(0, 0), F::and(Formula::var(1, 0), Formula::var(1, 1))),
        F::and(
            F::not(Formula::var(0, 0)),
            F::and(F::not(Formula::var(1, 0)), F::not(Formula::var(1, 1))),
        ),
    );
    let formula = Formula::new(["a", "b"], 1, body);
    let mut machine = FormulaMachine::new(&formula).unwrap();
    assert_eq!(machine.normalize(), 2);
    assert_eq!(machine.split_states(100).unwrap(), 0);
    assert_eq!(machine.marks().len(), 2);

    let aut = machine.into_automaton(&FormulaOptions::default()).unwrap();
    assert_eq!(aut.num_states(), 2);
    // 00 keeps a=0, 11 keeps a=1, so both marks loop on themselves.
    assert_eq!(aut.num_transitions(), 2);
    assert!(aut.transitions().iter().all(|t| t.from == t.to));
}

#[test]
fn splitting_stops_at_a_fixpoint() {
    // The letter repeats the one three steps back.
    let formula = Formula::new(["a"], 3, eq(Formula::var(0, 0), Formula::var(3, 0)));
    let mut machine = FormulaMachine::new(&formula).unwrap();
    machine.normalize();
    let first = machine.split_states(100).unwrap();
    assert!(first > 0);
    let count = machine.marks().len();
    assert_eq!(count, 8);

    assert_eq!(machine.split_states(100).unwrap(), 0);
    assert_eq!(machine.marks().len(), count);
}

#[test]
fn marks_stay_disjoint_after_splitting() {
    let formula = Formula::new(["a"], 2, eq(Formula::var(0, 0), Formula::var(2, 0)));
    let mut machine = FormulaMachine::new(&formula).unwrap();
    machine.normalize();
    machine.split_states(100).unwrap();
    let bdd = machine.bdd().clone();
    let marks = machine.marks();
    for (n, a) in marks.iter().enumerate() {
        for b in &marks[n + 1..] {
            assert!(bdd.is_zero(bdd.apply_and(a.mark, b.mark)));
        }
    }
}

// ─── Synthesis ─────────────────────────────────────────────────────────────────

#[test]
fn echo_automaton_is_deterministic() {
    let formula = Formula::new(["a"], 2, eq(Formula::var(0, 0), Formula::var(2, 0)));
    let aut = synthesize_from_formula(&formula, &FormulaOptions::default()).unwrap();
    assert_eq!(aut.num_states(), 4);
    assert_eq!(aut.check_deterministic(), Ok(()));
    for id in aut.state_ids() {
        assert_eq!(aut.outgoing(id).count(), 1);
    }
}

#[test]
fn initial_condition_selects_start_states() {
    let formula = Formula::new(["a"], 2, eq(Formula::var(0, 0), Formula::var(2, 0)))
        .with_init(F::and(F::not(Formula::var(0, 0)), F::not(Formula::var(1, 0))));
    let aut = synthesize_from_formula(&formula, &FormulaOptions::default()).unwrap();
    assert_eq!(aut.initial().len(), 1);
    // From history 00 only 0 can follow, forever.
    assert_eq!(aut.num_states(), 1);
}

#[test]
fn long_names_spell_the_history() {
    let formula = Formula::new(["a"], 1, eq(Formula::var(0, 0), Formula::var(1, 0)));
    let options = FormulaOptions::default().with_long_names(true);
    let aut = synthesize_from_formula(&formula, &options).unwrap();
    let names: Vec<_> = aut.states().map(|(_, s)| s.name.clone()).collect();
    assert_eq!(names, vec!["0", "1"]);
}

#[test]
fn state_budget_is_enforced() {
    let formula = Formula::new(["a"], 3, eq(Formula::var(0, 0), Formula::var(3, 0)));
    let options = FormulaOptions::default().with_state_limit(4);
    let err = synthesize_from_formula(&formula, &options).unwrap_err();
    assert!(matches!(
        err,
        SynthError::ResourceExceeded {
            phase: Phase::Splitting,
            limit: 4
        }
    ));
}

#[test]
fn malformed_formulas_are_modeling_errors() {
    let formula = Formula::new(["a", "b"], 1, Formula::var(1, 2));
    let err = synthesize_from_formula(&formula, &FormulaOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        SynthError::Modeling(ModelingError::FormulaVarOutOfRange { copy: 1, index: 2 })
    ));
}
