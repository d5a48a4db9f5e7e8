//! Symbolic automata.
//!
//! A state carries the set of concrete states it stands for (its *subset*, a
//! function over current-state variables); a transition carries a guard over
//! the alphabet variables. States live in an arena and are referred to by
//! index. Subsets are unique: the canonical [`Ref`] of a subset is the key
//! of the dedup table, so two states never denote the same set.
//!
//! The optional don't-care state is absorbing and has an empty subset; it
//! is never entered into the dedup table.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::bdd::Bdd;
use crate::mv::{Encoding, MvId};
use crate::reference::Ref;
use crate::types::Var;

pub type StateId = usize;

#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    /// Concrete states this state stands for; zero for the don't-care state.
    pub subset: Ref,
    pub accepting: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
    pub guard: Ref,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AutomatonStats {
    pub states: usize,
    pub transitions: usize,
    pub accepting: usize,
}

/// A guard as a multi-valued sum of products: each cube lists the alphabet
/// variables it constrains with their allowed values.
pub type Cover = Vec<Vec<(MvId, Vec<usize>)>>;

pub struct Automaton {
    bdd: Rc<Bdd>,
    encoding: Encoding,
    alphabet: Vec<MvId>,
    /// Alphabet variables the automaton produces rather than reads.
    outputs: Vec<MvId>,
    /// Variables the subsets range over.
    latches: Vec<MvId>,
    states: Vec<Option<State>>,
    transitions: Vec<Transition>,
    /// Position in `transitions` of the edge between two states.
    edges: HashMap<(StateId, StateId), usize>,
    /// Positions of the outgoing and incoming transitions of each state.
    by_source: Vec<Vec<usize>>,
    by_target: Vec<Vec<usize>>,
    initial: Vec<StateId>,
    table: HashMap<Ref, StateId>,
    dont_care: Option<StateId>,
}

impl Automaton {
    pub fn new(bdd: Rc<Bdd>, encoding: Encoding, alphabet: Vec<MvId>, outputs: Vec<MvId>, latches: Vec<MvId>) -> Self {
        debug_assert!(outputs.iter().all(|o| alphabet.contains(o)));
        Automaton {
            bdd,
            encoding,
            alphabet,
            outputs,
            latches,
            states: Vec::new(),
            transitions: Vec::new(),
            edges: HashMap::new(),
            by_source: Vec::new(),
            by_target: Vec::new(),
            initial: Vec::new(),
            table: HashMap::new(),
            dont_care: None,
        }
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn alphabet(&self) -> &[MvId] {
        &self.alphabet
    }

    /// Alphabet variables read by the automaton.
    pub fn inputs(&self) -> Vec<MvId> {
        self.alphabet
            .iter()
            .copied()
            .filter(|id| !self.outputs.contains(id))
            .collect()
    }

    pub fn outputs(&self) -> &[MvId] {
        &self.outputs
    }

    pub fn latches(&self) -> &[MvId] {
        &self.latches
    }

    pub fn alphabet_bits(&self) -> Vec<Var> {
        self.encoding.bits_of(&self.alphabet)
    }

    /// Valid codes of the alphabet.
    pub fn domain(&self) -> Ref {
        self.encoding.domains(&self.bdd, &self.alphabet)
    }

    // States

    pub fn add_state(&mut self, subset: Ref, accepting: bool) -> StateId {
        debug_assert!(!self.bdd.is_zero(subset), "Empty subsets never become states");
        debug_assert!(!self.table.contains_key(&subset));
        let id = self.states.len();
        self.states.push(Some(State {
            name: format!("s{}", id),
            subset,
            accepting,
        }));
        self.by_source.push(Vec::new());
        self.by_target.push(Vec::new());
        self.table.insert(subset, id);
        debug!("new state {} for subset {}", id, subset);
        id
    }

    pub fn lookup(&self, subset: Ref) -> Option<StateId> {
        self.table.get(&subset).copied()
    }

    pub fn add_initial(&mut self, id: StateId) {
        if !self.initial.contains(&id) {
            self.initial.push(id);
        }
    }

    pub fn initial(&self) -> &[StateId] {
        &self.initial
    }

    /// The don't-care state, created on first use.
    pub fn dont_care_state(&mut self, accepting: bool) -> StateId {
        if let Some(id) = self.dont_care {
            return id;
        }
        let id = self.states.len();
        self.states.push(Some(State {
            name: "DC".to_string(),
            subset: self.bdd.zero(),
            accepting,
        }));
        self.by_source.push(Vec::new());
        self.by_target.push(Vec::new());
        self.dont_care = Some(id);
        debug!("don't-care state {}", id);
        id
    }

    pub fn dont_care(&self) -> Option<StateId> {
        self.dont_care
    }

    pub fn is_dont_care(&self, id: StateId) -> bool {
        self.dont_care == Some(id)
    }

    /// # Panics
    ///
    /// Panics if the state was removed.
    pub fn state(&self, id: StateId) -> &State {
        match &self.states[id] {
            Some(state) => state,
            None => panic!("State {} was removed", id),
        }
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        match &mut self.states[id] {
            Some(state) => state,
            None => panic!("State {} was removed", id),
        }
    }

    pub fn is_live(&self, id: StateId) -> bool {
        matches!(self.states.get(id), Some(Some(_)))
    }

    /// Live states in index order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.as_ref().map(|s| (id, s)))
    }

    pub fn state_ids(&self) -> Vec<StateId> {
        self.states().map(|(id, _)| id).collect()
    }

    pub fn num_states(&self) -> usize {
        self.states().count()
    }

    /// Remove a state together with every transition touching it.
    pub fn remove_state(&mut self, id: StateId) {
        let Some(state) = self.states[id].take() else {
            return;
        };
        if self.table.get(&state.subset) == Some(&id) {
            self.table.remove(&state.subset);
        }
        if self.dont_care == Some(id) {
            self.dont_care = None;
        }
        self.transitions.retain(|t| t.from != id && t.to != id);
        self.reindex();
        self.initial.retain(|&s| s != id);
        debug!("removed state {}", id);
    }

    /// Send everything entering `id` to the don't-care state, then remove it.
    pub fn redirect_to_dont_care(&mut self, id: StateId, dc_accepting: bool) {
        let incoming: Vec<Transition> = self.incoming(id).filter(|t| t.from != id).copied().collect();
        self.remove_state(id);
        if incoming.is_empty() {
            return;
        }
        let dc = self.dont_care_state(dc_accepting);
        for t in incoming {
            if self.is_live(t.from) {
                self.add_transition(t.from, dc, t.guard);
            }
        }
    }

    // Transitions

    /// Add a transition; guards of parallel transitions are merged.
    pub fn add_transition(&mut self, from: StateId, to: StateId, guard: Ref) {
        if self.bdd.is_zero(guard) {
            return;
        }
        if let Some(&k) = self.edges.get(&(from, to)) {
            let t = &mut self.transitions[k];
            t.guard = self.bdd.apply_or(t.guard, guard);
        } else {
            let k = self.transitions.len();
            self.transitions.push(Transition { from, to, guard });
            self.edges.insert((from, to), k);
            self.by_source[from].push(k);
            self.by_target[to].push(k);
        }
    }

    /// Rebuild the edge index after transitions moved.
    fn reindex(&mut self) {
        self.edges.clear();
        self.by_source = vec![Vec::new(); self.states.len()];
        self.by_target = vec![Vec::new(); self.states.len()];
        for (k, t) in self.transitions.iter().enumerate() {
            self.edges.insert((t.from, t.to), k);
            self.by_source[t.from].push(k);
            self.by_target[t.to].push(k);
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = &Transition> + '_ {
        let list = self.by_source.get(id).map_or(&[][..], |l| &l[..]);
        list.iter().map(move |&k| &self.transitions[k])
    }

    pub fn incoming(&self, id: StateId) -> impl Iterator<Item = &Transition> + '_ {
        let list = self.by_target.get(id).map_or(&[][..], |l| &l[..]);
        list.iter().map(move |&k| &self.transitions[k])
    }

    /// Disjunction of the outgoing guards of `id`.
    pub fn covered(&self, id: StateId) -> Ref {
        self.bdd.apply_or_many(self.outgoing(id).map(|t| t.guard))
    }

    // Completion

    /// Route every alphabet assignment without a successor to the don't-care
    /// state. Produced alphabet variables are ignored: a state is complete
    /// when every input has some transition.
    pub fn complete(&mut self, dc_accepting: bool) {
        let bdd = Rc::clone(&self.bdd);
        let domain = self.domain();
        let hidden = self.encoding.bits_of(&self.outputs);
        let input_domain = bdd.exists(domain, &hidden);

        for id in self.state_ids() {
            if self.is_dont_care(id) {
                continue;
            }
            let covered = bdd.exists(self.covered(id), &hidden);
            let missing = bdd.apply_and(input_domain, -covered);
            if !bdd.is_zero(missing) {
                let dc = self.dont_care_state(dc_accepting);
                self.add_transition(id, dc, bdd.apply_and(missing, domain));
            }
        }

        if let Some(dc) = self.dont_care {
            if self.incoming(dc).any(|t| t.from != dc) {
                self.add_transition(dc, dc, domain);
            }
        }
        self.prune_dont_care();
    }

    /// Drop the don't-care state if nothing else leads into it.
    pub fn prune_dont_care(&mut self) {
        if let Some(dc) = self.dont_care {
            if !self.incoming(dc).any(|t| t.from != dc) {
                debug!("pruning unused don't-care state {}", dc);
                self.remove_state(dc);
            }
        }
    }

    /// Renumber live states contiguously, keeping their relative order.
    pub fn compact(&mut self) {
        let mut remap: HashMap<StateId, StateId> = HashMap::new();
        let mut states = Vec::with_capacity(self.states.len());
        for (old, state) in std::mem::take(&mut self.states).into_iter().enumerate() {
            if let Some(state) = state {
                remap.insert(old, states.len());
                states.push(Some(state));
            }
        }
        self.states = states;
        for t in &mut self.transitions {
            t.from = remap[&t.from];
            t.to = remap[&t.to];
        }
        self.initial = self.initial.iter().map(|s| remap[s]).collect();
        self.dont_care = self.dont_care.map(|s| remap[&s]);
        self.reindex();
        self.rebuild_table();
    }

    fn rebuild_table(&mut self) {
        self.table = self
            .states()
            .filter(|(id, _)| !self.is_dont_care(*id))
            .map(|(id, s)| (s.subset, id))
            .collect();
    }

    /// Drop every manager node the automaton does not refer to.
    ///
    /// Handles obtained from the manager before this call, other than the
    /// automaton's own subsets and guards, are invalid afterwards.
    pub fn collect_garbage(&mut self) {
        let mut roots: Vec<Ref> = Vec::new();
        roots.extend(self.states.iter().flatten().map(|s| s.subset));
        roots.extend(self.transitions.iter().map(|t| t.guard));
        self.bdd.collect_garbage(&mut roots);

        let mut roots = roots.into_iter();
        for state in self.states.iter_mut().flatten() {
            state.subset = roots.next().unwrap_or(state.subset);
        }
        for t in &mut self.transitions {
            t.guard = roots.next().unwrap_or(t.guard);
        }
        self.rebuild_table();
    }

    // Presentation

    /// Name states `s<index>` (zero-padded), or by the latch values of a
    /// member of their subset.
    pub fn assign_names(&mut self, long: bool) {
        let count = self.states.len();
        let digits = count.max(1).to_string().len();
        let mut taken: HashMap<String, usize> = HashMap::new();
        for id in 0..count {
            if !self.is_live(id) {
                continue;
            }
            let mut name = if long {
                self.long_name(id)
            } else {
                format!("s{:0width$}", id, width = digits)
            };
            let seen = taken.entry(name.clone()).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                name = format!("{}_{}", name, *seen - 1);
            }
            self.state_mut(id).name = name;
        }
    }

    fn long_name(&self, id: StateId) -> String {
        if self.is_dont_care(id) {
            return "DC".to_string();
        }
        let bits = self.encoding.bits_of(&self.latches);
        let Some(minterm) = self.bdd.pick_minterm(self.state(id).subset, &bits) else {
            return format!("s{}", id);
        };
        let assignment: HashMap<Var, bool> = minterm.iter().map(|l| (l.var(), l.value())).collect();
        self.latches
            .iter()
            .map(|&l| match self.encoding.decode(l, &assignment) {
                Some(v) => v.to_string(),
                None => "-".to_string(),
            })
            .collect()
    }

    /// Multi-valued sum of products of `guard` restricted to valid codes.
    ///
    /// Variables allowing every value are left out of a cube.
    pub fn guard_cover(&self, guard: Ref) -> Cover {
        let guard = self.bdd.apply_and(guard, self.domain());
        let mut cover = Vec::new();
        'paths: for path in self.bdd.paths(guard) {
            let mut cube = Vec::new();
            for &id in &self.alphabet {
                let values = self.encoding.cube_values(id, &path);
                if values.is_empty() {
                    continue 'paths;
                }
                if values.len() < self.encoding.var(id).arity {
                    cube.push((id, values));
                }
            }
            cover.push(cube);
        }
        cover
    }

    /// Textual form of a guard, e.g. `a=1 b={0,2} | a=0`.
    pub fn cover_string(&self, guard: Ref) -> String {
        let cover = self.guard_cover(guard);
        if cover.is_empty() {
            return "0".to_string();
        }
        cover
            .iter()
            .map(|cube| {
                if cube.is_empty() {
                    return "1".to_string();
                }
                cube.iter()
                    .map(|(id, values)| {
                        let var = self.encoding.var(*id);
                        let names: Vec<String> = values.iter().map(|&v| var.value_name(v)).collect();
                        if names.len() == 1 {
                            format!("{}={}", var.name, names[0])
                        } else {
                            format!("{}={{{}}}", var.name, names.join(","))
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    pub fn stats(&self) -> AutomatonStats {
        AutomatonStats {
            states: self.num_states(),
            transitions: self.num_transitions(),
            accepting: self.states().filter(|(_, s)| s.accepting).count(),
        }
    }

    // Checks

    /// Every input of every state has some outgoing transition.
    ///
    /// Returns the first state that is not complete.
    pub fn check_complete(&self) -> Result<(), StateId> {
        let hidden = self.encoding.bits_of(&self.outputs);
        let input_domain = self.bdd.exists(self.domain(), &hidden);
        for (id, _) in self.states() {
            let covered = self.bdd.exists(self.covered(id), &hidden);
            if !self.bdd.is_implies(input_domain, covered) {
                return Err(id);
            }
        }
        Ok(())
    }

    /// Outgoing guards of every state are pairwise disjoint.
    ///
    /// Returns the first state with two overlapping guards.
    pub fn check_deterministic(&self) -> Result<(), StateId> {
        let domain = self.domain();
        for (id, _) in self.states() {
            let mut seen = self.bdd.zero();
            for t in self.outgoing(id) {
                let guard = self.bdd.apply_and(t.guard, domain);
                if !self.bdd.is_zero(self.bdd.apply_and(seen, guard)) {
                    return Err(id);
                }
                seen = self.bdd.apply_or(seen, guard);
            }
        }
        Ok(())
    }

    pub(crate) fn log_summary(&self, what: &str) {
        let stats = self.stats();
        info!(
            "{}: {} states ({} accepting), {} transitions",
            what, stats.states, stats.accepting, stats.transitions
        );
    }
}

impl fmt::Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automaton")
            .field("states", &self.num_states())
            .field("transitions", &self.num_transitions())
            .field("initial", &self.initial)
            .field("dont_care", &self.dont_care)
            .finish()
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.alphabet.iter().map(|&id| self.encoding.var(id).name.clone()).collect();
        writeln!(f, "alphabet: {}", names.join(" "))?;
        let initial: Vec<&str> = self.initial.iter().map(|&s| self.state(s).name.as_str()).collect();
        writeln!(f, "initial: {}", initial.join(" "))?;
        for (_, state) in self.states() {
            writeln!(
                f,
                "state {}{}",
                state.name,
                if state.accepting { " (accepting)" } else { "" }
            )?;
        }
        for t in &self.transitions {
            writeln!(
                f,
                "{} -> {} : {}",
                self.state(t.from).name,
                self.state(t.to).name,
                self.cover_string(t.guard)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::mv::{MvVar, Role};

    /// One ternary input `a`, one binary latch `q`.
    fn setup() -> (Automaton, MvId, MvId) {
        let bdd = Rc::new(Bdd::default());
        let mut enc = Encoding::new();
        let a = enc.add(&bdd, MvVar::new("a", 3, Role::I));
        let q = enc.add(&bdd, MvVar::new("q", 2, Role::CS));
        (Automaton::new(bdd, enc, vec![a], vec![], vec![q]), a, q)
    }

    #[test]
    fn test_dedup_table() {
        let (mut aut, _, q) = setup();
        let bdd = Rc::clone(aut.bdd());
        let zero = aut.encoding().value(&bdd, q, 0);
        let one = aut.encoding().value(&bdd, q, 1);

        let s0 = aut.add_state(zero, true);
        let s1 = aut.add_state(one, true);
        assert_eq!(aut.lookup(zero), Some(s0));
        assert_eq!(aut.lookup(bdd.apply_not(-one)), Some(s1));
        assert_eq!(aut.lookup(bdd.one()), None);
    }

    #[test]
    fn test_edge_index_follows_removal_and_compaction() {
        let (mut aut, a, q) = setup();
        let bdd = Rc::clone(aut.bdd());
        let enc = aut.encoding().clone();
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        let s1 = aut.add_state(enc.value(&bdd, q, 1), true);
        let s2 = aut.add_state(bdd.one(), true);
        aut.add_transition(s0, s1, enc.value(&bdd, a, 0));
        aut.add_transition(s0, s2, enc.value(&bdd, a, 1));
        aut.add_transition(s2, s1, bdd.one());
        aut.add_transition(s0, s1, enc.value(&bdd, a, 2));
        assert_eq!(aut.num_transitions(), 3);
        assert_eq!(aut.incoming(s1).count(), 2);

        aut.remove_state(s0);
        aut.compact();
        assert_eq!(aut.num_transitions(), 1);
        let (from, to) = (aut.state_ids()[1], aut.state_ids()[0]);
        assert_eq!(aut.outgoing(from).map(|t| t.to).collect::<Vec<_>>(), vec![to]);
        assert_eq!(aut.incoming(to).map(|t| t.from).collect::<Vec<_>>(), vec![from]);
        aut.add_transition(from, to, bdd.one());
        assert_eq!(aut.num_transitions(), 1);
    }

    #[test]
    fn test_completion_adds_and_prunes_dont_care() {
        let (mut aut, a, q) = setup();
        let bdd = Rc::clone(aut.bdd());
        let enc = aut.encoding().clone();
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        aut.add_initial(s0);

        // Only a = 0 is handled.
        aut.add_transition(s0, s0, enc.value(&bdd, a, 0));
        aut.complete(false);
        assert_eq!(aut.check_complete(), Ok(()));
        assert_eq!(aut.check_deterministic(), Ok(()));
        let dc = aut.dont_care().unwrap();
        assert!(!aut.state(dc).accepting);
        let to_dc: Vec<_> = aut.outgoing(s0).filter(|t| t.to == dc).collect();
        assert_eq!(to_dc.len(), 1);
        assert_eq!(
            bdd.apply_and(to_dc[0].guard, aut.domain()),
            enc.values(&bdd, a, &[1, 2])
        );

        // A complete automaton keeps no don't-care state.
        let (mut aut, _, q) = setup();
        let bdd = bdd_of(&aut);
        let subset = aut.encoding().value(&bdd, q, 0);
        let s0 = aut.add_state(subset, true);
        let domain = aut.domain();
        aut.add_transition(s0, s0, domain);
        aut.complete(false);
        assert_eq!(aut.dont_care(), None);
        assert_eq!(aut.num_states(), 1);
    }

    fn bdd_of(aut: &Automaton) -> Rc<Bdd> {
        Rc::clone(aut.bdd())
    }

    #[test]
    fn test_parallel_transitions_merge() {
        let (mut aut, a, q) = setup();
        let bdd = bdd_of(&aut);
        let enc = aut.encoding().clone();
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        aut.add_transition(s0, s0, enc.value(&bdd, a, 0));
        aut.add_transition(s0, s0, enc.value(&bdd, a, 2));
        aut.add_transition(s0, s0, bdd.zero());
        assert_eq!(aut.num_transitions(), 1);
        assert_eq!(aut.cover_string(aut.transitions()[0].guard), "a={0,2}");
    }

    #[test]
    fn test_compact_and_names() {
        let (mut aut, _, q) = setup();
        let bdd = bdd_of(&aut);
        let enc = aut.encoding().clone();
        let both = enc.domain(&bdd, q);
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        let s1 = aut.add_state(enc.value(&bdd, q, 1), false);
        let s2 = aut.add_state(both, true);
        aut.add_initial(s0);
        aut.add_transition(s0, s2, bdd.one());
        aut.add_transition(s2, s1, bdd.one());
        aut.remove_state(s1);
        aut.compact();

        assert_eq!(aut.num_states(), 2);
        assert_eq!(aut.transitions(), &[Transition { from: 0, to: 1, guard: bdd.one() }]);
        assert_eq!(aut.lookup(both), Some(1));

        aut.assign_names(false);
        assert_eq!(aut.state(0).name, "s0");
        aut.assign_names(true);
        assert_eq!(aut.state(0).name, "0");
        assert_eq!(aut.state(1).name, "0_1");
    }

    #[test]
    fn test_collect_garbage_keeps_automaton() {
        let (mut aut, a, q) = setup();
        let bdd = bdd_of(&aut);
        let enc = aut.encoding().clone();
        let s0 = aut.add_state(enc.value(&bdd, q, 1), true);
        aut.add_transition(s0, s0, enc.values(&bdd, a, &[1, 2]));
        let _garbage = bdd.apply_xor(enc.value(&bdd, a, 0), enc.value(&bdd, q, 0));

        aut.collect_garbage();
        assert_eq!(aut.lookup(enc.value(&bdd, q, 1)), Some(s0));
        assert_eq!(aut.transitions()[0].guard, enc.values(&bdd, a, &[1, 2]));
    }

    #[test]
    fn test_overlapping_guards_are_reported() {
        let (mut aut, a, q) = setup();
        let bdd = bdd_of(&aut);
        let enc = aut.encoding().clone();
        let s0 = aut.add_state(enc.value(&bdd, q, 0), true);
        let s1 = aut.add_state(enc.value(&bdd, q, 1), true);
        aut.add_transition(s0, s0, enc.values(&bdd, a, &[0, 1]));
        aut.add_transition(s0, s1, enc.values(&bdd, a, &[1, 2]));
        assert_eq!(aut.check_deterministic(), Err(s0));
        assert_eq!(aut.check_complete(), Err(s1));
    }
}
