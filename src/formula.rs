//! Automata from a single Boolean formula.
//!
//! The formula ranges over `rank + 1` copies of `n` binary base variables:
//! copies `0..rank` are the history (copy 0 the oldest), copy `rank` is the
//! current letter. The manager allocates copy 0 first and the current copy
//! last, so the current copy sits below every historical one.
//!
//! Normalization cuts the formula at the first current level. Every path
//! from the root down to the cut ends in a cofactor over the current copy;
//! the histories leading to the same cofactor form one *mark*, the cofactor
//! is that mark's *transition*. For `rank > 1` marks are then refined until
//! every mark moves into every other mark either from all or from none of
//! its histories.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use log::{debug, info};

use crate::automaton::{Automaton, StateId};
use crate::bdd::Bdd;
use crate::error::{ModelingError, Phase, Result, SynthError};
use crate::expr::Expr;
use crate::mv::{Encoding, MvId, MvVar, Role};
use crate::reference::Ref;
use crate::types::Var;

/// Base variable `index` in copy `copy`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FormulaVar {
    pub copy: usize,
    pub index: usize,
}

impl FormulaVar {
    pub fn new(copy: usize, index: usize) -> Self {
        FormulaVar { copy, index }
    }
}

#[derive(Debug, Clone)]
pub struct Formula {
    pub names: Vec<String>,
    pub rank: usize,
    pub body: Expr<FormulaVar>,
    /// Condition on the history the automaton may start from.
    pub init: Option<Expr<FormulaVar>>,
}

impl Formula {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>, rank: usize, body: Expr<FormulaVar>) -> Self {
        Formula {
            names: names.into_iter().map(Into::into).collect(),
            rank,
            body,
            init: None,
        }
    }

    pub fn with_init(mut self, init: Expr<FormulaVar>) -> Self {
        self.init = Some(init);
        self
    }

    /// Literal `var` of copy `copy`.
    pub fn var(copy: usize, index: usize) -> Expr<FormulaVar> {
        Expr::term(FormulaVar::new(copy, index))
    }
}

#[derive(Debug, Clone)]
pub struct FormulaOptions {
    pub state_limit: usize,
    pub long_names: bool,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            state_limit: 10_000,
            long_names: false,
        }
    }
}

impl FormulaOptions {
    pub fn with_state_limit(mut self, state_limit: usize) -> Self {
        self.state_limit = state_limit;
        self
    }
    pub fn with_long_names(mut self, long_names: bool) -> Self {
        self.long_names = long_names;
        self
    }
}

/// A set of histories and the current letters it accepts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Mark {
    pub mark: Ref,
    pub transition: Ref,
}

pub struct FormulaMachine {
    bdd: Rc<Bdd>,
    encoding: Encoding,
    rank: usize,
    /// `copies[c][i]` encodes base variable `i` of copy `c`.
    copies: Vec<Vec<MvId>>,
    body: Ref,
    init: Option<Ref>,
    marks: Vec<Mark>,
}

impl FormulaMachine {
    pub fn new(formula: &Formula) -> Result<Self> {
        if formula.rank == 0 {
            return Err(ModelingError::ZeroRank.into());
        }
        if formula.names.is_empty() {
            return Err(ModelingError::NoFormulaVariables.into());
        }

        let bdd = Rc::new(Bdd::default());
        let mut encoding = Encoding::new();
        let mut copies = Vec::with_capacity(formula.rank + 1);
        for copy in 0..=formula.rank {
            let mut ids = Vec::with_capacity(formula.names.len());
            for name in &formula.names {
                let (base, role) = if copy == formula.rank {
                    (name.clone(), Role::I)
                } else {
                    (format!("{}@{}", name, copy), Role::CS)
                };
                let var = MvVar::new(encoding.fresh_name(&base), 2, role);
                ids.push(encoding.add(&bdd, var));
            }
            copies.push(ids);
        }

        let mut leaf = |v: &FormulaVar| -> std::result::Result<Ref, ModelingError> {
            match copies.get(v.copy).and_then(|ids| ids.get(v.index)) {
                Some(&id) => Ok(encoding.value(&bdd, id, 1)),
                None => Err(ModelingError::FormulaVarOutOfRange {
                    copy: v.copy,
                    index: v.index,
                }),
            }
        };
        let body = formula.body.to_bdd(&bdd, &mut leaf)?;
        let init = match &formula.init {
            Some(init) => Some(init.to_bdd(&bdd, &mut leaf)?),
            None => None,
        };

        // The start condition only constrains the history.
        let current = encoding.bits_of(&copies[formula.rank]);
        let init = init.map(|f| bdd.exists(f, &current));
        info!(
            "formula over {} variables, rank {}: {} nodes",
            formula.names.len(),
            formula.rank,
            bdd.size(body)
        );
        Ok(FormulaMachine {
            bdd,
            encoding,
            rank: formula.rank,
            copies,
            body,
            init,
            marks: Vec::new(),
        })
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    fn current_bits(&self) -> Vec<Var> {
        self.encoding.bits_of(&self.copies[self.rank])
    }

    fn historical_bits(&self) -> Vec<Var> {
        let ids: Vec<MvId> = self.copies[..self.rank].iter().flatten().copied().collect();
        self.encoding.bits_of(&ids)
    }

    /// Level of the first current variable.
    fn cut(&self) -> usize {
        let first = self.encoding.bits(self.copies[self.rank][0])[0];
        self.bdd.level(first).index()
    }

    /// Decompose the formula into disjoint marks; returns how many.
    pub fn normalize(&mut self) -> usize {
        let bdd = Rc::clone(&self.bdd);
        let cut = self.cut();

        let mut conditions: HashMap<Ref, Ref> = HashMap::new();
        let mut pending: BTreeMap<usize, Vec<Ref>> = BTreeMap::new();
        let mut groups: Vec<Mark> = Vec::new();
        let mut by_cofactor: HashMap<Ref, usize> = HashMap::new();

        let mut reach = |node: Ref, path: Ref, conditions: &mut HashMap<Ref, Ref>, pending: &mut BTreeMap<usize, Vec<Ref>>| {
            if bdd.is_zero(node) || bdd.is_zero(path) {
                return;
            }
            let level = bdd.node_level(node);
            if level >= cut {
                match by_cofactor.get(&node) {
                    Some(&k) => groups[k].mark = bdd.apply_or(groups[k].mark, path),
                    None => {
                        by_cofactor.insert(node, groups.len());
                        groups.push(Mark {
                            mark: path,
                            transition: node,
                        });
                    }
                }
                return;
            }
            match conditions.get_mut(&node) {
                Some(cond) => *cond = bdd.apply_or(*cond, path),
                None => {
                    conditions.insert(node, path);
                    pending.entry(level).or_default().push(node);
                }
            }
        };

        reach(self.body, bdd.one(), &mut conditions, &mut pending);
        // Parents sit above their children, so each node is finished before it is expanded.
        while let Some((_, nodes)) = pending.pop_first() {
            for node in nodes {
                let path = conditions[&node];
                let x = bdd.mk_var(bdd.variable(node));
                reach(bdd.low_node(node), bdd.apply_and(path, -x), &mut conditions, &mut pending);
                reach(bdd.high_node(node), bdd.apply_and(path, x), &mut conditions, &mut pending);
            }
        }

        info!("normalized into {} marks", groups.len());
        self.marks = groups;
        self.marks.len()
    }

    /// Rename every copy one step back into the past.
    fn shift(&self, f: Ref) -> Ref {
        let mut map = HashMap::new();
        for copy in 0..self.rank {
            for (&from, &to) in self.copies[copy].iter().zip(&self.copies[copy + 1]) {
                for (&a, &b) in self.encoding.bits(from).iter().zip(self.encoding.bits(to)) {
                    map.insert(a, b);
                }
            }
        }
        self.bdd.rename_vars(f, &map)
    }

    /// `mark[i] ∧ trans[i] ∧ shift(mark[k])`: a history of `i`, a letter it
    /// accepts, and the resulting history lying in `k`.
    fn step(&self, i: usize, k: usize) -> Ref {
        let bdd = &self.bdd;
        let Mark { mark, transition } = self.marks[i];
        let target = self.shift(self.marks[k].mark);
        bdd.apply_and(bdd.apply_and(mark, transition), target)
    }

    /// Histories of `i` that can move into `k`.
    fn entering(&self, i: usize, k: usize) -> Ref {
        self.bdd.exists(self.step(i, k), &self.current_bits())
    }

    /// Letters moving some history of `i` into `k`.
    pub fn guard(&self, i: usize, k: usize) -> Ref {
        self.bdd.exists(self.step(i, k), &self.historical_bits())
    }

    /// Refine marks until none of them splits any more; returns the number
    /// of splits. Rank-1 marks never split.
    pub fn split_states(&mut self, state_limit: usize) -> Result<usize> {
        if self.rank <= 1 {
            return Ok(0);
        }
        let bdd = Rc::clone(&self.bdd);
        let mut splits = 0;
        'scan: loop {
            for i in 0..self.marks.len() {
                for k in 0..self.marks.len() {
                    let fresh = self.entering(i, k);
                    let Mark { mark, transition } = self.marks[i];
                    if bdd.is_zero(fresh) || fresh == mark {
                        continue;
                    }
                    if self.marks.len() >= state_limit {
                        return Err(SynthError::ResourceExceeded {
                            phase: Phase::Splitting,
                            limit: state_limit,
                        });
                    }
                    debug!("splitting mark {} on its moves into {}", i, k);
                    self.marks[i] = Mark {
                        mark: fresh,
                        transition,
                    };
                    self.marks.insert(
                        i + 1,
                        Mark {
                            mark: bdd.apply_and(mark, -fresh),
                            transition,
                        },
                    );
                    splits += 1;
                    continue 'scan;
                }
            }
            break;
        }
        info!("{} splits, {} marks", splits, self.marks.len());
        Ok(splits)
    }

    /// Explore the marks reachable from the initial ones.
    ///
    /// States are numbered in visitation order; states left without any
    /// transition are discarded. The result may be nondeterministic and is
    /// not completed.
    pub fn into_automaton(self, options: &FormulaOptions) -> Result<Automaton> {
        let bdd = Rc::clone(&self.bdd);
        let alphabet = self.copies[self.rank].clone();
        let latches: Vec<MvId> = self.copies[..self.rank].iter().flatten().copied().collect();
        let mut automaton = Automaton::new(Rc::clone(&bdd), self.encoding.clone(), alphabet, Vec::new(), latches);

        let start: Vec<usize> = (0..self.marks.len())
            .filter(|&i| match self.init {
                Some(init) => !bdd.is_zero(bdd.apply_and(self.marks[i].mark, init)),
                None => true,
            })
            .collect();
        if start.is_empty() {
            return Err(SynthError::inconsistency(
                Phase::Exploration,
                "no mark meets the initial condition",
            ));
        }

        let mut visited: HashMap<usize, StateId> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut visit = |i: usize, automaton: &mut Automaton, queue: &mut VecDeque<usize>| -> Result<StateId> {
            if let Some(&id) = visited.get(&i) {
                return Ok(id);
            }
            if automaton.num_states() >= options.state_limit {
                return Err(SynthError::ResourceExceeded {
                    phase: Phase::Exploration,
                    limit: options.state_limit,
                });
            }
            let id = automaton.add_state(self.marks[i].mark, true);
            visited.insert(i, id);
            queue.push_back(i);
            Ok(id)
        };
        for &i in &start {
            let id = visit(i, &mut automaton, &mut queue)?;
            automaton.add_initial(id);
        }
        while let Some(i) = queue.pop_front() {
            let from = visit(i, &mut automaton, &mut queue)?;
            for k in 0..self.marks.len() {
                let guard = self.guard(i, k);
                if bdd.is_zero(guard) {
                    continue;
                }
                let to = visit(k, &mut automaton, &mut queue)?;
                automaton.add_transition(from, to, guard);
            }
        }

        loop {
            let stuck: Vec<StateId> = automaton
                .state_ids()
                .into_iter()
                .filter(|&id| automaton.outgoing(id).next().is_none())
                .collect();
            if stuck.is_empty() {
                break;
            }
            for id in stuck {
                debug!("discarding state {} without transitions", id);
                automaton.remove_state(id);
            }
        }
        if automaton.initial().is_empty() {
            return Err(SynthError::inconsistency(
                Phase::Exploration,
                "every initial state dies out",
            ));
        }

        automaton.compact();
        automaton.collect_garbage();
        automaton.assign_names(options.long_names);
        automaton.log_summary("formula automaton");
        Ok(automaton)
    }
}

pub fn synthesize_from_formula(formula: &Formula, options: &FormulaOptions) -> Result<Automaton> {
    let mut machine = FormulaMachine::new(formula)?;
    machine.normalize();
    machine.split_states(options.state_limit)?;
    machine.into_automaton(options)
}
