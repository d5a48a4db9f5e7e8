//! State transition graph extraction.
//!
//! The reachable state graph of one network, as an automaton over its
//! inputs and outputs. Output functions are ordinary partitions here, so the
//! same subset construction that solves equations produces the graph; every
//! reached subset is a single state when the network is deterministic.

use std::collections::HashMap;
use std::rc::Rc;

use log::info;

use crate::automaton::Automaton;
use crate::bdd::Bdd;
use crate::error::{ModelingError, Result};
use crate::expr::Expr;
use crate::image::ImageScheduler;
use crate::mv::{Encoding, MvId, MvVar, Role};
use crate::network::{lit, MvExpr, Network};
use crate::partition::{check_total, signal_partition, transition_partition, Lowering, PartitionKind};
use crate::reference::Ref;
use crate::shuffle::Shuffle;
use crate::subset::SubsetConstruction;
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct StgOptions {
    pub state_limit: usize,
    pub long_names: bool,
    pub node_limit: usize,
    pub shuffle: bool,
}

impl Default for StgOptions {
    fn default() -> Self {
        Self {
            state_limit: 10_000,
            long_names: false,
            node_limit: 1 << 22,
            shuffle: true,
        }
    }
}

impl StgOptions {
    pub fn with_state_limit(mut self, state_limit: usize) -> Self {
        self.state_limit = state_limit;
        self
    }
    pub fn with_long_names(mut self, long_names: bool) -> Self {
        self.long_names = long_names;
        self
    }
    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

pub fn extract_stg(network: &Network, options: &StgOptions) -> Result<Automaton> {
    let bdd = Rc::new(Bdd::default());
    let mut encoding = Encoding::new();

    let mut inputs = Vec::new();
    for input in network.inputs() {
        let var = MvVar::checked(&input.name, input.arity, Role::I)?.with_values(input.values.clone());
        inputs.push(encoding.add(&bdd, var));
    }
    let mut outputs = Vec::new();
    for name in network.outputs() {
        let Some(arity) = network.arity(name) else {
            return Err(ModelingError::UnknownSignal {
                node: network.name.clone(),
                signal: name.clone(),
            }
            .into());
        };
        // An output may share its name with an input it copies.
        let var_name = encoding.fresh_name(name);
        if arity < 2 {
            return Err(ModelingError::SingleValued(name.clone()).into());
        }
        let var = MvVar::new(var_name, arity, Role::O).with_values(network.value_names(name));
        outputs.push(encoding.add(&bdd, var));
    }
    let mut latches = Vec::new();
    for latch in network.latches() {
        let Some(arity) = network.arity(&latch.output) else {
            return Err(ModelingError::UnknownSignal {
                node: latch.output.clone(),
                signal: latch.input.clone(),
            }
            .into());
        };
        if latch.reset >= arity {
            return Err(ModelingError::BadReset {
                latch: latch.output.clone(),
                reset: latch.reset,
                arity,
            }
            .into());
        }
        let values = network.value_names(&latch.output);
        let cs_name = encoding.fresh_name(&latch.output);
        if arity < 2 {
            return Err(ModelingError::SingleValued(latch.output.clone()).into());
        }
        let cs = encoding.add(&bdd, MvVar::new(cs_name, arity, Role::CS).with_values(values.clone()));
        let ns_name = encoding.fresh_name(&format!("{}'", latch.output));
        let ns = encoding.add(&bdd, MvVar::new(ns_name, arity, Role::NS).with_values(values));
        latches.push((latch, cs, ns));
    }
    info!(
        "'{}': {} inputs, {} outputs, {} latches",
        network.name,
        inputs.len(),
        outputs.len(),
        latches.len()
    );

    let mut relations: Vec<Ref> = Vec::new();
    {
        let mut lowering = Lowering::new(&bdd, &encoding, network);
        for &id in &inputs {
            lowering.bind(&encoding.var(id).name, id);
        }
        for &(latch, cs, _) in &latches {
            lowering.bind(&latch.output, cs);
        }
        let mut sources = inputs.clone();
        sources.extend(latches.iter().map(|&(_, cs, _)| cs));
        let domain = encoding.domains(&bdd, &sources);
        for &(latch, _, ns) in &latches {
            let part = transition_partition(&mut lowering, &latch.input, ns)?;
            check_total(&bdd, &encoding, &part, ns, domain)?;
            relations.push(part.relation);
        }
        for (name, &id) in network.outputs().iter().zip(&outputs) {
            relations.push(signal_partition(&mut lowering, name, id, PartitionKind::Output)?.relation);
        }
        relations.push(encoding.domains(&bdd, &inputs));
    }
    let mut init = bdd.apply_and_many(latches.iter().map(|&(latch, cs, _)| encoding.value(&bdd, cs, latch.reset)));

    if options.shuffle {
        let mut shuffle = Shuffle::new();
        for &(_, cs, ns) in &latches {
            shuffle.place_after(cs, ns);
        }
        relations.push(init);
        shuffle.apply(&bdd, &encoding, &mut relations);
        init = relations.pop().unwrap_or(init);
    }

    let alphabet: Vec<MvId> = inputs.iter().chain(&outputs).copied().collect();
    let alphabet_bits = encoding.bits_of(&alphabet);
    let ns_ids: Vec<MvId> = latches.iter().map(|&(_, _, ns)| ns).collect();
    let ns = encoding.bits_of(&ns_ids);
    let ns_to_cs: HashMap<Var, Var> = latches
        .iter()
        .flat_map(|&(_, cs, ns)| {
            encoding
                .bits(ns)
                .iter()
                .copied()
                .zip(encoding.bits(cs).iter().copied())
                .collect::<Vec<_>>()
        })
        .collect();
    let keep: Vec<Var> = alphabet_bits.iter().chain(&ns).copied().collect();

    let mut automaton = Automaton::new(
        Rc::clone(&bdd),
        encoding.clone(),
        alphabet.clone(),
        outputs.clone(),
        latches.iter().map(|&(_, cs, _)| cs).collect(),
    );
    {
        let builder = SubsetConstruction {
            bdd: &bdd,
            transitions: ImageScheduler::new(&bdd, &relations, &keep, options.node_limit),
            violations: Vec::new(),
            alphabet: alphabet_bits,
            domain: encoding.domains(&bdd, &alphabet),
            universal: Vec::new(),
            universal_domain: bdd.one(),
            moore: false,
            ns,
            ns_to_cs,
            state_limit: options.state_limit,
            dont_care_accepting: false,
        };
        builder.explore(&mut automaton, init)?;
    }
    automaton.complete(false);
    automaton.compact();
    automaton.collect_garbage();
    automaton.assign_names(options.long_names);
    automaton.log_summary("extracted");
    Ok(automaton)
}

impl Automaton {
    /// A single-latch network reproducing the automaton.
    ///
    /// The latch `state` has one value per state and resets to the first
    /// initial state; inputs and outputs are the alphabet's. Extracting the
    /// state graph of the result gives back an isomorphic automaton.
    pub fn to_network(&self, name: &str) -> Network {
        let bdd = self.bdd();
        let encoding = self.encoding();
        let ids = self.state_ids();
        let index: HashMap<usize, usize> = ids.iter().enumerate().map(|(k, &id)| (id, k)).collect();
        let arity = ids.len().max(2);
        let output_bits = encoding.bits_of(self.outputs());

        let mut net = Network::new(name);
        for id in self.inputs() {
            let var = encoding.var(id);
            net.add_input(&var.name, var.arity);
            if let Some(values) = &var.values {
                net.set_value_names(&var.name, values.clone());
            }
        }

        let in_state_value = |k: usize| lit("state", &[k]);
        let in_state = |id: usize| in_state_value(index[&id]);
        let mut next: Vec<Vec<MvExpr>> = vec![Vec::new(); arity];
        for t in self.transitions() {
            let inputs_only = bdd.exists(t.guard, &output_bits);
            next[index[&t.to]].push(Expr::and(in_state(t.from), self.guard_expr(inputs_only)));
        }
        // Unused codes keep their value so the next-state function stays total.
        for (k, value) in next.iter_mut().enumerate().skip(ids.len()) {
            value.push(in_state_value(k));
        }
        net.add_node("state_next", arity, next.into_iter().map(Expr::any).collect());

        for &o in self.outputs() {
            let var = encoding.var(o);
            let others: Vec<MvId> = self.outputs().iter().copied().filter(|&x| x != o).collect();
            let other_bits = encoding.bits_of(&others);
            let mut values: Vec<Vec<MvExpr>> = vec![Vec::new(); var.arity];
            for t in self.transitions() {
                let guard = bdd.exists(t.guard, &other_bits);
                for (k, value) in values.iter_mut().enumerate() {
                    let when = bdd.exists(bdd.apply_and(guard, encoding.value(bdd, o, k)), encoding.bits(o));
                    if !bdd.is_zero(when) {
                        value.push(Expr::and(in_state(t.from), self.guard_expr(when)));
                    }
                }
            }
            net.add_node(&var.name, var.arity, values.into_iter().map(Expr::any).collect());
            if let Some(names) = &var.values {
                net.set_value_names(&var.name, names.clone());
            }
            net.add_output(&var.name);
        }

        let reset = self.initial().first().map_or(0, |id| index[id]);
        net.add_latch("state_next", "state", reset);
        net
    }

    /// A guard as an expression over multi-valued literals.
    fn guard_expr(&self, guard: Ref) -> MvExpr {
        let encoding = self.encoding();
        Expr::any(self.guard_cover(guard).into_iter().map(|cube| {
            Expr::all(
                cube.into_iter()
                    .map(|(id, values)| lit(&encoding.var(id).name, &values)),
            )
        }))
    }
}
