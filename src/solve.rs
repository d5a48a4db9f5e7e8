//! Language equation solving.
//!
//! Given a fixed component `F` and a specification `S`, find the most
//! general automaton `X` over the signals `U` (from `F` into `X`) and `V`
//! (from `X` into `F`) such that `F` composed with `X` conforms to `S`.
//!
//! ```text
//!        I ──►┌───┐──► O
//!             │ F │
//!        ┌───►└───┘───┐
//!      V │            │ U
//!        └───┌───┐◄───┘
//!            │ X │
//!            └───┘
//! ```
//!
//! The states of `X` are sets of joint states of `F` and `S`. From each set,
//! assignments of `(U, V)` under which some output of `F` is not allowed by
//! `S` lead to the don't-care state; the others lead to the set of joint
//! states reached.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::automaton::Automaton;
use crate::bdd::Bdd;
use crate::error::{ModelingError, Result};
use crate::image::ImageScheduler;
use crate::mv::{Encoding, MvId, MvVar, Role};
use crate::network::Network;
use crate::partition::{
    check_total, conformance_partition, signal_partition, transition_partition, Lowering, Partition, PartitionKind,
};
use crate::progressive::make_progressive;
use crate::reference::Ref;
use crate::shuffle::Shuffle;
use crate::subset::SubsetConstruction;
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum number of states before giving up.
    pub state_limit: usize,
    /// The unknown component may not react to `U` in the same step.
    pub moore: bool,
    /// Keep only the progressive part of the solution.
    pub progressive: bool,
    /// Name states by their latch values.
    pub long_names: bool,
    /// Maximum number of diagram nodes during image computation.
    pub node_limit: usize,
    /// Interleave related variables before exploring.
    pub shuffle: bool,
    /// Make the don't-care state accepting.
    pub dont_care_accepting: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            state_limit: 10_000,
            moore: false,
            progressive: false,
            long_names: false,
            node_limit: 1 << 22,
            shuffle: true,
            dont_care_accepting: false,
        }
    }
}

impl SolveOptions {
    pub fn with_state_limit(mut self, state_limit: usize) -> Self {
        self.state_limit = state_limit;
        self
    }
    pub fn with_moore(mut self, moore: bool) -> Self {
        self.moore = moore;
        self
    }
    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
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
    pub fn with_dont_care_accepting(mut self, dont_care_accepting: bool) -> Self {
        self.dont_care_accepting = dont_care_accepting;
        self
    }
}

/// Split a comma-separated list of names, ignoring blanks.
pub fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_duplicate(names: &[String]) -> Option<&String> {
    let mut seen = HashSet::new();
    names.iter().find(|name| !seen.insert(name.as_str()))
}

/// The structural assumptions of an equation, checked in a fixed order.
pub fn validate(fixed: &Network, spec: &Network, u: &[String], v: &[String]) -> std::result::Result<(), ModelingError> {
    if let Some(input) = spec.inputs().iter().find(|s| !fixed.is_input(&s.name)) {
        return Err(ModelingError::SpecInputNotInFixed(input.name.clone()));
    }
    if let Some(output) = spec.outputs().iter().find(|o| !fixed.is_output(o)) {
        return Err(ModelingError::SpecOutputNotInFixed(output.clone()));
    }
    if let Some(name) = first_duplicate(u) {
        return Err(ModelingError::DuplicateU(name.clone()));
    }
    if let Some(name) = first_duplicate(v) {
        return Err(ModelingError::DuplicateV(name.clone()));
    }
    if let Some(name) = v.iter().find(|name| spec.is_input(name)) {
        return Err(ModelingError::InputIsV(name.clone()));
    }
    if let Some(name) = v.iter().find(|name| !fixed.is_input(name)) {
        return Err(ModelingError::VNotFixedInput(name.clone()));
    }
    if let Some(name) = u.iter().find(|name| fixed.node(name).is_none()) {
        return Err(ModelingError::UNotFixedNode(name.clone()));
    }
    Ok(())
}

/// Rename latch outputs of `spec` that clash with any signal of `fixed`.
pub fn rename_collisions(fixed: &Network, spec: &Network) -> Network {
    let mut spec = spec.clone();
    let fixed_names = fixed.signal_names();
    let clashing: Vec<String> = spec
        .latches()
        .iter()
        .map(|l| l.output.clone())
        .filter(|name| fixed_names.contains(name))
        .collect();
    for old in clashing {
        let taken = |name: &String| fixed_names.contains(name) || spec.signal_names().contains(name);
        let mut new = format!("{}_s", old);
        let mut k = 1;
        while taken(&new) {
            new = format!("{}_s{}", old, k);
            k += 1;
        }
        warn!("renaming specification latch '{}' to '{}'", old, new);
        spec.rename_signal(&old, &new);
    }
    spec
}

#[derive(Debug, Clone)]
struct LatchVars {
    input: String,
    output: String,
    cs: MvId,
    ns: MvId,
    reset: usize,
}

/// Everything a single equation solve owns. Dropping it releases the
/// manager unless the resulting automaton still holds it.
pub struct SolveContext<'a> {
    fixed: &'a Network,
    spec: Network,
    options: SolveOptions,
    bdd: Rc<Bdd>,
    encoding: Encoding,
    inputs: Vec<MvId>,
    hidden: Vec<MvId>,
    outputs: Vec<String>,
    u: Vec<MvId>,
    v: Vec<MvId>,
    fixed_latches: Vec<LatchVars>,
    spec_latches: Vec<LatchVars>,
    unknown_parts: Vec<Partition>,
    transition_parts: Vec<Partition>,
    conformance_parts: Vec<Partition>,
    input_domain: Ref,
    init: Ref,
}

impl<'a> SolveContext<'a> {
    /// Validate the equation and classify its variables.
    pub fn new(fixed: &'a Network, spec: &Network, u: &[String], v: &[String], options: SolveOptions) -> Result<Self> {
        validate(fixed, spec, u, v)?;
        let spec = rename_collisions(fixed, spec);
        let bdd = Rc::new(Bdd::default());

        let mut ctx = SolveContext {
            fixed,
            spec,
            options,
            input_domain: bdd.one(),
            init: bdd.one(),
            bdd,
            encoding: Encoding::new(),
            inputs: Vec::new(),
            hidden: Vec::new(),
            outputs: Vec::new(),
            u: Vec::new(),
            v: Vec::new(),
            fixed_latches: Vec::new(),
            spec_latches: Vec::new(),
            unknown_parts: Vec::new(),
            transition_parts: Vec::new(),
            conformance_parts: Vec::new(),
        };
        ctx.classify(u, v)?;
        Ok(ctx)
    }

    fn add_var(&mut self, name: &str, arity: usize, role: Role, values: Option<Vec<String>>) -> Result<MvId> {
        let var = MvVar::checked(name, arity, role)?.with_values(values.filter(|vs| vs.len() == arity));
        Ok(self.encoding.add(&self.bdd, var))
    }

    fn classify(&mut self, u: &[String], v: &[String]) -> Result<()> {
        let fixed = self.fixed;

        // U first: their bits lead the order until the shuffler places them.
        for name in u {
            let arity = fixed.arity(name).unwrap_or(2);
            let id = self.add_var(name, arity, Role::U, fixed.value_names(name))?;
            self.u.push(id);
        }

        let spec_inputs: Vec<(String, usize)> =
            self.spec.inputs().iter().map(|s| (s.name.clone(), s.arity)).collect();
        for (name, arity) in spec_inputs {
            let expected = fixed.arity(&name).unwrap_or(arity);
            if expected != arity {
                return Err(ModelingError::ArityMismatch {
                    signal: name,
                    expected,
                    found: arity,
                }
                .into());
            }
            let id = self.add_var(&name, arity, Role::I, fixed.value_names(&name))?;
            self.inputs.push(id);
        }

        for input in fixed.inputs() {
            if self.spec.is_input(&input.name) || v.contains(&input.name) {
                continue;
            }
            warn!("input '{}' of the fixed component is treated as an environment input", input.name);
            let id = self.add_var(&input.name, input.arity, Role::I, input.values.clone())?;
            self.hidden.push(id);
        }

        for name in v {
            let arity = fixed.arity(name).unwrap_or(2);
            let id = self.add_var(name, arity, Role::V, fixed.value_names(name))?;
            self.v.push(id);
        }

        self.fixed_latches = self.add_latches(fixed)?;
        let spec = self.spec.clone();
        self.spec_latches = self.add_latches(&spec)?;
        self.outputs = self.spec.outputs().to_vec();

        info!(
            "classified {} inputs ({} hidden), {} outputs, {} U, {} V, {} latches",
            self.inputs.len(),
            self.hidden.len(),
            self.outputs.len(),
            self.u.len(),
            self.v.len(),
            self.fixed_latches.len() + self.spec_latches.len()
        );
        Ok(())
    }

    fn add_latches(&mut self, network: &Network) -> Result<Vec<LatchVars>> {
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
            // Generated next-state names may already hold the output's name.
            let cs_name = self.encoding.fresh_name(&latch.output);
            let cs = self.add_var(&cs_name, arity, Role::CS, values.clone())?;
            let ns_name = self.encoding.fresh_name(&format!("{}'", latch.output));
            let ns = self.add_var(&ns_name, arity, Role::NS, values)?;
            latches.push(LatchVars {
                input: latch.input.clone(),
                output: latch.output.clone(),
                cs,
                ns,
                reset: latch.reset,
            });
        }
        Ok(latches)
    }

    fn ids_with(&self, roles: &[Role]) -> Vec<MvId> {
        self.encoding
            .ids()
            .filter(|&id| roles.contains(&self.encoding.var(id).role))
            .collect()
    }

    /// Derive the U, transition and conformance partitions.
    pub fn derive_partitions(&mut self) -> Result<()> {
        let bdd: &Bdd = &self.bdd;
        let encoding = &self.encoding;

        let mut fixed = Lowering::new(bdd, encoding, self.fixed);
        let mut spec = Lowering::new(bdd, encoding, &self.spec);
        for &id in self.inputs.iter().chain(&self.hidden).chain(&self.v) {
            fixed.bind(&encoding.var(id).name, id);
        }
        for &id in &self.inputs {
            spec.bind(&encoding.var(id).name, id);
        }
        for latch in &self.fixed_latches {
            fixed.bind(&latch.output, latch.cs);
        }
        for latch in &self.spec_latches {
            spec.bind(&latch.output, latch.cs);
        }

        let mut unknown_parts = Vec::new();
        for &id in &self.u {
            let name = encoding.var(id).name.clone();
            unknown_parts.push(signal_partition(&mut fixed, &name, id, PartitionKind::Unknown)?);
        }

        let state_domain = encoding.domains(bdd, &self.ids_with(&[Role::I, Role::V, Role::CS]));
        let mut transition_parts = Vec::new();
        for latch in &self.fixed_latches {
            let part = transition_partition(&mut fixed, &latch.input, latch.ns)?;
            check_total(bdd, encoding, &part, latch.ns, state_domain)?;
            transition_parts.push(part);
        }
        for latch in &self.spec_latches {
            let part = transition_partition(&mut spec, &latch.input, latch.ns)?;
            check_total(bdd, encoding, &part, latch.ns, state_domain)?;
            transition_parts.push(part);
        }

        let mut conformance_parts = Vec::new();
        for output in &self.outputs {
            conformance_parts.push(conformance_partition(&mut fixed, &mut spec, output)?);
        }

        let input_domain = encoding.domains(bdd, &[self.inputs.clone(), self.hidden.clone()].concat());
        let init = bdd.apply_and_many(
            self.fixed_latches
                .iter()
                .chain(&self.spec_latches)
                .map(|l| encoding.value(bdd, l.cs, l.reset)),
        );

        info!(
            "derived {} U, {} transition and {} conformance partitions",
            unknown_parts.len(),
            transition_parts.len(),
            conformance_parts.len()
        );
        self.unknown_parts = unknown_parts;
        self.transition_parts = transition_parts;
        self.conformance_parts = conformance_parts;
        self.input_domain = input_domain;
        self.init = init;
        Ok(())
    }

    fn partitions_mut(&mut self) -> impl Iterator<Item = &mut Partition> {
        self.unknown_parts
            .iter_mut()
            .chain(self.transition_parts.iter_mut())
            .chain(self.conformance_parts.iter_mut())
    }

    /// Put each U below the deepest variable its function reads and each
    /// next state below its current state.
    pub fn shuffle(&mut self) {
        let bdd = Rc::clone(&self.bdd);
        let mut shuffle = Shuffle::new();
        for (&u, part) in self.u.iter().zip(&self.unknown_parts) {
            let own = self.encoding.bits(u);
            let anchor = bdd
                .support(part.relation)
                .into_iter()
                .filter(|bit| !own.contains(bit))
                .max_by_key(|&bit| bdd.level(bit))
                .and_then(|bit| self.encoding.owner_of(bit));
            if let Some(anchor) = anchor {
                debug!("placing '{}' after '{}'", self.encoding.var(u).name, self.encoding.var(anchor).name);
                shuffle.place_after(anchor, u);
            }
        }
        for latch in self.fixed_latches.iter().chain(&self.spec_latches) {
            shuffle.place_after(latch.cs, latch.ns);
        }

        let mut roots: Vec<Ref> = self.partitions_mut().map(|p| p.relation).collect();
        roots.push(self.input_domain);
        roots.push(self.init);
        shuffle.apply(&bdd, &self.encoding, &mut roots);

        let mut fresh = roots.into_iter();
        for part in self.partitions_mut() {
            part.relation = fresh.next().unwrap_or(part.relation);
        }
        self.input_domain = fresh.next().unwrap_or(self.input_domain);
        self.init = fresh.next().unwrap_or(self.init);
    }

    /// Run the subset construction and the post-processing passes.
    pub fn run(mut self) -> Result<Automaton> {
        self.derive_partitions()?;
        if self.options.shuffle {
            self.shuffle();
        }

        let bdd: &Bdd = &self.bdd;
        let encoding = &self.encoding;
        let alphabet: Vec<MvId> = [self.u.clone(), self.v.clone()].concat();
        let alphabet_bits = encoding.bits_of(&alphabet);
        let latches: Vec<&LatchVars> = self.fixed_latches.iter().chain(&self.spec_latches).collect();
        let ns: Vec<Var> = encoding.bits_of(&latches.iter().map(|l| l.ns).collect::<Vec<_>>());
        let ns_to_cs: HashMap<Var, Var> = latches
            .iter()
            .flat_map(|l| {
                encoding
                    .bits(l.ns)
                    .iter()
                    .copied()
                    .zip(encoding.bits(l.cs).iter().copied())
            })
            .collect();

        let shared: Vec<Ref> = self
            .unknown_parts
            .iter()
            .map(|p| p.relation)
            .chain([self.input_domain])
            .collect();
        let transition_relations: Vec<Ref> = shared
            .iter()
            .copied()
            .chain(self.transition_parts.iter().map(|p| p.relation))
            .collect();
        let keep: Vec<Var> = alphabet_bits.iter().chain(&ns).copied().collect();
        let node_limit = self.options.node_limit;

        let violations = self
            .conformance_parts
            .iter()
            .map(|p| {
                let relations: Vec<Ref> = shared.iter().copied().chain([-p.relation]).collect();
                ImageScheduler::new(bdd, &relations, &alphabet_bits, node_limit)
            })
            .collect();

        let mut automaton = Automaton::new(
            Rc::clone(&self.bdd),
            encoding.clone(),
            alphabet.clone(),
            Vec::new(),
            latches.iter().map(|l| l.cs).collect(),
        );
        {
            let builder = SubsetConstruction {
                bdd,
                transitions: ImageScheduler::new(bdd, &transition_relations, &keep, node_limit),
                violations,
                alphabet: alphabet_bits.clone(),
                domain: encoding.domains(bdd, &alphabet),
                universal: encoding.bits_of(&self.u),
                universal_domain: encoding.domains(bdd, &self.u),
                moore: self.options.moore,
                ns,
                ns_to_cs,
                state_limit: self.options.state_limit,
                dont_care_accepting: self.options.dont_care_accepting,
            };
            builder.explore(&mut automaton, self.init)?;
        }

        automaton.complete(self.options.dont_care_accepting);
        if self.options.progressive {
            make_progressive(&mut automaton, &self.u, &self.v, self.options.dont_care_accepting)?;
        }
        automaton.compact();
        automaton.collect_garbage();
        automaton.assign_names(self.options.long_names);
        automaton.log_summary("solved");
        Ok(automaton)
    }
}

/// Solve `fixed ∘ X ⊆ spec` for the most general `X`.
///
/// `u_list` and `v_list` are comma-separated signal names: `U` are nodes of
/// `fixed` read by `X`, `V` are inputs of `fixed` driven by `X`.
pub fn solve(fixed: &Network, spec: &Network, u_list: &str, v_list: &str, options: &SolveOptions) -> Result<Automaton> {
    let u = split_names(u_list);
    let v = split_names(v_list);
    SolveContext::new(fixed, spec, &u, &v, options.clone())?.run()
}
