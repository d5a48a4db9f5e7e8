//! Partition derivation: network functions as diagram relations.
//!
//! Every signal with a multi-valued function `f` (one condition `f_k` per
//! value `k`) becomes the relation `⋁_k (x = k) ∧ f_k` over the support of
//! `f` and the bits of the variable `x` that receives the value. The
//! conjunction of all such partitions is the transition relation of the
//! system; the image scheduler consumes them one by one.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::bdd::Bdd;
use crate::error::{ModelingError, Phase, Result, SynthError};
use crate::mv::{Encoding, MvId};
use crate::network::{MvLit, Network};
use crate::reference::Ref;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PartitionKind {
    /// Reified value of a signal flowing into the unknown component.
    Unknown,
    /// Next state of one latch.
    Transition,
    /// Value of one output.
    Output,
    /// "Fixed output implies specified output" for one output.
    Conformance,
    /// Valid codes of quantified variables.
    Domain,
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub kind: PartitionKind,
    pub relation: Ref,
}

/// Per-value global functions of the signals of one network.
///
/// Leaves (inputs, latch outputs, and any signal bound explicitly) map to
/// encoded variables; internal nodes are expanded through their conditions
/// and memoized.
pub struct Lowering<'a> {
    bdd: &'a Bdd,
    encoding: &'a Encoding,
    network: &'a Network,
    leaves: HashMap<String, MvId>,
    memo: HashMap<String, Vec<Ref>>,
    visiting: HashSet<String>,
}

impl<'a> Lowering<'a> {
    pub fn new(bdd: &'a Bdd, encoding: &'a Encoding, network: &'a Network) -> Self {
        Lowering {
            bdd,
            encoding,
            network,
            leaves: HashMap::new(),
            memo: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Bind a network signal to an encoded variable.
    pub fn bind(&mut self, signal: &str, id: MvId) -> &mut Self {
        self.leaves.insert(signal.to_string(), id);
        self
    }

    /// `values[k]` holds exactly when `signal` takes value `k`.
    pub fn value_functions(&mut self, signal: &str) -> Result<Vec<Ref>> {
        if let Some(&id) = self.leaves.get(signal) {
            let arity = self.encoding.var(id).arity;
            return Ok((0..arity).map(|k| self.encoding.value(self.bdd, id, k)).collect());
        }
        if let Some(values) = self.memo.get(signal) {
            return Ok(values.clone());
        }
        let (bdd, network) = (self.bdd, self.network);
        let Some(node) = network.node(signal) else {
            return Err(ModelingError::UnknownSignal {
                node: network.name.clone(),
                signal: signal.to_string(),
            }
            .into());
        };
        if !self.visiting.insert(signal.to_string()) {
            return Err(ModelingError::CombinationalCycle(signal.to_string()).into());
        }

        let mut values = Vec::with_capacity(node.arity);
        for cond in &node.function {
            let f = cond.to_bdd(bdd, &mut |lit: &MvLit| self.literal_of(&node.name, lit))?;
            values.push(f);
        }
        self.visiting.remove(signal);
        debug!("lowered '{}' ({} values)", signal, values.len());
        self.memo.insert(signal.to_string(), values.clone());
        Ok(values)
    }

    /// Characteristic function of `lit.signal ∈ lit.values`.
    pub fn literal(&mut self, lit: &MvLit) -> Result<Ref> {
        let owner = self.network.name.clone();
        self.literal_of(&owner, lit)
    }

    fn literal_of(&mut self, owner: &str, lit: &MvLit) -> Result<Ref> {
        if !self.leaves.contains_key(&lit.signal) && self.network.node(&lit.signal).is_none() {
            return Err(ModelingError::UnknownSignal {
                node: owner.to_string(),
                signal: lit.signal.clone(),
            }
            .into());
        }
        let values = self.value_functions(&lit.signal)?;
        let mut res = self.bdd.zero();
        for &value in &lit.values {
            let Some(&f) = values.get(value) else {
                return Err(ModelingError::ValueOutOfRange {
                    signal: lit.signal.clone(),
                    value,
                    arity: values.len(),
                }
                .into());
            };
            res = self.bdd.apply_or(res, f);
        }
        Ok(res)
    }
}

/// The relation `⋁_k (id = k) ∧ values[k]`.
pub fn function_relation(bdd: &Bdd, encoding: &Encoding, id: MvId, values: &[Ref]) -> Ref {
    bdd.apply_or_many(
        values
            .iter()
            .enumerate()
            .map(|(k, &f)| bdd.apply_and(encoding.value(bdd, id, k), f)),
    )
}

fn check_arity(encoding: &Encoding, id: MvId, signal: &str, values: &[Ref]) -> Result<()> {
    let expected = encoding.var(id).arity;
    if values.len() != expected {
        return Err(ModelingError::ArityMismatch {
            signal: signal.to_string(),
            expected,
            found: values.len(),
        }
        .into());
    }
    Ok(())
}

/// Reify the value of `signal` in the variable `target`.
pub fn signal_partition(
    lowering: &mut Lowering,
    signal: &str,
    target: MvId,
    kind: PartitionKind,
) -> Result<Partition> {
    let values = lowering.value_functions(signal)?;
    check_arity(lowering.encoding, target, signal, &values)?;
    Ok(Partition {
        name: signal.to_string(),
        kind,
        relation: function_relation(lowering.bdd, lowering.encoding, target, &values),
    })
}

/// Next-state partition of the latch whose next-state variable is `ns`.
pub fn transition_partition(lowering: &mut Lowering, latch_input: &str, ns: MvId) -> Result<Partition> {
    let mut partition = signal_partition(lowering, latch_input, ns, PartitionKind::Transition)?;
    partition.name = lowering.encoding.var(ns).name.clone();
    Ok(partition)
}

/// `⋀_k (F_k ⇒ S_k)`: whatever the fixed component outputs, the
/// specification allows it.
pub fn conformance_partition(fixed: &mut Lowering, spec: &mut Lowering, output: &str) -> Result<Partition> {
    let produced = fixed.value_functions(output)?;
    let allowed = spec.value_functions(output)?;
    if produced.len() != allowed.len() {
        return Err(ModelingError::ArityMismatch {
            signal: output.to_string(),
            expected: produced.len(),
            found: allowed.len(),
        }
        .into());
    }
    let bdd = fixed.bdd;
    let relation = bdd.apply_and_many(
        produced
            .iter()
            .zip(&allowed)
            .map(|(&f, &s)| bdd.apply_imply(f, s)),
    );
    Ok(Partition {
        name: output.to_string(),
        kind: PartitionKind::Conformance,
        relation,
    })
}

/// Fail unless a transition partition yields a next state for every valid
/// current state and input.
pub fn check_total(bdd: &Bdd, encoding: &Encoding, partition: &Partition, ns: MvId, domain: Ref) -> Result<()> {
    let has_next = bdd.exists(partition.relation, encoding.bits(ns));
    if !bdd.is_implies(domain, has_next) {
        return Err(SynthError::inconsistency(
            Phase::Partitioning,
            format!("next-state relation of '{}' is empty for some state and input", partition.name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::Expr;
    use crate::mv::{MvVar, Role};
    use crate::network::lit;

    fn counter() -> Network {
        // Three-valued counter that advances when `go` is set.
        let mut net = Network::new("counter");
        net.add_input("go", 2)
            .add_node(
                "next",
                3,
                vec![
                    Expr::or(
                        Expr::and(lit("go", &[0]), lit("c", &[0])),
                        Expr::and(lit("go", &[1]), lit("c", &[2])),
                    ),
                    Expr::or(
                        Expr::and(lit("go", &[0]), lit("c", &[1])),
                        Expr::and(lit("go", &[1]), lit("c", &[0])),
                    ),
                    Expr::or(
                        Expr::and(lit("go", &[0]), lit("c", &[2])),
                        Expr::and(lit("go", &[1]), lit("c", &[1])),
                    ),
                ],
            )
            .add_latch("next", "c", 0)
            .add_binary("wrap", lit("c", &[2]))
            .add_output("wrap");
        net
    }

    fn encode(bdd: &Bdd, net: &Network) -> (Encoding, MvId, MvId, MvId) {
        let mut enc = Encoding::new();
        let go = enc.add(bdd, MvVar::new("go", 2, Role::I));
        let cs = enc.add(bdd, MvVar::new("c", 3, Role::CS));
        let ns = enc.add(bdd, MvVar::new("c'", 3, Role::NS));
        assert!(net.latch_by_output("c").is_some());
        (enc, go, cs, ns)
    }

    #[test]
    fn test_transition_partition_is_a_total_function() {
        let bdd = Bdd::default();
        let net = counter();
        let (enc, go, cs, ns) = encode(&bdd, &net);
        let mut lowering = Lowering::new(&bdd, &enc, &net);
        lowering.bind("go", go).bind("c", cs);

        let part = transition_partition(&mut lowering, "next", ns).unwrap();
        assert_eq!(part.kind, PartitionKind::Transition);
        check_total(&bdd, &enc, &part, ns, enc.domains(&bdd, &[go, cs])).unwrap();

        // From c=2 with go=1 the only successor is 0.
        let from = bdd.apply_and(enc.value(&bdd, cs, 2), enc.value(&bdd, go, 1));
        let succ = bdd.exists(bdd.apply_and(part.relation, from), &enc.bits_of(&[go, cs]));
        assert_eq!(succ, enc.value(&bdd, ns, 0));
    }

    #[test]
    fn test_incomplete_function_is_inconsistent() {
        let bdd = Bdd::default();
        let mut net = Network::new("stuck");
        net.add_input("a", 2)
            .add_node("n", 2, vec![lit("a", &[0]), Expr::Const(false)])
            .add_latch("n", "q", 0);
        let mut enc = Encoding::new();
        let a = enc.add(&bdd, MvVar::new("a", 2, Role::I));
        let ns = enc.add(&bdd, MvVar::new("q'", 2, Role::NS));
        let mut lowering = Lowering::new(&bdd, &enc, &net);
        lowering.bind("a", a);

        let part = transition_partition(&mut lowering, "n", ns).unwrap();
        let err = check_total(&bdd, &enc, &part, ns, bdd.one()).unwrap_err();
        assert!(matches!(err, SynthError::Inconsistency { phase: Phase::Partitioning, .. }));
    }

    #[test]
    fn test_unknown_signal_and_cycle() {
        let bdd = Bdd::default();
        let mut net = Network::new("broken");
        net.add_binary("x", lit("ghost", &[1]))
            .add_binary("p", lit("q", &[1]))
            .add_binary("q", lit("p", &[0]));
        let enc = Encoding::new();
        let mut lowering = Lowering::new(&bdd, &enc, &net);

        let err = lowering.value_functions("x").unwrap_err();
        assert!(matches!(
            err,
            SynthError::Modeling(ModelingError::UnknownSignal { ref signal, .. }) if signal == "ghost"
        ));
        let err = lowering.value_functions("p").unwrap_err();
        assert!(matches!(err, SynthError::Modeling(ModelingError::CombinationalCycle(_))));
    }

    #[test]
    fn test_conformance_is_implication() {
        let bdd = Bdd::default();
        let mut fixed = Network::new("f");
        fixed.add_input("i", 2).add_buffer("o", "i").add_output("o");
        // The specification allows anything when i = 0.
        let mut spec = Network::new("s");
        spec.add_input("i", 2)
            .add_node("o", 2, vec![lit("i", &[0]), Expr::Const(true)])
            .add_output("o");

        let mut enc = Encoding::new();
        let i = enc.add(&bdd, MvVar::new("i", 2, Role::I));
        let mut lf = Lowering::new(&bdd, &enc, &fixed);
        lf.bind("i", i);
        let mut ls = Lowering::new(&bdd, &enc, &spec);
        ls.bind("i", i);

        let part = conformance_partition(&mut lf, &mut ls, "o").unwrap();
        assert!(bdd.is_one(part.relation));
    }
}
