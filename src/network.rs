//! In-memory multi-valued sequential networks.
//!
//! This is the boundary to the network representation: primary inputs,
//! internal nodes given as one condition per value, latches with reset
//! values, and the list of primary outputs. Conditions are expressions over
//! multi-valued literals `signal ∈ {values}` and may reference inputs, latch
//! outputs and other nodes.

use std::collections::HashSet;
use std::fmt;

use crate::expr::Expr;

/// The literal `signal ∈ values`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MvLit {
    pub signal: String,
    pub values: Vec<usize>,
}

impl fmt::Display for MvLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}={{{}}}", self.signal, values.join(","))
    }
}

pub type MvExpr = Expr<MvLit>;

/// Shorthand for the expression `signal ∈ values`.
pub fn lit(signal: &str, values: &[usize]) -> MvExpr {
    Expr::Term(MvLit {
        signal: signal.to_string(),
        values: values.to_vec(),
    })
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signal {
    pub name: String,
    pub arity: usize,
    pub values: Option<Vec<String>>,
}

/// An internal node: `function[k]` holds when the node takes value `k`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    pub name: String,
    pub arity: usize,
    pub values: Option<Vec<String>>,
    pub function: Vec<MvExpr>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Latch {
    /// Node (or input) driving the next state.
    pub input: String,
    /// Signal carrying the current state.
    pub output: String,
    pub reset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    pub name: String,
    inputs: Vec<Signal>,
    outputs: Vec<String>,
    latches: Vec<Latch>,
    nodes: Vec<Node>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Network {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_input(&mut self, name: &str, arity: usize) -> &mut Self {
        self.inputs.push(Signal {
            name: name.to_string(),
            arity,
            values: None,
        });
        self
    }

    pub fn add_node(&mut self, name: &str, arity: usize, function: Vec<MvExpr>) -> &mut Self {
        assert_eq!(function.len(), arity, "Node '{}' needs one condition per value", name);
        self.nodes.push(Node {
            name: name.to_string(),
            arity,
            values: None,
            function,
        });
        self
    }

    /// A node copying `source` (which must already be declared).
    pub fn add_buffer(&mut self, name: &str, source: &str) -> &mut Self {
        let arity = self
            .arity(source)
            .unwrap_or_else(|| panic!("Unknown buffer source '{}'", source));
        let function = (0..arity).map(|k| lit(source, &[k])).collect();
        self.add_node(name, arity, function)
    }

    /// A binary node from a single on-set condition.
    pub fn add_binary(&mut self, name: &str, on: MvExpr) -> &mut Self {
        let off = Expr::not(on.clone());
        self.add_node(name, 2, vec![off, on])
    }

    pub fn add_latch(&mut self, input: &str, output: &str, reset: usize) -> &mut Self {
        self.latches.push(Latch {
            input: input.to_string(),
            output: output.to_string(),
            reset,
        });
        self
    }

    pub fn add_output(&mut self, name: &str) -> &mut Self {
        self.outputs.push(name.to_string());
        self
    }

    pub fn set_value_names(&mut self, name: &str, values: Vec<String>) -> &mut Self {
        if let Some(input) = self.inputs.iter_mut().find(|s| s.name == name) {
            input.values = Some(values);
        } else if let Some(node) = self.nodes.iter_mut().find(|n| n.name == name) {
            node.values = Some(values);
        }
        self
    }

    pub fn inputs(&self) -> &[Signal] {
        &self.inputs
    }
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }
    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn input(&self, name: &str) -> Option<&Signal> {
        self.inputs.iter().find(|s| s.name == name)
    }
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
    pub fn latch_by_output(&self, name: &str) -> Option<&Latch> {
        self.latches.iter().find(|l| l.output == name)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }
    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Whether `name` is any signal of the network: input, node or latch output.
    pub fn has_signal(&self, name: &str) -> bool {
        self.is_input(name) || self.node(name).is_some() || self.latch_by_output(name).is_some()
    }

    /// Arity of a signal. Latch outputs take the arity of their driver.
    pub fn arity(&self, name: &str) -> Option<usize> {
        self.arity_(name, &mut HashSet::new())
    }

    fn arity_(&self, name: &str, visiting: &mut HashSet<String>) -> Option<usize> {
        if let Some(input) = self.input(name) {
            return Some(input.arity);
        }
        if let Some(node) = self.node(name) {
            return Some(node.arity);
        }
        let latch = self.latch_by_output(name)?;
        if !visiting.insert(name.to_string()) {
            return None;
        }
        self.arity_(&latch.input, visiting)
    }

    /// Symbolic value names of a signal, if declared.
    pub fn value_names(&self, name: &str) -> Option<Vec<String>> {
        if let Some(input) = self.input(name) {
            return input.values.clone();
        }
        if let Some(node) = self.node(name) {
            return node.values.clone();
        }
        let latch = self.latch_by_output(name)?;
        self.node(&latch.input).and_then(|n| n.values.clone())
    }

    /// Every name declared anywhere in the network.
    pub fn signal_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = HashSet::new();
        names.extend(self.inputs.iter().map(|s| s.name.clone()));
        names.extend(self.nodes.iter().map(|n| n.name.clone()));
        names.extend(self.latches.iter().map(|l| l.output.clone()));
        names.extend(self.latches.iter().map(|l| l.input.clone()));
        names
    }

    /// Rename a signal everywhere it is declared or referenced.
    pub fn rename_signal(&mut self, old: &str, new: &str) {
        let fix = |name: &mut String| {
            if name == old {
                *name = new.to_string();
            }
        };
        for input in &mut self.inputs {
            fix(&mut input.name);
        }
        for output in &mut self.outputs {
            fix(output);
        }
        for latch in &mut self.latches {
            fix(&mut latch.input);
            fix(&mut latch.output);
        }
        for node in &mut self.nodes {
            fix(&mut node.name);
            node.function = node
                .function
                .iter()
                .map(|cond| {
                    cond.map(&mut |l: &MvLit| MvLit {
                        signal: if l.signal == old { new.to_string() } else { l.signal.clone() },
                        values: l.values.clone(),
                    })
                })
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn toggle() -> Network {
        let mut net = Network::new("toggle");
        net.add_input("en", 2)
            .add_binary("next", Expr::xor(lit("en", &[1]), lit("q", &[1])))
            .add_latch("next", "q", 0)
            .add_buffer("out", "en")
            .add_output("out");
        net
    }

    #[test]
    fn test_lookups() {
        let net = toggle();
        assert!(net.is_input("en"));
        assert!(net.is_output("out"));
        assert!(net.has_signal("q"));
        assert!(!net.has_signal("nope"));
        assert_eq!(net.arity("q"), Some(2));
        assert_eq!(net.latch_by_output("q").map(|l| l.reset), Some(0));
    }

    #[test]
    fn test_rename_signal_rewrites_references() {
        let mut net = toggle();
        net.rename_signal("q", "q_s");
        assert!(net.latch_by_output("q_s").is_some());
        let mut referenced = Vec::new();
        for cond in &net.node("next").unwrap().function {
            cond.for_each_term(&mut |l| referenced.push(l.signal.clone()));
        }
        assert!(referenced.contains(&"q_s".to_string()));
        assert!(!referenced.contains(&"q".to_string()));
    }

    #[test]
    #[should_panic(expected = "one condition per value")]
    fn test_node_arity_mismatch_panics() {
        Network::new("bad").add_node("n", 3, vec![lit("a", &[0])]);
    }
}
