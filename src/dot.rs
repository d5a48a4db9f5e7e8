//! Automaton to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **States** are circles labeled with their name; accepting states are
//!   double circles
//! - **Initial states** are entered by an arrow from an invisible point
//! - **The don't-care state** is drawn with the configured style (dashed by
//!   default)
//! - **Edges** carry the transition guard as a multi-valued sum of products
//!
//! # Examples
//!
//! ```
//! use mvsynth::network::{lit, Network};
//! use mvsynth::stg::{extract_stg, StgOptions};
//!
//! let mut net = Network::new("toggle");
//! net.add_input("t", 2)
//!     .add_binary("n", lit("t", &[1]))
//!     .add_latch("n", "q", 0);
//!
//! let automaton = extract_stg(&net, &StgOptions::default()).unwrap();
//! let dot = automaton.to_dot();
//! assert!(dot.starts_with("digraph"));
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt;

use crate::automaton::Automaton;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for ordinary states (default: "circle")
    pub state_shape: &'static str,
    /// Shape for accepting states (default: "doublecircle")
    pub accepting_shape: &'static str,
    /// Style for the don't-care state (default: "dashed")
    pub dont_care_style: &'static str,
    /// Layout direction (default: "LR")
    pub rankdir: &'static str,
    /// Whether to label edges with their guards (default: true)
    pub show_guards: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            state_shape: "circle",
            accepting_shape: "doublecircle",
            dont_care_style: "dashed",
            rankdir: "LR",
            show_guards: true,
        }
    }
}

/// An automaton paired with a rendering configuration; `Display` writes DOT.
pub struct AutomatonDot<'a> {
    automaton: &'a Automaton,
    config: DotConfig,
}

impl<'a> AutomatonDot<'a> {
    pub fn new(automaton: &'a Automaton, config: DotConfig) -> Self {
        AutomatonDot { automaton, config }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for AutomatonDot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let automaton = self.automaton;
        let config = &self.config;

        writeln!(f, "digraph {{")?;
        writeln!(f, "rankdir={};", config.rankdir)?;
        writeln!(f, "node [shape={}];", config.state_shape)?;

        for (id, state) in automaton.states() {
            let shape = if state.accepting {
                config.accepting_shape
            } else {
                config.state_shape
            };
            if automaton.is_dont_care(id) {
                writeln!(
                    f,
                    "{} [label=\"{}\", shape={}, style={}];",
                    id,
                    escape(&state.name),
                    shape,
                    config.dont_care_style
                )?;
            } else {
                writeln!(f, "{} [label=\"{}\", shape={}];", id, escape(&state.name), shape)?;
            }
        }

        // Entry arrows
        for &id in automaton.initial() {
            writeln!(f, "init{} [shape=point, label=\"\"];", id)?;
            writeln!(f, "init{} -> {};", id, id)?;
        }

        for t in automaton.transitions() {
            if config.show_guards {
                writeln!(
                    f,
                    "{} -> {} [label=\"{}\"];",
                    t.from,
                    t.to,
                    escape(&automaton.cover_string(t.guard))
                )?;
            } else {
                writeln!(f, "{} -> {};", t.from, t.to)?;
            }
        }

        writeln!(f, "}}")
    }
}

impl Automaton {
    /// Converts the automaton to DOT (Graphviz) format.
    pub fn to_dot(&self) -> String {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> String {
        AutomatonDot::new(self, config.clone()).to_string()
    }
}
