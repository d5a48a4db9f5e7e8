//! # mvsynth: symbolic automaton synthesis for multi-valued networks
//!
//! **`mvsynth`** derives finite automata from symbolic relations over binary-encoded multi-valued signals.
//! All the work happens in a small decision-diagram manager that ships with the crate.
//!
//! ## What it does
//!
//! - **Language equations**: given a fixed component `F` and a specification `S`, [`solve`][crate::solve::solve] builds the most general automaton `X` such that `F` composed with `X` conforms to `S`.
//! - **State transition graphs**: [`extract_stg`][crate::stg::extract_stg] builds the reachable state graph of a single network.
//! - **Formulas**: [`synthesize_from_formula`][crate::formula::synthesize_from_formula] builds an automaton from one Boolean formula over a window of letters.
//!
//! The first two run the same subset construction ([`subset`]), fed with different partitions.
//!
//! ## Basic Usage
//!
//! ```rust
//! use mvsynth::network::{lit, Network};
//! use mvsynth::stg::{extract_stg, StgOptions};
//!
//! // A modulo-2 counter that advances while `go` is high.
//! let mut net = Network::new("counter");
//! net.add_input("go", 2)
//!     .add_binary("next", mvsynth::expr::Expr::xor(lit("go", &[1]), lit("c", &[1])))
//!     .add_latch("next", "c", 0);
//!
//! let automaton = extract_stg(&net, &StgOptions::default()).unwrap();
//! assert_eq!(automaton.num_states(), 2);
//! assert_eq!(automaton.check_complete(), Ok(()));
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: the [`Bdd`][crate::bdd::Bdd] manager with complement edges and a computed table.
//! - **[`mv`]**: multi-valued variables, their roles and binary encoding.
//! - **[`partition`]**: per-signal relations derived from network functions.
//! - **[`image`]**: partitioned image computation with early quantification.
//! - **[`automaton`]**: the resulting automata, with completion and covers.
//! - **[`dot`]**: Graphviz rendering of automata.

pub mod automaton;
pub mod bdd;
pub mod cache;
pub mod dot;
pub mod error;
pub mod expr;
pub mod formula;
pub mod image;
pub mod mv;
pub mod network;
pub mod partition;
pub mod paths;
pub mod progressive;
pub mod reference;
pub mod reorder;
pub mod sat;
pub mod shuffle;
pub mod solve;
pub mod stg;
pub mod subset;
pub mod subtable;
pub mod types;
pub mod utils;

pub use crate::automaton::Automaton;
pub use crate::error::{ModelingError, Phase, Result, SynthError};
