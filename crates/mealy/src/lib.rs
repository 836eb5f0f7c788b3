//! Deterministic Mealy machines backed by a state arena.
//!
//! States live in a `Vec` and are addressed by dense [`StateId`]s; the
//! initial state is index `0` by convention. Transitions carry the emitted
//! output letter and the target id, so traversing a word from the initial
//! state yields an output word of the same length.
//!
//! [`MachineBuilder`] offers a compact way to assemble machines from edge
//! tuples, mainly for tests and simulated targets:
//!
//! ```
//! use mealy::MachineBuilder;
//!
//! // the two-state flip-flop: emits 0 from q0, 1 from q1, toggling on 't'
//! let flipflop = MachineBuilder::default()
//!     .with_transitions([(0, 't', '0', 1), (1, 't', '1', 0)])
//!     .into_mealy(0);
//! assert_eq!(flipflop.size(), 2);
//! ```

pub use mealy_core as core;

mod builder;
mod dot;
mod machine;

pub use builder::MachineBuilder;
pub use machine::{MachineError, MealyMachine, StateId, Transition};
