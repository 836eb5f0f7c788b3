//! Active learning of deterministic Mealy machines.
//!
//! This crate implements Angluin's L* algorithm against a *minimally
//! adequate teacher*: a black box answering membership queries (what does
//! the target output for this input word?) through the [`Teacher`] trait,
//! with equivalence queries approximated by a pluggable
//! [`EquivalenceOracle`]: the sound [`WMethod`] conformance tester or the
//! probabilistic [`RandomWalk`].
//!
//! A learning session is driven by [`LStar`]:
//!
//! ```
//! use mealy::MachineBuilder;
//! use mealy::core::InputAlphabet;
//! use mealy_learning::{LStar, MachineTeacher};
//!
//! let target = MachineBuilder::default()
//!     .with_transitions([(0, 't', '0', 1), (1, 't', '1', 0)])
//!     .into_mealy(0);
//! let alphabet = InputAlphabet::new(["t"]).unwrap();
//! let mut learner = LStar::new(alphabet, MachineTeacher::new(target), 2);
//! let hypothesis = learner.learn().unwrap();
//! assert_eq!(hypothesis.size(), 2);
//! ```
//!
//! The session is single-threaded and synchronous; all queries block the
//! learner. Every error is fatal to the session and unwinds out of
//! [`LStar::learn`], though the knowledge base's cache stays valid and can
//! seed a retry with a larger state bound.

mod error;
mod knowledge;
mod learner;
mod oracle;
mod table;
mod teacher;

pub use error::{LearningError, TeacherError};
pub use knowledge::{CancelToken, KnowledgeBase, QueryStats};
pub use learner::LStar;
pub use oracle::{EquivalenceOracle, RandomWalk, WMethod};
pub use table::{Inconsistency, ObservationTable};
pub use teacher::{MachineTeacher, Teacher};
