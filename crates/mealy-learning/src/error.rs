use mealy::MachineError;
use thiserror::Error;

/// Failures at the transport boundary between the learner and the target.
#[derive(Error, Debug)]
pub enum TeacherError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("i/o failure while querying the target: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can abort a learning session. There is no local
/// recovery; each of these unwinds out of [`LStar::learn`](crate::LStar::learn).
#[derive(Error, Debug)]
pub enum LearningError {
    /// The teacher could not answer a membership query.
    #[error("membership query failed: {0}")]
    Teacher(#[from] TeacherError),
    /// The equivalence oracle or the target contradicted itself.
    #[error("oracle misbehavior: {0}")]
    OracleMisbehavior(String),
    /// The hypothesis grew past the admissible state bound; the caller
    /// should retry with a larger bound.
    #[error("hypothesis has {hypothesis} states, exceeding the bound of {bound}")]
    StateBoundExceeded { hypothesis: usize, bound: usize },
    /// Cooperative cancellation was observed.
    #[error("learning session was cancelled")]
    Cancelled,
    /// A table or machine invariant was broken. Programmer error.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<MachineError> for LearningError {
    // the learner only ever traverses machines it built total, so any
    // traversal failure is a broken invariant
    fn from(err: MachineError) -> Self {
        LearningError::InvariantViolation(err.to_string())
    }
}
