use mealy::MealyMachine;
use mealy_core::Word;

use crate::error::TeacherError;

/// A minimally adequate teacher's membership side: a black box that maps an
/// input word to the output word the target emits for it.
///
/// Implementations may wrap anything from an in-process machine to a
/// subprocess or a network peer. The `start`/`stop` lifecycle hooks default
/// to no-ops and are never called by the learner; scoping the target's
/// lifetime is the caller's responsibility.
pub trait Teacher {
    /// Runs `word` against the target and returns the emitted output word,
    /// which must have the same length as the input.
    fn submit(&mut self, word: &Word) -> Result<Word, TeacherError>;

    /// Brings the target up. Called by the session owner, not the learner.
    fn start(&mut self) -> Result<(), TeacherError> {
        Ok(())
    }

    /// Tears the target down. Called by the session owner, not the learner.
    fn stop(&mut self) -> Result<(), TeacherError> {
        Ok(())
    }
}

/// A teacher backed by an in-process [`MealyMachine`]. Used to simulate
/// targets in tests and to re-learn a previously inferred hypothesis.
#[derive(Clone, Debug)]
pub struct MachineTeacher {
    machine: MealyMachine,
}

impl MachineTeacher {
    /// Wraps the given machine. It should be total over its alphabet,
    /// otherwise queries touching the missing transitions fail.
    pub fn new(machine: MealyMachine) -> Self {
        MachineTeacher { machine }
    }

    /// The wrapped machine.
    pub fn machine(&self) -> &MealyMachine {
        &self.machine
    }
}

impl Teacher for MachineTeacher {
    fn submit(&mut self, word: &Word) -> Result<Word, TeacherError> {
        self.machine
            .run(word)
            .map_err(|err| TeacherError::Transport(err.to_string()))
    }
}
