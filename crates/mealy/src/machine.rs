use std::collections::VecDeque;
use std::fmt;

use bimap::BiBTreeMap;
use bit_set::BitSet;
use tabled::builder::Builder;
use tabled::settings::Style;
use thiserror::Error;

use crate::core::{InputAlphabet, Letter, Word};

/// Dense index of a state within a [`MealyMachine`] arena.
pub type StateId = usize;

/// Errors arising from machine construction or traversal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MachineError {
    #[error("state {0} does not exist")]
    UnknownState(StateId),
    #[error("state \"{state}\" has no transition for input \"{input}\"")]
    MissingTransition { state: String, input: Letter },
    #[error("state \"{state}\" already has a transition for input \"{input}\"")]
    DuplicateTransition { state: String, input: Letter },
    #[error("letter \"{0}\" is not part of the input alphabet")]
    ForeignLetter(Letter),
    #[error("the empty letter cannot be emitted as an output")]
    EmptyOutput,
}

/// An outgoing transition: reading `input` emits `output` and moves to
/// `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub input: Letter,
    pub output: Letter,
    pub target: StateId,
}

#[derive(Clone, Debug)]
struct StateData {
    name: String,
    // kept sorted by the alphabet position of the input letter
    transitions: Vec<Transition>,
}

/// A deterministic Mealy machine over a fixed input alphabet.
///
/// The arena owns all states; transitions refer to targets by [`StateId`],
/// so the graph may contain cycles without any reference juggling. State
/// names are metadata for rendering only, identity is the index.
#[derive(Clone, Debug)]
pub struct MealyMachine {
    alphabet: InputAlphabet,
    states: Vec<StateData>,
}

impl MealyMachine {
    /// Creates a machine without any states yet. The first state added
    /// becomes the initial state.
    pub fn new(alphabet: InputAlphabet) -> Self {
        MealyMachine {
            alphabet,
            states: Vec::new(),
        }
    }

    /// The input alphabet of this machine.
    pub fn alphabet(&self) -> &InputAlphabet {
        &self.alphabet
    }

    /// The number of states in the arena.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// The initial state, index `0` by convention.
    pub fn initial(&self) -> StateId {
        0
    }

    /// Adds a state with the given display name and returns its id.
    pub fn add_state(&mut self, name: impl Into<String>) -> StateId {
        self.states.push(StateData {
            name: name.into(),
            transitions: Vec::new(),
        });
        self.states.len() - 1
    }

    /// The display name of a state.
    pub fn state_name(&self, state: StateId) -> Option<&str> {
        self.states.get(state).map(|s| s.name.as_str())
    }

    /// All state ids in arena order.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        0..self.states.len()
    }

    /// The outgoing transitions of a state, in alphabet order.
    pub fn transitions_from(&self, state: StateId) -> impl Iterator<Item = &Transition> + '_ {
        self.states
            .get(state)
            .map(|s| s.transitions.as_slice())
            .unwrap_or_default()
            .iter()
    }

    /// Adds the transition `(source, input/output, target)`.
    ///
    /// Fails if either state is missing, the input is not an alphabet
    /// letter, or a transition for `(source, input)` already exists; the
    /// machine stays deterministic at all times.
    pub fn add_transition(
        &mut self,
        source: StateId,
        input: Letter,
        output: Letter,
        target: StateId,
    ) -> Result<(), MachineError> {
        if target >= self.states.len() {
            return Err(MachineError::UnknownState(target));
        }
        if output.is_empty() {
            return Err(MachineError::EmptyOutput);
        }
        let Some(position) = self.alphabet.position(&input) else {
            return Err(MachineError::ForeignLetter(input));
        };
        let state = self
            .states
            .get_mut(source)
            .ok_or(MachineError::UnknownState(source))?;
        if state.transitions.iter().any(|t| t.input == input) {
            return Err(MachineError::DuplicateTransition {
                state: state.name.clone(),
                input,
            });
        }
        let transition = Transition {
            input,
            output,
            target,
        };
        let at = state
            .transitions
            .iter()
            .position(|t| self.alphabet.position(&t.input).unwrap_or(usize::MAX) > position)
            .unwrap_or(state.transitions.len());
        state.transitions.insert(at, transition);
        Ok(())
    }

    /// The transition taken from `state` on `input`, if one exists.
    pub fn transition(&self, state: StateId, input: &Letter) -> Option<&Transition> {
        self.states
            .get(state)?
            .transitions
            .iter()
            .find(|t| &t.input == input)
    }

    /// Performs one step from `state` on `input`, returning the emitted
    /// letter and the successor state.
    pub fn step(&self, state: StateId, input: &Letter) -> Result<(Letter, StateId), MachineError> {
        let data = self
            .states
            .get(state)
            .ok_or(MachineError::UnknownState(state))?;
        data.transitions
            .iter()
            .find(|t| &t.input == input)
            .map(|t| (t.output.clone(), t.target))
            .ok_or_else(|| MachineError::MissingTransition {
                state: data.name.clone(),
                input: input.clone(),
            })
    }

    /// Traverses `word` from the given state and collects the emitted
    /// output word, which has the same length as the input.
    pub fn run_from(&self, state: StateId, word: &Word) -> Result<Word, MachineError> {
        let mut current = state;
        let mut outputs = Vec::with_capacity(word.len());
        for input in word.letters() {
            let (output, next) = self.step(current, input)?;
            outputs.push(output);
            current = next;
        }
        Ok(Word::from_letters(outputs))
    }

    /// Traverses `word` from the initial state.
    pub fn run(&self, word: &Word) -> Result<Word, MachineError> {
        self.run_from(self.initial(), word)
    }

    /// The state reached from `state` after reading `word`.
    pub fn reached_from(&self, state: StateId, word: &Word) -> Result<StateId, MachineError> {
        let mut current = state;
        for input in word.letters() {
            let (_, next) = self.step(current, input)?;
            current = next;
        }
        Ok(current)
    }

    /// Whether every state has exactly one transition per alphabet letter.
    pub fn is_total(&self) -> bool {
        self.states.iter().all(|state| {
            state.transitions.len() == self.alphabet.size()
                && self.alphabet.iter().all(|letter| {
                    state.transitions.iter().any(|t| &t.input == letter)
                })
        })
    }

    /// All states reachable from the initial state, in BFS order.
    pub fn reachable_states(&self) -> Vec<StateId> {
        if self.states.is_empty() {
            return Vec::new();
        }
        let mut visited = BitSet::with_capacity(self.states.len());
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.initial()]);
        visited.insert(self.initial());
        while let Some(state) = queue.pop_front() {
            order.push(state);
            for t in self.transitions_from(state) {
                if visited.insert(t.target) {
                    queue.push_back(t.target);
                }
            }
        }
        order
    }

    /// For every reachable state, a shortest input word leading to it from
    /// the initial state. Ties are broken by alphabet order, so the result
    /// is canonical; the initial state maps to the empty word.
    pub fn minimal_representatives(&self) -> BiBTreeMap<StateId, Word> {
        let mut representatives = BiBTreeMap::new();
        if self.states.is_empty() {
            return representatives;
        }
        let mut visited = BitSet::with_capacity(self.states.len());
        let mut queue = VecDeque::from([(self.initial(), Word::epsilon())]);
        visited.insert(self.initial());
        while let Some((state, access)) = queue.pop_front() {
            for t in self.transitions_from(state) {
                if visited.insert(t.target) {
                    queue.push_back((t.target, access.append(t.input.clone())));
                }
            }
            representatives.insert(state, access);
        }
        representatives
    }
}

impl fmt::Display for MealyMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        let mut header = vec!["state".to_string()];
        header.extend(self.alphabet.iter().map(ToString::to_string));
        builder.push_record(header);
        for (id, state) in self.states.iter().enumerate() {
            let mut record = vec![state.name.clone()];
            for letter in self.alphabet.iter() {
                record.push(match self.transition(id, letter) {
                    Some(t) => format!(
                        "{}/{}",
                        t.output,
                        self.state_name(t.target).unwrap_or("?")
                    ),
                    None => "-".to_string(),
                });
            }
            builder.push_record(record);
        }
        write!(f, "{}", builder.build().with(Style::sharp()))
    }
}

#[cfg(test)]
mod tests {
    use super::{MachineError, MealyMachine};
    use crate::MachineBuilder;
    use crate::core::{InputAlphabet, Letter, Word};

    fn word(letters: &str) -> Word {
        Word::from_letters(letters.chars().map(Letter::from))
    }

    fn flipflop() -> MealyMachine {
        MachineBuilder::default()
            .with_transitions([(0, 't', '0', 1), (1, 't', '1', 0)])
            .into_mealy(0)
    }

    #[test]
    fn traversal_produces_same_length_output() {
        let machine = flipflop();
        assert_eq!(machine.run(&word("t")).unwrap(), word("0"));
        assert_eq!(machine.run(&word("tt")).unwrap(), word("01"));
        assert_eq!(machine.run(&word("ttt")).unwrap(), word("010"));
        assert_eq!(machine.run(&Word::epsilon()).unwrap(), Word::epsilon());
    }

    #[test]
    fn determinism_is_enforced() {
        let alphabet = InputAlphabet::new(["a"]).unwrap();
        let mut machine = MealyMachine::new(alphabet);
        let q0 = machine.add_state("q0");
        machine
            .add_transition(q0, Letter::str("a"), Letter::int(0), q0)
            .unwrap();
        assert_eq!(
            machine.add_transition(q0, Letter::str("a"), Letter::int(1), q0),
            Err(MachineError::DuplicateTransition {
                state: "q0".to_string(),
                input: Letter::str("a"),
            })
        );
    }

    #[test]
    fn foreign_letters_are_rejected() {
        let alphabet = InputAlphabet::new(["a"]).unwrap();
        let mut machine = MealyMachine::new(alphabet);
        let q0 = machine.add_state("q0");
        assert_eq!(
            machine.add_transition(q0, Letter::str("b"), Letter::int(0), q0),
            Err(MachineError::ForeignLetter(Letter::str("b")))
        );
        assert_eq!(
            machine.add_transition(q0, Letter::str("a"), Letter::Empty, q0),
            Err(MachineError::EmptyOutput)
        );
    }

    #[test]
    fn missing_transition_is_an_error() {
        let alphabet = InputAlphabet::new(["a", "b"]).unwrap();
        let mut machine = MealyMachine::new(alphabet);
        let q0 = machine.add_state("q0");
        machine
            .add_transition(q0, Letter::str("a"), Letter::int(0), q0)
            .unwrap();
        assert!(!machine.is_total());
        assert_eq!(
            machine.run(&word("b")),
            Err(MachineError::MissingTransition {
                state: "q0".to_string(),
                input: Letter::str("b"),
            })
        );
    }

    #[test]
    fn minimal_representatives_are_shortest() {
        // q0 --a--> q1 --a--> q2, with b self-loops everywhere
        let machine = MachineBuilder::default()
            .with_transitions([
                (0, 'a', '0', 1),
                (0, 'b', '0', 0),
                (1, 'a', '0', 2),
                (1, 'b', '0', 1),
                (2, 'a', '0', 2),
                (2, 'b', '0', 2),
            ])
            .into_mealy(0);
        let reps = machine.minimal_representatives();
        assert_eq!(reps.get_by_left(&0), Some(&Word::epsilon()));
        assert_eq!(reps.get_by_left(&1), Some(&word("a")));
        assert_eq!(reps.get_by_left(&2), Some(&word("aa")));
    }

    #[test]
    fn reachability_skips_orphans() {
        let alphabet = InputAlphabet::new(["a"]).unwrap();
        let mut machine = MealyMachine::new(alphabet);
        let q0 = machine.add_state("q0");
        let _orphan = machine.add_state("q1");
        machine
            .add_transition(q0, Letter::str("a"), Letter::int(0), q0)
            .unwrap();
        assert_eq!(machine.reachable_states(), vec![q0]);
    }
}
