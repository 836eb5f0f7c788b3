use itertools::Itertools;

use crate::core::{InputAlphabet, Letter};
use crate::machine::{MealyMachine, StateId};

/// Helper for assembling a [`MealyMachine`] from edge tuples. Mainly used
/// to set up fixture machines in tests and simulated targets.
///
/// States are numbered densely; any index mentioned in an edge creates the
/// states up to it. Unless overridden, the alphabet consists of the input
/// letters in order of first appearance and states are named `q0`, `q1`, …
///
/// # Example
///
/// ```
/// use mealy::MachineBuilder;
///
/// let machine = MachineBuilder::default()
///     .with_transitions([
///         (0, 'a', '1', 1),
///         (0, 'b', '0', 0),
///         (1, 'a', '0', 0),
///         (1, 'b', '0', 1),
///     ])
///     .into_mealy(0);
/// assert_eq!(machine.size(), 2);
/// ```
#[derive(Default)]
pub struct MachineBuilder {
    symbols: Vec<Letter>,
    edges: Vec<(StateId, Letter, Letter, StateId)>,
    names: Vec<String>,
}

impl MachineBuilder {
    /// Forces the alphabet to consist of exactly these letters, in this
    /// order. Without this, the alphabet is inferred from the edges.
    pub fn with_alphabet(mut self, letters: impl IntoIterator<Item = impl Into<Letter>>) -> Self {
        self.symbols = letters.into_iter().map(Into::into).collect();
        self
    }

    /// Assigns display names to the states, in index order.
    pub fn with_state_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a list of `(source, input, output, target)` transitions.
    pub fn with_transitions<I, O>(
        mut self,
        transitions: impl IntoIterator<Item = (StateId, I, O, StateId)>,
    ) -> Self
    where
        I: Into<Letter>,
        O: Into<Letter>,
    {
        self.edges.extend(
            transitions
                .into_iter()
                .map(|(q, i, o, p)| (q, i.into(), o.into(), p)),
        );
        self
    }

    /// Builds the machine with the given initial state; the arena is
    /// permuted so that the initial state ends up at index 0.
    ///
    /// # Panics
    /// Panics if no edges were added, if the edges are nondeterministic, or
    /// if `initial` is not a mentioned state.
    pub fn into_mealy(self, initial: StateId) -> MealyMachine {
        assert!(!self.edges.is_empty(), "cannot build a machine without transitions");

        let alphabet = if self.symbols.is_empty() {
            InputAlphabet::new(self.edges.iter().map(|(_, i, _, _)| i.clone()).unique())
        } else {
            InputAlphabet::new(self.symbols.clone())
        }
        .expect("edge inputs must form a valid alphabet");

        let num_states = self
            .edges
            .iter()
            .flat_map(|(q, _, _, p)| [*q, *p])
            .max()
            .expect("at least one edge")
            + 1;
        assert!(
            initial < num_states,
            "initial state {initial} is not mentioned by any edge"
        );

        // permute so the designated initial state lands at index 0
        let remap = |q: StateId| {
            if q == initial {
                0
            } else if q == 0 {
                initial
            } else {
                q
            }
        };

        let mut machine = MealyMachine::new(alphabet);
        for index in 0..num_states {
            let original = remap(index);
            let name = self
                .names
                .get(original)
                .cloned()
                .unwrap_or_else(|| format!("q{original}"));
            machine.add_state(name);
        }
        for (source, input, output, target) in self.edges {
            machine
                .add_transition(remap(source), input, output, remap(target))
                .expect("edges must be deterministic and within range");
        }
        machine
    }
}
