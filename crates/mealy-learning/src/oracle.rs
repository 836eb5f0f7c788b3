use std::collections::VecDeque;

use bit_set::BitSet;
use mealy::{MealyMachine, StateId};
use mealy_core::math::OrderedSet;
use mealy_core::{InputAlphabet, Word};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::LearningError;
use crate::knowledge::KnowledgeBase;
use crate::teacher::Teacher;

/// Strategy for approximating equivalence queries: given a hypothesis and
/// the membership oracle, either concede equivalence (`None`) or produce an
/// input word on which target and hypothesis disagree.
pub trait EquivalenceOracle<T: Teacher> {
    fn check(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Option<Word>, LearningError>;
}

/// Chow's W-method conformance tester.
///
/// Under the promise that the target has at most `m = state_bound` states,
/// the suite `P · Σ^{≤ m−n+1} · W` (state cover, middle words,
/// characterization set) exposes every disagreement: with `P` reaching
/// every hypothesis state, the extra middle letter gives transition
/// coverage, which the completeness argument needs even for `m = n`. Tests
/// run in increasing length order, so the counter-example returned is a
/// shortest one and the whole check is deterministic. The suite is
/// exponential in `m − n`, which therefore must stay small in practice.
#[derive(Clone, Debug)]
pub struct WMethod {
    state_bound: usize,
}

impl WMethod {
    /// Creates a tester promising the target has at most `state_bound`
    /// states.
    pub fn new(state_bound: usize) -> Self {
        WMethod { state_bound }
    }
}

impl<T: Teacher> EquivalenceOracle<T> for WMethod {
    fn check(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Option<Word>, LearningError> {
        let depth = self.state_bound.saturating_sub(hypothesis.size()) + 1;

        let representatives = hypothesis.minimal_representatives();
        let cover: Vec<Word> = representatives.iter().map(|(_, w)| w.clone()).collect();
        let distinguishers = characterization_set(hypothesis)?;
        let middles = words_up_to(hypothesis.alphabet(), depth);
        trace!(
            "w-method suite: {} cover, {} middle, {} distinguishing words",
            cover.len(),
            middles.len(),
            distinguishers.len()
        );

        let mut suite: OrderedSet<Word> = OrderedSet::default();
        for access in &cover {
            for middle in &middles {
                for experiment in &distinguishers {
                    suite.insert(access.concat(middle).concat(experiment));
                }
            }
        }
        let mut tests: Vec<Word> = suite.into_iter().collect();
        tests.sort_by_key(Word::len);

        for test in tests {
            let expected = knowledge.resolve(&test)?;
            let observed = hypothesis.run(&test)?;
            if expected != observed {
                debug!("{test} disagrees: target {expected}, hypothesis {observed}");
                return Ok(Some(test));
            }
        }
        Ok(None)
    }
}

/// All words over `alphabet` of length at most `max_length`, shortest
/// first, including the empty word.
fn words_up_to(alphabet: &InputAlphabet, max_length: usize) -> Vec<Word> {
    let mut words = vec![Word::epsilon()];
    let mut level = vec![Word::epsilon()];
    for _ in 0..max_length {
        level = level
            .iter()
            .flat_map(|word| alphabet.iter().map(move |letter| word.append(letter.clone())))
            .collect();
        words.extend(level.iter().cloned());
    }
    words
}

/// A set of experiments distinguishing every pair of machine states: for
/// each pair, a shortest word on which the two states produce different
/// output words. A machine without distinguishable pairs (one state) falls
/// back to the single-letter experiments, otherwise the suite
/// `P · Σ^{≤k} · W` would be empty and vacuously pass.
fn characterization_set(machine: &MealyMachine) -> Result<Vec<Word>, LearningError> {
    let mut experiments: OrderedSet<Word> = OrderedSet::default();
    for first in machine.state_ids() {
        for second in machine.state_ids().skip(first + 1) {
            if let Some(word) = distinguishing_word(machine, first, second)? {
                experiments.insert(word);
            }
        }
    }
    if experiments.is_empty() {
        experiments.extend(machine.alphabet().iter().cloned().map(Word::letter));
    }
    Ok(experiments.into_iter().collect())
}

/// BFS over state pairs for a shortest word telling `first` and `second`
/// apart, `None` if the two states are output-equivalent.
fn distinguishing_word(
    machine: &MealyMachine,
    first: StateId,
    second: StateId,
) -> Result<Option<Word>, LearningError> {
    let size = machine.size();
    let pair_index = |a: StateId, b: StateId| a.min(b) * size + a.max(b);

    let mut visited = BitSet::with_capacity(size * size);
    visited.insert(pair_index(first, second));
    let mut queue = VecDeque::from([(first, second, Word::epsilon())]);

    while let Some((left, right, path)) = queue.pop_front() {
        for letter in machine.alphabet().iter() {
            let (left_output, left_next) = machine.step(left, letter)?;
            let (right_output, right_next) = machine.step(right, letter)?;
            if left_output != right_output {
                return Ok(Some(path.append(letter.clone())));
            }
            if left_next != right_next && visited.insert(pair_index(left_next, right_next)) {
                queue.push_back((left_next, right_next, path.append(letter.clone())));
            }
        }
    }
    Ok(None)
}

/// A probabilistic oracle without any conformance guarantee: walk both
/// machines with uniformly random inputs, restarting with the configured
/// probability, and report the first accumulated word on which the outputs
/// disagree. Deterministic for a fixed seed.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    restart_probability: f64,
    max_steps: usize,
    rng: StdRng,
}

impl RandomWalk {
    /// Creates a walk restarting with probability `restart_probability`
    /// (strictly between 0 and 1), giving up after `max_steps` steps.
    pub fn new(restart_probability: f64, max_steps: usize, seed: u64) -> Self {
        assert!(
            (0.0..1.0).contains(&restart_probability) && restart_probability > 0.0,
            "restart probability must lie strictly between 0 and 1"
        );
        RandomWalk {
            restart_probability,
            max_steps,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<T: Teacher> EquivalenceOracle<T> for RandomWalk {
    fn check(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Option<Word>, LearningError> {
        let alphabet = hypothesis.alphabet();
        let mut word = Word::epsilon();
        for _ in 0..self.max_steps {
            if self.rng.gen_bool(self.restart_probability) {
                word = Word::epsilon();
                continue;
            }
            let drawn = self.rng.gen_range(0..alphabet.size());
            let letter = alphabet
                .nth(drawn)
                .expect("drawn index lies within the alphabet");
            word = word.append(letter.clone());

            let expected = knowledge.resolve(&word)?;
            let observed = hypothesis.run(&word)?;
            if expected != observed {
                debug!("{word} disagrees: target {expected}, hypothesis {observed}");
                return Ok(Some(word));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::{EquivalenceOracle, RandomWalk, WMethod, characterization_set, words_up_to};
    use crate::knowledge::KnowledgeBase;
    use crate::teacher::MachineTeacher;
    use mealy::{MachineBuilder, MealyMachine};
    use mealy_core::{InputAlphabet, Letter, Word};

    fn word(letters: &str) -> Word {
        Word::from_letters(letters.chars().map(Letter::from))
    }

    fn flipflop() -> MealyMachine {
        MachineBuilder::default()
            .with_transitions([(0, 't', '0', 1), (1, 't', '1', 0)])
            .into_mealy(0)
    }

    fn constant_zero() -> MealyMachine {
        MachineBuilder::default()
            .with_transitions([(0, 't', '0', 0)])
            .into_mealy(0)
    }

    #[test]
    fn wmethod_finds_the_shortest_counterexample() {
        let mut kb = KnowledgeBase::new(MachineTeacher::new(flipflop()));
        let found = WMethod::new(2).check(&constant_zero(), &mut kb).unwrap();
        assert_eq!(found, Some(word("tt")));
    }

    #[test]
    fn wmethod_accepts_an_equivalent_hypothesis() {
        let mut kb = KnowledgeBase::new(MachineTeacher::new(flipflop()));
        assert_eq!(WMethod::new(2).check(&flipflop(), &mut kb).unwrap(), None);
    }

    #[test]
    fn wmethod_searches_below_its_bound_in_length_order() {
        // 0001-emitting modulo-4 counter; first disagreement with the
        // constant-zero machine needs four letters
        let counter = MachineBuilder::default()
            .with_transitions([
                (0, 't', '0', 1),
                (1, 't', '0', 2),
                (2, 't', '0', 3),
                (3, 't', '1', 0),
            ])
            .into_mealy(0);
        let mut kb = KnowledgeBase::new(MachineTeacher::new(counter));
        let found = WMethod::new(4).check(&constant_zero(), &mut kb).unwrap();
        assert_eq!(found, Some(word("tttt")));
    }

    #[test]
    fn characterization_set_separates_flipflop_states() {
        let experiments = characterization_set(&flipflop()).unwrap();
        assert_eq!(experiments, vec![word("t")]);
    }

    #[test]
    fn words_up_to_counts() {
        let alphabet = InputAlphabet::new(["a", "b"]).unwrap();
        let words = words_up_to(&alphabet, 2);
        // ε, two singles, four pairs
        assert_eq!(words.len(), 7);
        assert_eq!(words[0], Word::epsilon());
        assert!(words.windows(2).all(|w| w[0].len() <= w[1].len()));
    }

    #[test]
    fn random_walk_stumbles_over_a_real_counterexample() {
        let mut kb = KnowledgeBase::new(MachineTeacher::new(flipflop()));
        let hypothesis = constant_zero();
        let found = RandomWalk::new(0.05, 1000, 42)
            .check(&hypothesis, &mut kb)
            .unwrap()
            .expect("a thousand steps find the second toggle");
        assert_ne!(
            kb.resolve(&found).unwrap(),
            hypothesis.run(&found).unwrap()
        );
    }

    #[test]
    fn random_walk_accepts_when_nothing_disagrees() {
        let mut kb = KnowledgeBase::new(MachineTeacher::new(flipflop()));
        let found = RandomWalk::new(0.05, 200, 7).check(&flipflop(), &mut kb).unwrap();
        assert_eq!(found, None);
    }
}
