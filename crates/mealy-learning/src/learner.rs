use mealy::MealyMachine;
use mealy_core::InputAlphabet;
use owo_colors::OwoColorize;
use tracing::{debug, error, info, trace};

use crate::error::LearningError;
use crate::knowledge::{CancelToken, KnowledgeBase};
use crate::oracle::{EquivalenceOracle, WMethod};
use crate::table::ObservationTable;
use crate::teacher::Teacher;

/// Angluin's L* learner for deterministic Mealy machines.
///
/// Drives the observation table to a closed and consistent state, builds a
/// hypothesis, submits it to the equivalence oracle and integrates
/// counter-examples until the oracle concedes. Each counter-example grows
/// the number of distinguished states, so for a target of at most
/// `max_states` states the outer loop runs at most `max_states` times.
pub struct LStar<T: Teacher, O: EquivalenceOracle<T>> {
    alphabet: InputAlphabet,
    knowledge: KnowledgeBase<T>,
    max_states: usize,
    oracle: O,
    cancel: CancelToken,
}

impl<T: Teacher> LStar<T, WMethod> {
    /// Creates a learner with the default oracle policy: a [`WMethod`]
    /// tester whose target bound is `max_states`.
    pub fn new(alphabet: InputAlphabet, teacher: T, max_states: usize) -> Self {
        Self::with_oracle(alphabet, teacher, max_states, WMethod::new(max_states))
    }
}

impl<T: Teacher, O: EquivalenceOracle<T>> LStar<T, O> {
    /// Creates a learner with an explicit oracle policy.
    pub fn with_oracle(alphabet: InputAlphabet, teacher: T, max_states: usize, oracle: O) -> Self {
        let cancel = CancelToken::new();
        let knowledge = KnowledgeBase::with_cancellation(teacher, cancel.clone());
        LStar {
            alphabet,
            knowledge,
            max_states,
            oracle,
            cancel,
        }
    }

    /// A handle to the cancellation flag of this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The knowledge base of this session, e.g. for query statistics.
    pub fn knowledge(&self) -> &KnowledgeBase<T> {
        &self.knowledge
    }

    /// Consumes the learner, releasing the knowledge base. Its cache stays
    /// valid, so a follow-up session with a larger bound can reuse it.
    pub fn into_knowledge(self) -> KnowledgeBase<T> {
        self.knowledge
    }

    /// Runs the learning session to completion.
    pub fn learn(&mut self) -> Result<MealyMachine, LearningError> {
        info!(
            "learning over {} with an admissible bound of {} states",
            self.alphabet, self.max_states
        );
        let mut table = ObservationTable::initialize(self.alphabet.clone(), &mut self.knowledge)?;

        loop {
            if self.cancel.is_cancelled() {
                return Err(LearningError::Cancelled);
            }

            // closure first; repairing consistency can unclose the table
            // again, so both are re-checked until neither finds a witness
            loop {
                while let Some(witness) = table.find_unclosed() {
                    trace!("closing the table at {witness}");
                    table.close(&witness, &mut self.knowledge)?;
                }
                let Some(defect) = table.find_inconsistency() else {
                    break;
                };
                trace!(
                    "rows of {} and {} separate after {}",
                    defect.first, defect.second, defect.letter
                );
                table.make_consistent(&defect.letter, &defect.suffix, &mut self.knowledge)?;
            }
            trace!("table is closed and consistent:\n{table}");

            let hypothesis = table.build_hypothesis()?;
            debug!("hypothesis has {} states", hypothesis.size());
            if hypothesis.size() > self.max_states {
                error!(
                    "the target needs more than the admissible {} states",
                    self.max_states
                );
                return Err(LearningError::StateBoundExceeded {
                    hypothesis: hypothesis.size(),
                    bound: self.max_states,
                });
            }

            match self.oracle.check(&hypothesis, &mut self.knowledge)? {
                None => {
                    let stats = self.knowledge.stats();
                    info!(
                        "accepted a hypothesis with {} states after {} target queries \
                         ({} cache hits)",
                        hypothesis.size(),
                        stats.submitted,
                        stats.cached
                    );
                    return Ok(hypothesis);
                }
                Some(counterexample) => {
                    let expected = self.knowledge.resolve(&counterexample)?;
                    let observed = hypothesis.run(&counterexample)?;
                    if expected == observed {
                        return Err(LearningError::OracleMisbehavior(format!(
                            "\"{counterexample}\" is not a counter-example, target and \
                             hypothesis both answer \"{expected}\""
                        )));
                    }
                    debug!(
                        "integrating counter-example {}",
                        counterexample.to_string().red()
                    );
                    table.integrate_counterexample(&counterexample, &mut self.knowledge)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LStar;
    use crate::error::{LearningError, TeacherError};
    use crate::knowledge::KnowledgeBase;
    use crate::oracle::{EquivalenceOracle, RandomWalk, WMethod};
    use crate::teacher::{MachineTeacher, Teacher};
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

    /// Emits `1` for every input letter, whatever the input.
    struct EchoTeacher;

    impl Teacher for EchoTeacher {
        fn submit(&mut self, input: &Word) -> Result<Word, TeacherError> {
            Ok(Word::from_letters(
                input.letters().iter().map(|_| Letter::int(1)),
            ))
        }
    }

    #[test_log::test]
    fn single_state_echo_machine() {
        let alphabet = InputAlphabet::new(["a", "b"]).unwrap();
        let mut learner = LStar::new(alphabet, EchoTeacher, 2);
        let machine = learner.learn().unwrap();
        assert_eq!(machine.size(), 1);
        for letter in ["a", "b"] {
            let transition = machine.transition(0, &Letter::str(letter)).unwrap();
            assert_eq!(transition.output, Letter::int(1));
            assert_eq!(transition.target, 0);
        }
    }

    #[test_log::test]
    fn two_state_flipflop() {
        let alphabet = InputAlphabet::new(["t"]).unwrap();
        let mut learner = LStar::new(alphabet, MachineTeacher::new(flipflop()), 2);
        let machine = learner.learn().unwrap();
        assert_eq!(machine.size(), 2);
        assert!(machine.is_total());
        assert_eq!(machine.run(&word("t")).unwrap(), word("0"));
        assert_eq!(machine.run(&word("tt")).unwrap(), word("01"));
        assert_eq!(machine.run(&word("ttt")).unwrap(), word("010"));
        assert!(learner.knowledge().stats().submitted > 0);
    }

    const REFILL_WATER: &str = "REFILL_WATER";
    const REFILL_COFFEE: &str = "REFILL_COFFEE";
    const PRESS_A: &str = "PRESS_A";
    const PRESS_B: &str = "PRESS_B";
    const PRESS_C: &str = "PRESS_C";

    /// A stateless replay of the coffee machine fixture: two single-shot
    /// resource counters, one button that brews when both are stocked.
    struct CoffeeTeacher;

    impl Teacher for CoffeeTeacher {
        fn submit(&mut self, input: &Word) -> Result<Word, TeacherError> {
            let (mut water, mut coffee) = (false, false);
            let mut outputs = Vec::with_capacity(input.len());
            for letter in input.letters() {
                let Letter::Str(name) = letter else {
                    return Err(TeacherError::Transport(format!("unexpected input {letter}")));
                };
                outputs.push(Letter::str(match name.as_str() {
                    REFILL_WATER => {
                        water = true;
                        "OK"
                    }
                    REFILL_COFFEE => {
                        coffee = true;
                        "OK"
                    }
                    PRESS_A if water && coffee => {
                        water = false;
                        coffee = false;
                        "COFFEE"
                    }
                    PRESS_A | PRESS_B | PRESS_C => "ERROR",
                    other => {
                        return Err(TeacherError::Transport(format!("unknown input {other}")));
                    }
                }));
            }
            Ok(Word::from_letters(outputs))
        }
    }

    fn coffee_alphabet() -> InputAlphabet {
        InputAlphabet::new([REFILL_WATER, REFILL_COFFEE, PRESS_A, PRESS_B, PRESS_C]).unwrap()
    }

    #[test_log::test]
    fn four_state_coffee_machine() {
        let mut learner = LStar::new(coffee_alphabet(), CoffeeTeacher, 4);
        let machine = learner.learn().unwrap();
        assert_eq!(machine.size(), 4);

        let brew = Word::from_letters([
            Letter::str(REFILL_WATER),
            Letter::str(REFILL_COFFEE),
            Letter::str(PRESS_A),
            Letter::str(PRESS_A),
        ]);
        assert_eq!(
            machine.run(&brew).unwrap(),
            Word::from_letters([
                Letter::str("OK"),
                Letter::str("OK"),
                Letter::str("COFFEE"),
                Letter::str("ERROR"),
            ])
        );
        assert_eq!(
            machine.run(&Word::letter(Letter::str(PRESS_A))).unwrap(),
            Word::letter(Letter::str("ERROR"))
        );
    }

    #[test]
    fn random_walk_learns_the_flipflop_too() {
        let alphabet = InputAlphabet::new(["t"]).unwrap();
        let mut learner = LStar::with_oracle(
            alphabet,
            MachineTeacher::new(flipflop()),
            2,
            RandomWalk::new(0.05, 1000, 42),
        );
        let machine = learner.learn().unwrap();
        assert_eq!(machine.size(), 2);
        assert_eq!(machine.run(&word("ttt")).unwrap(), word("010"));
    }

    #[test_log::test]
    fn state_bound_exceeded_terminates() {
        // modulo-4 counter emitting 1 on every fourth 't'
        let counter = MachineBuilder::default()
            .with_transitions([
                (0, 't', '0', 1),
                (1, 't', '0', 2),
                (2, 't', '0', 3),
                (3, 't', '1', 0),
            ])
            .into_mealy(0);
        let alphabet = InputAlphabet::new(["t"]).unwrap();
        // the oracle probes up to the true size, the learner only admits 2
        let mut learner =
            LStar::with_oracle(alphabet, MachineTeacher::new(counter), 2, WMethod::new(4));
        assert!(matches!(
            learner.learn(),
            Err(LearningError::StateBoundExceeded { bound: 2, .. })
        ));
    }

    #[test]
    fn wmethod_runs_are_reproducible() {
        let learn_once = || {
            let alphabet = InputAlphabet::new(["t"]).unwrap();
            LStar::new(alphabet, MachineTeacher::new(flipflop()), 2)
                .learn()
                .unwrap()
                .dot_representation()
        };
        assert_eq!(learn_once(), learn_once());
    }

    #[test]
    fn relearning_a_hypothesis_is_isomorphic() {
        let mut learner = LStar::new(coffee_alphabet(), CoffeeTeacher, 4);
        let first = learner.learn().unwrap();

        let mut again = LStar::new(coffee_alphabet(), MachineTeacher::new(first.clone()), 4);
        let second = again.learn().unwrap();
        assert_eq!(first.size(), second.size());
        assert_eq!(first.dot_representation(), second.dot_representation());
    }

    #[test]
    fn cancellation_unwinds_the_session() {
        let alphabet = InputAlphabet::new(["t"]).unwrap();
        let mut learner = LStar::new(alphabet, MachineTeacher::new(flipflop()), 2);
        learner.cancel_token().cancel();
        assert!(matches!(learner.learn(), Err(LearningError::Cancelled)));
    }

    /// Claims the single-letter word is a counter-example no matter what.
    struct LyingOracle;

    impl<T: Teacher> EquivalenceOracle<T> for LyingOracle {
        fn check(
            &mut self,
            _hypothesis: &MealyMachine,
            _knowledge: &mut KnowledgeBase<T>,
        ) -> Result<Option<Word>, LearningError> {
            Ok(Some(word("t")))
        }
    }

    #[test]
    fn spurious_counterexamples_are_detected() {
        let alphabet = InputAlphabet::new(["t"]).unwrap();
        let mut learner =
            LStar::with_oracle(alphabet, MachineTeacher::new(flipflop()), 2, LyingOracle);
        assert!(matches!(
            learner.learn(),
            Err(LearningError::OracleMisbehavior(_))
        ));
    }
}
