use std::fmt;

use itertools::Itertools;
use mealy::{MealyMachine, StateId};
use mealy_core::math::{OrderedMap, OrderedSet};
use mealy_core::{InputAlphabet, Letter, Word};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::trace;

use crate::error::LearningError;
use crate::knowledge::KnowledgeBase;
use crate::teacher::Teacher;

/// A consistency defect: `first` and `second` have equal rows, yet their
/// one-letter extensions by `letter` disagree in the column of `suffix`.
/// Adding `letter · suffix` to the experiments separates them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inconsistency {
    pub first: Word,
    pub second: Word,
    pub letter: Letter,
    pub suffix: Word,
}

/// Angluin's observation table for Mealy machines.
///
/// Rows are indexed by the access sequences `S` (prefix-closed, starting
/// from ε) and the frontier `SA = S·Σ \ S`; columns by the suffix-closed
/// experiments `E`, which start out as the single-letter words and never
/// contain ε. The cell for `(u, e)` holds the last `|e|` letters of the
/// target's answer to `u·e`, so every cell is a word exactly as long as
/// its column's suffix.
///
/// All sets grow monotonically and iterate in insertion order; a row value
/// is the vector of its cells in column order, compared and hashed as a
/// value. Cells are (re)computed against the [`KnowledgeBase`], whose
/// memoization makes refilling a table cheap.
#[derive(Debug)]
pub struct ObservationTable {
    alphabet: InputAlphabet,
    prefixes: OrderedSet<Word>,
    frontier: OrderedSet<Word>,
    suffixes: OrderedSet<Word>,
    cells: OrderedMap<Word, Vec<Word>>,
}

impl ObservationTable {
    /// Sets up the table with `S = {ε}`, `E` the single-letter suffixes and
    /// the frontier accordingly, then fills all cells through `knowledge`.
    pub fn initialize<T: Teacher>(
        alphabet: InputAlphabet,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Self, LearningError> {
        let mut table = ObservationTable {
            prefixes: OrderedSet::from_iter([Word::epsilon()]),
            frontier: alphabet.iter().cloned().map(Word::letter).collect(),
            suffixes: alphabet.iter().cloned().map(Word::letter).collect(),
            alphabet,
            cells: OrderedMap::default(),
        };
        table.fill(knowledge)?;
        Ok(table)
    }

    /// The input alphabet the table ranges over.
    pub fn alphabet(&self) -> &InputAlphabet {
        &self.alphabet
    }

    /// The access sequences `S`, in insertion order.
    pub fn prefixes(&self) -> impl Iterator<Item = &Word> + '_ {
        self.prefixes.iter()
    }

    /// The frontier `SA`, in insertion order.
    pub fn frontier(&self) -> impl Iterator<Item = &Word> + '_ {
        self.frontier.iter()
    }

    /// The experiments `E`, in insertion order (the canonical column order).
    pub fn suffixes(&self) -> impl Iterator<Item = &Word> + '_ {
        self.suffixes.iter()
    }

    /// The row of `word`, one cell per column, if the word is in the table.
    pub fn row(&self, word: &Word) -> Option<&[Word]> {
        self.cells.get(word).map(Vec::as_slice)
    }

    /// Makes `T` total: every word in `S ∪ SA` gets a full row of cells.
    ///
    /// Rows are recomputed from scratch; thanks to the knowledge base's
    /// cache this costs one target query per genuinely new `u·e`.
    fn fill<T: Teacher>(&mut self, knowledge: &mut KnowledgeBase<T>) -> Result<(), LearningError> {
        let words: Vec<Word> = self
            .prefixes
            .iter()
            .chain(self.frontier.iter())
            .cloned()
            .collect();
        for word in words {
            let mut row = Vec::with_capacity(self.suffixes.len());
            for suffix in &self.suffixes {
                let answer = knowledge.resolve(&word.concat(suffix))?;
                row.push(answer.suffix(suffix.len()));
            }
            self.cells.insert(word, row);
        }
        Ok(())
    }

    /// Looks for a frontier word whose row matches no row of `S`.
    /// Returns `None` iff the table is closed.
    pub fn find_unclosed(&self) -> Option<Word> {
        self.frontier
            .iter()
            .find(|t| {
                let row = self.row(t);
                !self.prefixes.iter().any(|s| self.row(s) == row)
            })
            .cloned()
    }

    /// Moves the closure defect `witness` from the frontier into `S` and
    /// extends the frontier by its one-letter continuations.
    pub fn close<T: Teacher>(
        &mut self,
        witness: &Word,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearningError> {
        if !self.frontier.shift_remove(witness) {
            return Err(LearningError::InvariantViolation(format!(
                "close called with \"{witness}\", which is not a frontier word"
            )));
        }
        self.prefixes.insert(witness.clone());
        for letter in self.alphabet.iter() {
            let extension = witness.append(letter.clone());
            if !self.prefixes.contains(&extension) {
                self.frontier.insert(extension);
            }
        }
        self.fill(knowledge)
    }

    /// Looks for two `S`-words with equal rows whose one-letter extensions
    /// disagree. Returns `None` iff the table is consistent.
    pub fn find_inconsistency(&self) -> Option<Inconsistency> {
        for (first, second) in self.prefixes.iter().tuple_combinations() {
            if self.row(first) != self.row(second) {
                continue;
            }
            for letter in self.alphabet.iter() {
                let row_first = self.row(&first.append(letter.clone()))?;
                let row_second = self.row(&second.append(letter.clone()))?;
                if let Some(column) = (0..row_first.len()).find(|&c| row_first[c] != row_second[c])
                {
                    return Some(Inconsistency {
                        first: first.clone(),
                        second: second.clone(),
                        letter: letter.clone(),
                        suffix: self.suffixes.get_index(column)?.clone(),
                    });
                }
            }
        }
        None
    }

    /// Repairs the consistency defect `(letter, suffix)` by adding the
    /// experiment `letter · suffix` and filling the new column.
    pub fn make_consistent<T: Teacher>(
        &mut self,
        letter: &Letter,
        suffix: &Word,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearningError> {
        let experiment = Word::letter(letter.clone()).concat(suffix);
        if !self.suffixes.insert(experiment.clone()) {
            // a genuine witness always names a fresh experiment: if
            // letter·suffix were a column already, the two rows could not
            // have been equal in the first place
            return Err(LearningError::InvariantViolation(format!(
                "experiment \"{experiment}\" is already a column of the table"
            )));
        }
        trace!("extending experiments with {experiment}");
        self.fill(knowledge)
    }

    /// Integrates a counter-example in Angluin's formulation: every prefix
    /// of `word` becomes an access sequence (frontier words are promoted),
    /// the frontier is rebuilt to match its definition and the new cells
    /// are filled.
    pub fn integrate_counterexample<T: Teacher>(
        &mut self,
        word: &Word,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearningError> {
        if word.is_empty() {
            return Err(LearningError::OracleMisbehavior(
                "the empty word cannot be a counter-example".to_string(),
            ));
        }
        if let Some(foreign) = word.letters().iter().find(|l| !self.alphabet.contains(l)) {
            return Err(LearningError::OracleMisbehavior(format!(
                "counter-example \"{word}\" contains the letter \"{foreign}\", \
                 which is not in the input alphabet"
            )));
        }

        for prefix in word.prefixes() {
            if self.prefixes.contains(&prefix) {
                continue;
            }
            self.frontier.shift_remove(&prefix);
            self.prefixes.insert(prefix);
        }
        let accessors: Vec<Word> = self.prefixes.iter().cloned().collect();
        for accessor in accessors {
            for letter in self.alphabet.iter() {
                let extension = accessor.append(letter.clone());
                if !self.prefixes.contains(&extension) {
                    self.frontier.insert(extension);
                }
            }
        }
        self.fill(knowledge)
    }

    /// Builds the hypothesis machine of a closed and consistent table.
    ///
    /// One state per distinct row of `S`; the canonical representative of a
    /// class is its shortest access sequence (insertion order breaking
    /// ties), which also names the state. The class of ε becomes the
    /// initial state, transitions and outputs are read off the table.
    pub fn build_hypothesis(&self) -> Result<MealyMachine, LearningError> {
        if let Some(witness) = self.find_unclosed() {
            return Err(LearningError::InvariantViolation(format!(
                "hypothesis requested from an unclosed table (frontier word \"{witness}\")"
            )));
        }
        if let Some(defect) = self.find_inconsistency() {
            return Err(LearningError::InvariantViolation(format!(
                "hypothesis requested from an inconsistent table ({} and {} disagree after {})",
                defect.first, defect.second, defect.letter
            )));
        }

        let mut representatives: OrderedMap<&[Word], Word> = OrderedMap::default();
        for accessor in self.prefixes.iter().sorted_by_key(|w| w.len()) {
            let row = self.row(accessor).ok_or_else(|| {
                LearningError::InvariantViolation(format!("no row for access sequence {accessor}"))
            })?;
            representatives.entry(row).or_insert_with(|| accessor.clone());
        }

        let mut machine = MealyMachine::new(self.alphabet.clone());
        let class_ids: OrderedMap<&[Word], StateId> = representatives
            .iter()
            .map(|(row, representative)| (*row, machine.add_state(representative.to_string())))
            .collect();

        for (row, representative) in &representatives {
            let source = class_ids[row];
            for letter in self.alphabet.iter() {
                let successor = representative.append(letter.clone());
                let successor_row = self.row(&successor).ok_or_else(|| {
                    LearningError::InvariantViolation(format!(
                        "no row for one-letter extension {successor}"
                    ))
                })?;
                let target = *class_ids.get(successor_row).ok_or_else(|| {
                    LearningError::InvariantViolation(format!(
                        "row of {successor} matches no access sequence although the \
                         table is closed"
                    ))
                })?;
                let column = self
                    .suffixes
                    .get_index_of(&Word::letter(letter.clone()))
                    .ok_or_else(|| {
                        LearningError::InvariantViolation(format!(
                            "single-letter experiment {letter} missing from the table"
                        ))
                    })?;
                let output = row[column].last().cloned().ok_or_else(|| {
                    LearningError::InvariantViolation(format!(
                        "empty cell for ({representative}, {letter})"
                    ))
                })?;
                machine
                    .add_transition(source, letter.clone(), output, target)
                    .map_err(LearningError::from)?;
            }
        }
        Ok(machine)
    }
}

impl fmt::Display for ObservationTable {
    /// Renders the table with the access sequences first and the frontier
    /// rows marked by a trailing `·Σ`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        let mut header = vec![String::new()];
        header.extend(self.suffixes.iter().map(ToString::to_string));
        builder.push_record(header);
        for (words, marker) in [(&self.prefixes, ""), (&self.frontier, " ·Σ")] {
            for word in words.iter() {
                let mut record = vec![format!("{word}{marker}")];
                match self.row(word) {
                    Some(row) => record.extend(row.iter().map(ToString::to_string)),
                    None => record.extend(self.suffixes.iter().map(|_| "?".to_string())),
                }
                builder.push_record(record);
            }
        }
        write!(f, "{}", builder.build().with(Style::sharp()))
    }
}
