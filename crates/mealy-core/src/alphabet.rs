use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::{Letter, math::OrderedSet};

/// Errors that can occur when assembling an [`InputAlphabet`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AlphabetError {
    #[error("an input alphabet must contain at least one letter")]
    Empty,
    #[error("the empty letter cannot be part of an alphabet")]
    EmptyLetter,
    #[error("duplicate letter \"{0}\" in alphabet")]
    Duplicate(Letter),
}

/// A finite set of input letters with a stable enumeration order.
///
/// The order in which letters were passed to [`InputAlphabet::new`] is the
/// canonical symbol order: transition lists, observation table columns and
/// generated test words all follow it, which keeps learning runs
/// deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputAlphabet {
    letters: OrderedSet<Letter>,
}

impl InputAlphabet {
    /// Assembles an alphabet from the given letters.
    ///
    /// Rejects empty alphabets, the empty letter and duplicates; a duplicate
    /// would silently skew the canonical order, so it is reported instead.
    pub fn new(letters: impl IntoIterator<Item = impl Into<Letter>>) -> Result<Self, AlphabetError> {
        let mut set = OrderedSet::default();
        for letter in letters {
            let letter = letter.into();
            if letter.is_empty() {
                return Err(AlphabetError::EmptyLetter);
            }
            if !set.insert(letter.clone()) {
                return Err(AlphabetError::Duplicate(letter));
            }
        }
        if set.is_empty() {
            return Err(AlphabetError::Empty);
        }
        Ok(InputAlphabet { letters: set })
    }

    /// The number of letters in the alphabet.
    pub fn size(&self) -> usize {
        self.letters.len()
    }

    /// Iterates over the letters in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Letter> + '_ {
        self.letters.iter()
    }

    /// Whether the given letter is part of the alphabet.
    pub fn contains(&self, letter: &Letter) -> bool {
        self.letters.contains(letter)
    }

    /// The canonical position of `letter`, if it is part of the alphabet.
    pub fn position(&self, letter: &Letter) -> Option<usize> {
        self.letters.get_index_of(letter)
    }

    /// The letter at canonical position `index`.
    pub fn nth(&self, index: usize) -> Option<&Letter> {
        self.letters.get_index(index)
    }
}

impl fmt::Display for InputAlphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.letters.iter().join(", "))
    }
}
