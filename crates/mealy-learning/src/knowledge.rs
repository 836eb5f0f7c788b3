use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mealy_core::Word;
use mealy_core::math::OrderedMap;
use tracing::trace;

use crate::error::{LearningError, TeacherError};
use crate::teacher::Teacher;

/// A cooperatively checked cancellation flag.
///
/// Cloning yields a handle to the same flag, so one side can hold it while
/// the learner observes it. The learner checks it at the top of every outer
/// iteration and the knowledge base before every membership query.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the session observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters over the membership queries of one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Queries that actually reached the target.
    pub submitted: usize,
    /// Queries answered from the memoization cache.
    pub cached: usize,
}

impl QueryStats {
    /// Total number of resolutions requested by the learner.
    pub fn total(&self) -> usize {
        self.submitted + self.cached
    }
}

/// The membership oracle of a learning session.
///
/// Owns the [`Teacher`] and memoizes every `(input word, output word)` pair
/// it observes, so the same word is never sent to the target twice. Because
/// a deterministic target must answer consistently, every fresh response is
/// cross-checked against all cached responses for prefixes of the queried
/// word; a disagreement means the target (or its transport) is
/// nondeterministic and the session aborts.
///
/// The cache outlives a failed session: a caller can keep the knowledge
/// base and retry with a larger state bound without re-asking anything.
#[derive(Debug)]
pub struct KnowledgeBase<T: Teacher> {
    teacher: T,
    cache: OrderedMap<Word, Word>,
    stats: QueryStats,
    cancel: CancelToken,
}

impl<T: Teacher> KnowledgeBase<T> {
    /// Creates a knowledge base with its own (never-cancelled) token.
    pub fn new(teacher: T) -> Self {
        Self::with_cancellation(teacher, CancelToken::new())
    }

    /// Creates a knowledge base observing the given cancellation token.
    pub fn with_cancellation(teacher: T, cancel: CancelToken) -> Self {
        KnowledgeBase {
            teacher,
            cache: OrderedMap::default(),
            stats: QueryStats::default(),
            cancel,
        }
    }

    /// Delegates to the teacher's `start` hook.
    pub fn start(&mut self) -> Result<(), TeacherError> {
        self.teacher.start()
    }

    /// Delegates to the teacher's `stop` hook.
    pub fn stop(&mut self) -> Result<(), TeacherError> {
        self.teacher.stop()
    }

    /// Query counters for this session.
    pub fn stats(&self) -> QueryStats {
        self.stats
    }

    /// Answers the membership query for `word`.
    ///
    /// The empty word resolves to the empty word without touching the
    /// target. Any transport failure, length-contract violation or
    /// cache contradiction is fatal.
    pub fn resolve(&mut self, word: &Word) -> Result<Word, LearningError> {
        if self.cancel.is_cancelled() {
            return Err(LearningError::Cancelled);
        }
        if word.is_empty() {
            return Ok(Word::epsilon());
        }
        if let Some(hit) = self.cache.get(word) {
            self.stats.cached += 1;
            return Ok(hit.clone());
        }

        let output = self.teacher.submit(word)?;
        self.stats.submitted += 1;
        trace!("membership query {word} answered with {output}");

        if output.len() != word.len() {
            return Err(LearningError::OracleMisbehavior(format!(
                "target answered {} letters to the {}-letter query \"{word}\"",
                output.len(),
                word.len(),
            )));
        }
        for length in 1..word.len() {
            let prefix = word.prefix(length);
            if let Some(prior) = self.cache.get(&prefix) {
                if *prior != output.prefix(length) {
                    return Err(LearningError::OracleMisbehavior(format!(
                        "target answered \"{output}\" to \"{word}\" but previously \
                         answered \"{prior}\" to its prefix \"{prefix}\"",
                    )));
                }
            }
        }

        self.cache.insert(word.clone(), output.clone());
        Ok(output)
    }
}
