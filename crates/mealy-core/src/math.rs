//! Thin aliases over [`indexmap`] collections. Iteration order is insertion
//! order, which the learner relies on: the columns of the observation table
//! and the symbols of an alphabet must enumerate the same way every time.

/// A set that iterates in insertion order.
pub type OrderedSet<T> = indexmap::IndexSet<T>;

/// A map that iterates in insertion order of its keys.
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V>;
