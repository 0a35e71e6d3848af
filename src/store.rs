//! Deduplicated value store.
//!
//! The store is the node's permanent memory: every distinct value it has
//! ever observed, from clients or from peers. It only ever grows.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Thread-safe, monotonically growing set of observed values.
///
/// Handlers run concurrently (one per inbound message), so the store must
/// tolerate arbitrary interleavings of `observe` and `snapshot`. The
/// check-and-insert in [`observe`](ValueStore::observe) is atomic: exactly
/// one caller wins for each distinct value.
#[derive(Debug)]
pub struct ValueStore<V> {
    values: RwLock<HashSet<V>>,
}

impl<V> ValueStore<V>
where
    V: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashSet::new()),
        }
    }

    /// Record a value, returning `true` if it was not previously present.
    ///
    /// Duplicates are absorbed silently; a `false` return is not an error.
    pub fn observe(&self, value: V) -> bool {
        let mut values = self.values.write();
        values.insert(value)
    }

    /// Record a batch of values, returning only the newly observed ones
    /// in input order.
    ///
    /// Holds the write lock once for the whole batch, so concurrent
    /// observers of the same values cannot both see them as new.
    pub fn observe_all(&self, batch: impl IntoIterator<Item = V>) -> Vec<V> {
        let mut values = self.values.write();
        batch
            .into_iter()
            .filter(|value| values.insert(value.clone()))
            .collect()
    }

    /// Point-in-time copy of every observed value, in no particular order.
    ///
    /// Safe to call while other threads insert; the copy reflects some
    /// consistent prefix of the insert history.
    pub fn snapshot(&self) -> Vec<V> {
        self.values.read().iter().cloned().collect()
    }

    /// Check membership without inserting.
    pub fn contains(&self, value: &V) -> bool {
        self.values.read().contains(value)
    }

    /// Number of distinct values observed so far.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Check whether nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl<V> Default for ValueStore<V>
where
    V: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
