//! Anti-entropy relay buffer.
//!
//! Accumulates newly observed values between flush ticks, tagged with the
//! origin they were learned from, using a lock-free queue so handler
//! threads never contend in the hot path.

use crossbeam_queue::SegQueue;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Where a value was first learned from.
///
/// The tag exists for echo suppression: when fanning out, a destination
/// must never receive back values it itself just delivered. It is not a
/// per-value provenance ledger; a value can still reach a node that
/// already has it through some other path, which is a correctness-preserving
/// inefficiency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin<I> {
    /// Submitted directly by a client of this node.
    Local,
    /// Learned via gossip from the given peer.
    Peer(I),
}

impl<I: PartialEq> Origin<I> {
    /// Whether this origin is the given peer.
    pub fn is_peer(&self, id: &I) -> bool {
        matches!(self, Origin::Peer(peer) if peer == id)
    }
}

/// Pending entry awaiting the next flush.
#[derive(Debug, Clone)]
struct PendingRelay<I, V> {
    origin: Origin<I>,
    value: V,
}

/// Lock-free buffer of values pending relay, keyed by origin at drain time.
///
/// Pushed by any handler thread, drained wholesale by the flush scheduler.
/// A value belongs here only if it was newly inserted into the value store
/// as a side effect of a message from the tagged origin.
#[derive(Debug)]
pub struct RelayBuffer<I, V> {
    queue: SegQueue<PendingRelay<I, V>>,
    /// Approximate length (may be slightly stale).
    len: AtomicUsize,
    /// Maximum queue size before dropping.
    max_size: usize,
    /// Flag indicating if the buffer is accepting new entries.
    accepting: AtomicBool,
}

impl<I, V> RelayBuffer<I, V>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    /// Create a buffer with the specified maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: SegQueue::new(),
            len: AtomicUsize::new(0),
            max_size,
            accepting: AtomicBool::new(true),
        }
    }

    /// Queue a newly observed value under its origin.
    ///
    /// Returns `true` if the entry was queued, `false` if the buffer is
    /// full or no longer accepting.
    pub fn push(&self, origin: Origin<I>, value: V) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }

        let current_len = self.len.load(Ordering::Relaxed);
        if current_len >= self.max_size {
            tracing::warn!(len = current_len, "relay buffer full, dropping value");
            #[cfg(feature = "metrics")]
            crate::metrics::record_relay_drop();
            return false;
        }

        self.queue.push(PendingRelay { origin, value });
        self.len.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove and return everything currently queued, grouped by origin.
    ///
    /// Entries pushed concurrently with the drain land either in this
    /// result or in the next one; nothing is lost. Per-origin value order
    /// follows push order.
    pub fn drain(&self) -> HashMap<Origin<I>, Vec<V>> {
        let mut drained: HashMap<Origin<I>, Vec<V>> = HashMap::new();

        while let Some(entry) = self.queue.pop() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            drained.entry(entry.origin).or_default().push(entry.value);
        }

        drained
    }

    /// Approximate number of pending entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting new entries.
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Resume accepting new entries.
    pub fn resume(&self) {
        self.accepting.store(true, Ordering::Release);
    }

    /// Discard all pending entries.
    pub fn clear(&self) {
        while self.queue.pop().is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl<I, V> Default for RelayBuffer<I, V>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain_groups_by_origin() {
        let buffer: RelayBuffer<String, i64> = RelayBuffer::new(100);

        buffer.push(Origin::Local, 1);
        buffer.push(Origin::Peer("n1".into()), 2);
        buffer.push(Origin::Peer("n1".into()), 3);

        let drained = buffer.drain();
        assert_eq!(drained[&Origin::Local], vec![1]);
        assert_eq!(drained[&Origin::Peer("n1".into())], vec![2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_clears_the_buffer() {
        let buffer: RelayBuffer<String, i64> = RelayBuffer::new(100);

        buffer.push(Origin::Local, 1);
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_capacity() {
        let buffer: RelayBuffer<String, i64> = RelayBuffer::new(2);

        assert!(buffer.push(Origin::Local, 1));
        assert!(buffer.push(Origin::Local, 2));
        assert!(!buffer.push(Origin::Local, 3));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_stop_and_resume() {
        let buffer: RelayBuffer<String, i64> = RelayBuffer::new(100);

        assert!(buffer.push(Origin::Local, 1));
        buffer.stop();
        assert!(!buffer.push(Origin::Local, 2));
        buffer.resume();
        assert!(buffer.push(Origin::Local, 3));
    }

    #[test]
    fn test_per_origin_order_follows_push_order() {
        let buffer: RelayBuffer<String, i64> = RelayBuffer::new(100);

        for i in 0..10 {
            buffer.push(Origin::Peer("n1".into()), i);
        }

        let drained = buffer.drain();
        assert_eq!(
            drained[&Origin::Peer("n1".into())],
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_origin_is_peer() {
        let local: Origin<String> = Origin::Local;
        let peer = Origin::Peer("n1".to_string());

        assert!(!local.is_peer(&"n1".to_string()));
        assert!(peer.is_peer(&"n1".to_string()));
        assert!(!peer.is_peer(&"n2".to_string()));
    }
}
