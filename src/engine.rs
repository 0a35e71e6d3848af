//! Core gossip engine.
//!
//! Ties the value store, topology manager, and relay buffer together
//! behind the protocol's request handlers, and runs the periodic flush
//! scheduler that fans pending values out to neighbors.
//!
//! Handlers are stateless per message and may run concurrently with each
//! other, the flush scheduler, and every outstanding delivery. The store
//! and the buffer each have their own exclusion discipline and are never
//! locked together: the buffer push happens only after the store mutation
//! has completed and its lock is released.

use async_channel::{Receiver, Sender};
use futures::future::FutureExt;
use futures_timer::Delay;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::buffer::{Origin, RelayBuffer};
use crate::config::GossipConfig;
use crate::dispatch::GossipDispatcher;
use crate::error::{Error, Result};
use crate::store::ValueStore;
use crate::topology::{Assignment, ReassignPolicy, TopologyManager, TopologyStrategy};
use crate::transport::Transport;
use crate::wire::{Reply, Request};

#[cfg(feature = "metrics")]
use crate::metrics;

/// Gossip dissemination engine for one node.
///
/// Created once at process start with the node's identity and the full
/// cluster membership (both supplied by the harness). Cloning is cheap
/// and shares the same state.
///
/// # Type Parameters
///
/// - `I`: node identifier type
/// - `V`: application value type (opaque, compared only for equality)
pub struct GossipEngine<I, V> {
    inner: Arc<EngineInner<I, V>>,
}

struct EngineInner<I, V> {
    /// Every distinct value this node has ever observed.
    store: ValueStore<V>,

    /// Neighbor derivation and membership.
    topology: TopologyManager<I>,

    /// Newly observed values pending the next flush, keyed by origin.
    buffer: RelayBuffer<I, V>,

    /// Configuration.
    config: GossipConfig,

    /// Shutdown flag.
    shutdown: AtomicBool,

    /// Shutdown notification channel - closing the sender wakes the
    /// flush scheduler.
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl<I, V> GossipEngine<I, V>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create an engine with the default star strategy (hub = first
    /// member) and first-write-wins reassignment.
    pub fn new(local_id: I, members: Vec<I>, config: GossipConfig) -> Self {
        let hub = members
            .first()
            .cloned()
            .unwrap_or_else(|| local_id.clone());
        Self::with_strategy(
            local_id,
            members,
            config,
            TopologyStrategy::Star { hub },
            ReassignPolicy::FirstWriteWins,
        )
    }

    /// Create an engine with an explicit topology strategy and policy.
    pub fn with_strategy(
        local_id: I,
        members: Vec<I>,
        config: GossipConfig,
        strategy: TopologyStrategy<I>,
        policy: ReassignPolicy,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = async_channel::bounded(1);

        Self {
            inner: Arc::new(EngineInner {
                store: ValueStore::new(),
                topology: TopologyManager::new(local_id, members, strategy, policy),
                buffer: RelayBuffer::new(config.relay_buffer_size),
                config,
                shutdown: AtomicBool::new(false),
                shutdown_tx,
                shutdown_rx,
            }),
        }
    }

    /// This node's identity.
    pub fn local_id(&self) -> &I {
        self.inner.topology.local_id()
    }

    /// The configuration.
    pub fn config(&self) -> &GossipConfig {
        &self.inner.config
    }

    /// The assigned neighbor set, or `None` before the first topology
    /// message.
    pub fn neighbors(&self) -> Option<Vec<I>> {
        self.inner.topology.neighbors()
    }

    /// Number of distinct values observed so far.
    pub fn value_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Approximate number of values awaiting the next flush.
    pub fn pending_relay_count(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Handle a typed protocol request, producing the reply body.
    ///
    /// The source is classified by membership: cluster members are gossip
    /// peers, everything else is a client. A malformed broadcast (neither
    /// `message` nor `messages`) aborts with an error and no reply is
    /// produced; the harness owns surfacing it.
    pub fn handle_request(&self, src: I, request: Request<I, V>) -> Result<Reply<V>> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }

        match request {
            Request::Broadcast {
                message: None,
                messages: None,
            } => Err(Error::MalformedRequest(
                "broadcast carries neither `message` nor `messages`".to_string(),
            )),
            Request::Broadcast { message, messages } => {
                let values: Vec<V> = message
                    .into_iter()
                    .chain(messages.into_iter().flatten())
                    .collect();
                let origin = if self.inner.topology.is_member(&src) {
                    Origin::Peer(src)
                } else {
                    Origin::Local
                };
                self.handle_broadcast(origin, values);
                Ok(Reply::BroadcastOk)
            }
            Request::Read => Ok(Reply::ReadOk {
                messages: self.read(),
            }),
            Request::Topology { topology } => {
                self.handle_topology(topology.as_ref());
                Ok(Reply::TopologyOk)
            }
        }
    }

    /// Observe a batch of values learned from `origin`.
    ///
    /// Newly observed values are queued for relay under the origin tag so
    /// the next flush never echoes them straight back. Returns the number
    /// of values that were new.
    pub fn handle_broadcast(&self, origin: Origin<I>, values: impl IntoIterator<Item = V>) -> usize {
        let fresh = self.inner.store.observe_all(values);

        #[cfg(feature = "metrics")]
        {
            metrics::record_values_observed(fresh.len());
            metrics::set_store_size(self.inner.store.len());
        }

        for value in &fresh {
            self.inner.buffer.push(origin.clone(), value.clone());
        }
        #[cfg(feature = "metrics")]
        metrics::set_relay_buffer_size(self.inner.buffer.len());

        fresh.len()
    }

    /// Point-in-time snapshot of every observed value.
    pub fn read(&self) -> Vec<V> {
        self.inner.store.snapshot()
    }

    /// Apply a topology message.
    ///
    /// Every call is acknowledged by the caller regardless of outcome;
    /// whether a repeat call re-derives neighbors is a policy decision.
    pub fn handle_topology(&self, supplied: Option<&HashMap<I, Vec<I>>>) -> Assignment {
        self.inner.topology.assign(supplied)
    }

    /// Run the periodic flush scheduler.
    ///
    /// Should be spawned as a background task; returns on shutdown. Each
    /// tick drains the relay buffer and fans echo-suppressed batches out
    /// to neighbors via the dispatcher, never waiting for deliveries.
    pub async fn run_flush_scheduler<T>(&self, dispatcher: &GossipDispatcher<I, V, T>)
    where
        T: Transport<I, V>,
    {
        let mut interval = Delay::new(self.inner.config.flush_interval);

        loop {
            let shutdown_recv = self.inner.shutdown_rx.recv().fuse();
            futures::pin_mut!(shutdown_recv);

            futures::select! {
                _ = (&mut interval).fuse() => {
                    interval.reset(self.inner.config.flush_interval);
                }
                _ = shutdown_recv => break,
            }

            if self.inner.shutdown.load(Ordering::Acquire) {
                break;
            }

            self.flush_once(dispatcher).await;
        }
    }

    /// One flush tick: drain the buffer and submit per-neighbor batches.
    ///
    /// A tick before the first topology message is a no-op that leaves the
    /// buffer accumulating; draining without neighbors would drop values
    /// on the floor.
    pub async fn flush_once<T>(&self, dispatcher: &GossipDispatcher<I, V, T>)
    where
        T: Transport<I, V>,
    {
        let Some(neighbors) = self.inner.topology.neighbors() else {
            return;
        };
        if neighbors.is_empty() || self.inner.buffer.is_empty() {
            return;
        }

        let drained = self.inner.buffer.drain();
        if drained.is_empty() {
            return;
        }

        #[cfg(feature = "metrics")]
        metrics::record_flush();

        for neighbor in &neighbors {
            let batch = batch_for(&drained, neighbor);
            if batch.is_empty() {
                continue;
            }

            tracing::debug!(?neighbor, len = batch.len(), "submitting relay batch");
            if dispatcher.submit(neighbor.clone(), batch).await.is_err() {
                tracing::warn!("dispatcher closed, abandoning flush tick");
                return;
            }
        }
    }

    /// Request shutdown.
    ///
    /// Stops the flush scheduler and the buffer; outstanding deliveries
    /// are cancelled by shutting down the dispatcher.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.shutdown_tx.close();
        self.inner.buffer.stop();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

impl<I, V> Clone for GossipEngine<I, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Assemble the batch for one destination from a drained buffer.
///
/// Echo suppression: values whose origin tag is the destination itself are
/// omitted. Suppression is by immediate origin only: a value may still be
/// sent to a node that already has it via another path, which costs a
/// duplicate delivery, never correctness.
fn batch_for<I, V>(drained: &HashMap<Origin<I>, Vec<V>>, dest: &I) -> Vec<V>
where
    I: Clone + Eq + Hash,
    V: Clone,
{
    let mut batch: SmallVec<[V; 8]> = SmallVec::new();
    for (origin, values) in drained {
        if origin.is_peer(dest) {
            continue;
        }
        batch.extend(values.iter().cloned());
    }
    batch.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use std::time::Duration;

    fn members() -> Vec<String> {
        vec!["n0".into(), "n1".into(), "n2".into()]
    }

    fn engine(local: &str) -> GossipEngine<String, i64> {
        GossipEngine::new(local.to_string(), members(), GossipConfig::default())
    }

    fn broadcast_one(value: i64) -> Request<String, i64> {
        Request::Broadcast {
            message: Some(value),
            messages: None,
        }
    }

    #[test]
    fn test_broadcast_then_read() {
        let engine = engine("n0");

        let reply = engine.handle_request("c1".into(), broadcast_one(5)).unwrap();
        assert_eq!(reply, Reply::BroadcastOk);

        let Reply::ReadOk { messages } = engine.handle_request("c1".into(), Request::Read).unwrap()
        else {
            panic!("expected read_ok");
        };
        assert_eq!(messages, vec![5]);
    }

    #[test]
    fn test_duplicate_broadcast_is_idempotent() {
        let engine = engine("n0");

        engine.handle_request("c1".into(), broadcast_one(5)).unwrap();
        engine.handle_request("c2".into(), broadcast_one(5)).unwrap();

        assert_eq!(engine.value_count(), 1);
        // Only the first observation queues a relay entry.
        assert_eq!(engine.pending_relay_count(), 1);
    }

    #[test]
    fn test_source_classification() {
        let engine = engine("n0");

        // Peer source: tagged with the peer id so it is never echoed back.
        engine.handle_request("n1".into(), broadcast_one(7)).unwrap();
        // Client source: tagged local, relayed everywhere.
        engine.handle_request("c9".into(), broadcast_one(8)).unwrap();

        engine.handle_topology(None);
        let drained = engine.inner.buffer.drain();
        assert_eq!(drained[&Origin::Peer("n1".into())], vec![7]);
        assert_eq!(drained[&Origin::Local], vec![8]);
    }

    #[test]
    fn test_malformed_broadcast_aborts_without_reply() {
        let engine = engine("n0");

        let result = engine.handle_request(
            "c1".into(),
            Request::Broadcast {
                message: None,
                messages: None,
            },
        );
        assert!(matches!(result, Err(Error::MalformedRequest(_))));
        assert_eq!(engine.value_count(), 0);
    }

    #[test]
    fn test_topology_twice_is_first_write_wins() {
        let engine = engine("n1");

        assert_eq!(engine.handle_topology(None), Assignment::Assigned);

        let mut supplied = HashMap::new();
        supplied.insert("n1".to_string(), vec!["n2".to_string()]);
        assert_eq!(
            engine.handle_topology(Some(&supplied)),
            Assignment::Retained
        );
        assert_eq!(engine.neighbors().unwrap(), vec!["n0".to_string()]);
    }

    #[test]
    fn test_batch_for_suppresses_echo() {
        let mut drained: HashMap<Origin<String>, Vec<i64>> = HashMap::new();
        drained.insert(Origin::Local, vec![1]);
        drained.insert(Origin::Peer("n1".into()), vec![2]);
        drained.insert(Origin::Peer("n2".into()), vec![3]);

        let mut batch = batch_for(&drained, &"n1".to_string());
        batch.sort_unstable();
        assert_eq!(batch, vec![1, 3]);

        let mut all = batch_for(&drained, &"n9".to_string());
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_flush_fans_out_to_all_neighbors() {
        let engine = engine("n0");
        engine.handle_topology(None);

        let (transport, outbound) = ChannelTransport::bounded(16);
        let dispatcher = GossipDispatcher::new(transport, engine.config());
        let runner = dispatcher.clone();
        let task = tokio::spawn(async move { runner.run().await });

        engine.handle_request("c1".into(), broadcast_one(5)).unwrap();
        engine.flush_once(&dispatcher).await;

        let mut targets = Vec::new();
        for _ in 0..2 {
            let (target, values) = outbound.recv().await.unwrap();
            assert_eq!(values, vec![5]);
            targets.push(target);
        }
        targets.sort();
        assert_eq!(targets, vec!["n1".to_string(), "n2".into()]);

        dispatcher.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_before_topology_keeps_buffer() {
        let engine = engine("n0");

        let dispatcher = GossipDispatcher::new(
            crate::transport::NoopTransport,
            engine.config(),
        );

        engine.handle_request("c1".into(), broadcast_one(5)).unwrap();
        engine.flush_once(&dispatcher).await;

        // Values survive until neighbors are known.
        assert_eq!(engine.pending_relay_count(), 1);
    }

    #[tokio::test]
    async fn test_no_self_echo_on_flush() {
        let engine = engine("n1");
        engine.handle_topology(None);
        assert_eq!(engine.neighbors().unwrap(), vec!["n0".to_string()]);

        let (transport, outbound) = ChannelTransport::bounded(16);
        let dispatcher = GossipDispatcher::new(transport, engine.config());
        let runner = dispatcher.clone();
        let task = tokio::spawn(async move { runner.run().await });

        // Learned from the hub itself: nothing to send back.
        engine.handle_request("n0".into(), broadcast_one(7)).unwrap();
        engine.flush_once(&dispatcher).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(outbound.is_empty());

        dispatcher.shutdown();
        task.await.unwrap();
    }

    #[test]
    fn test_requests_rejected_after_shutdown() {
        let engine = engine("n0");
        engine.shutdown();

        assert!(matches!(
            engine.handle_request("c1".into(), Request::Read),
            Err(Error::Shutdown)
        ));
    }
}
