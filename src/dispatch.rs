//! Retrying unicast batch dispatcher.
//!
//! Owns one delivery lane per destination and guarantees eventual delivery
//! despite transient send failures: a batch is retried with an
//! exponentially growing per-attempt deadline until the destination
//! acknowledges. There is no retry budget and no circuit breaker; only
//! shutdown cancels an outstanding delivery.
//!
//! At most one delivery is in flight per destination at a time. Batches
//! submitted while a delivery is active are coalesced into the lane and
//! ride along with the next attempt (or the next delivery), so a slow or
//! dead neighbor accumulates one growing batch instead of an unbounded
//! pile of concurrent retry tasks.

use async_channel::{Receiver, Sender};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GossipConfig;
use crate::error::Result;
use crate::transport::Transport;

#[cfg(feature = "metrics")]
use crate::metrics;

/// Per-destination delivery lane.
#[derive(Debug)]
struct Lane<V> {
    /// Values waiting to ride along with the next attempt.
    pending: Mutex<Vec<V>>,
    /// Whether a delivery for this destination is currently in flight.
    active: AtomicBool,
}

impl<V> Default for Lane<V> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
        }
    }
}

/// Retrying unicast sender with one lane per destination.
///
/// The flush scheduler submits `(destination, batch)` pairs; the dispatch
/// loop (spawned via [`run`](GossipDispatcher::run)) turns them into
/// delivery futures, at most one per destination, each retrying until
/// acknowledged. Cloning is cheap and shares the same lanes.
pub struct GossipDispatcher<I, V, T> {
    inner: Arc<DispatcherInner<I, V, T>>,
}

struct DispatcherInner<I, V, T> {
    /// Transport used for every delivery attempt.
    transport: Arc<T>,
    /// Lanes, created lazily per destination.
    lanes: Mutex<HashMap<I, Arc<Lane<V>>>>,
    /// Wake-ups for the dispatch loop, one per submission.
    wake_tx: Sender<I>,
    wake_rx: Receiver<I>,
    /// Shutdown notification channel - closing the sender wakes the loop.
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    /// First-attempt deadline.
    base_deadline: Duration,
    /// Cap for the doubled deadline.
    max_deadline: Duration,
    /// Number of deliveries currently in flight.
    in_flight: AtomicUsize,
}

impl<I, V, T> GossipDispatcher<I, V, T>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
    T: Transport<I, V>,
{
    /// Create a dispatcher over the given transport.
    pub fn new(transport: T, config: &GossipConfig) -> Self {
        let (wake_tx, wake_rx) = async_channel::bounded(config.dispatch_queue_capacity);
        let (shutdown_tx, shutdown_rx) = async_channel::bounded(1);

        Self {
            inner: Arc::new(DispatcherInner {
                transport: Arc::new(transport),
                lanes: Mutex::new(HashMap::new()),
                wake_tx,
                wake_rx,
                shutdown_tx,
                shutdown_rx,
                base_deadline: config.retry_base_deadline,
                max_deadline: config.retry_max_deadline,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a batch for delivery to `dest`.
    ///
    /// Never blocks on the delivery itself; an empty batch is a no-op.
    pub async fn submit(&self, dest: I, values: Vec<V>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let lane = self.lane(&dest);
        lane.pending.lock().extend(values);

        self.inner.wake_tx.send(dest).await?;
        Ok(())
    }

    /// Run the dispatch loop.
    ///
    /// Should be spawned as a background task; returns after
    /// [`shutdown`](GossipDispatcher::shutdown), cancelling every
    /// outstanding delivery.
    pub async fn run(&self) {
        let mut deliveries: FuturesUnordered<BoxFuture<'static, I>> = FuturesUnordered::new();

        loop {
            let wake_recv = self.inner.wake_rx.recv().fuse();
            let shutdown_recv = self.inner.shutdown_rx.recv().fuse();
            futures::pin_mut!(wake_recv, shutdown_recv);

            futures::select! {
                wake = wake_recv => {
                    match wake {
                        Ok(dest) => self.start_if_idle(&mut deliveries, dest),
                        Err(_) => break,
                    }
                }
                dest = deliveries.select_next_some() => {
                    let lane = self.lane(&dest);
                    lane.active.store(false, Ordering::Release);
                    // Values submitted while the final attempt was in the
                    // air start a fresh delivery.
                    if !lane.pending.lock().is_empty() {
                        self.start_if_idle(&mut deliveries, dest);
                    }
                }
                _ = shutdown_recv => break,
            }
        }
        // Dropping `deliveries` cancels all outstanding retry loops.
    }

    /// Start a delivery for `dest` unless one is already in flight.
    fn start_if_idle(&self, deliveries: &mut FuturesUnordered<BoxFuture<'static, I>>, dest: I) {
        let lane = self.lane(&dest);

        if lane.active.swap(true, Ordering::AcqRel) {
            // Already in flight; the submitted values ride along.
            return;
        }

        let batch: Vec<V> = std::mem::take(&mut *lane.pending.lock());
        if batch.is_empty() {
            lane.active.store(false, Ordering::Release);
            return;
        }

        self.inner.in_flight.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::set_in_flight_deliveries(self.inner.in_flight.load(Ordering::Relaxed));

        deliveries.push(deliver(self.inner.clone(), dest, lane, batch).boxed());
    }

    /// Number of deliveries currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Relaxed)
    }

    /// Request shutdown.
    ///
    /// Wakes the dispatch loop, which exits and drops (cancels) every
    /// outstanding delivery.
    pub fn shutdown(&self) {
        self.inner.shutdown_tx.close();
        self.inner.wake_tx.close();
    }
}

impl<I, V, T> Clone for GossipDispatcher<I, V, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I, V, T> GossipDispatcher<I, V, T>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    fn lane(&self, dest: &I) -> Arc<Lane<V>> {
        let mut lanes = self.inner.lanes.lock();
        lanes.entry(dest.clone()).or_default().clone()
    }
}

/// Deliver one batch to one destination, retrying until acknowledged.
///
/// The per-attempt deadline starts at the configured base and doubles
/// after every failure, saturating at the configured cap. Before each
/// attempt, values coalesced into the lane since the previous attempt are
/// folded into the batch.
async fn deliver<I, V, T>(
    inner: Arc<DispatcherInner<I, V, T>>,
    dest: I,
    lane: Arc<Lane<V>>,
    mut batch: Vec<V>,
) -> I
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
    T: Transport<I, V>,
{
    let mut deadline = inner.base_deadline;
    let mut attempt = 0u32;

    loop {
        {
            let mut pending = lane.pending.lock();
            if !pending.is_empty() {
                batch.extend(pending.drain(..));
            }
        }

        match inner.transport.send_batch(&dest, batch.clone(), deadline).await {
            Ok(()) => {
                if attempt > 0 {
                    tracing::debug!(?dest, attempt, "batch acknowledged after retries");
                }
                #[cfg(feature = "metrics")]
                metrics::record_batch_delivered(batch.len());
                break;
            }
            Err(err) => {
                tracing::warn!(?dest, attempt, ?deadline, %err, "batch delivery failed, retrying");
                #[cfg(feature = "metrics")]
                metrics::record_delivery_retry();

                attempt = attempt.saturating_add(1);
                deadline = deadline.saturating_mul(2).min(inner.max_deadline);
            }
        }
    }

    inner.in_flight.fetch_sub(1, Ordering::Relaxed);
    #[cfg(feature = "metrics")]
    metrics::set_in_flight_deliveries(inner.in_flight.load(Ordering::Relaxed));

    dest
}
