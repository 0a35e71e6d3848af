//! Transport abstraction for batch delivery.
//!
//! The engine never talks to the network directly; it hands a batch and a
//! per-attempt deadline to a [`Transport`] and interprets the result as
//! acknowledged / not acknowledged. Queueing, framing, and RPC semantics
//! behind the send primitive are opaque to this crate.
//!
//! # Available Transports
//!
//! - [`ChannelTransport`]: channel-based transport for testing
//! - [`NoopTransport`]: no-op transport that discards batches

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Transport trait for delivering value batches to specific peers.
///
/// Implementations must provide unicast delivery: a batch handed to
/// `send_batch` goes to the named target only. `Ok(())` means the target
/// acknowledged within the deadline; any error (including a timeout) is
/// treated as a failed attempt and retried by the dispatcher.
#[auto_impl::auto_impl(Box, Arc)]
pub trait Transport<I, V>: Send + Sync + 'static
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    /// Error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deliver a batch of values to a specific peer, waiting at most
    /// `deadline` for the acknowledgment.
    fn send_batch(
        &self,
        target: &I,
        values: Vec<V>,
        deadline: Duration,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A simple channel-based transport that outputs (target, batch) pairs.
///
/// Every send is acknowledged immediately. Useful for testing or when
/// delivery is handled externally.
#[derive(Debug, Clone)]
pub struct ChannelTransport<I, V> {
    tx: async_channel::Sender<(I, Vec<V>)>,
}

impl<I, V> ChannelTransport<I, V> {
    /// Create a new channel transport.
    pub fn new(tx: async_channel::Sender<(I, Vec<V>)>) -> Self {
        Self { tx }
    }

    /// Create a channel transport with a new bounded channel.
    ///
    /// Returns the transport and the receiver for (target, batch) pairs.
    pub fn bounded(capacity: usize) -> (Self, async_channel::Receiver<(I, Vec<V>)>) {
        let (tx, rx) = async_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

/// Error type for channel transport.
#[derive(Debug, Clone)]
pub struct ChannelTransportError(pub String);

impl std::fmt::Display for ChannelTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel transport error: {}", self.0)
    }
}

impl std::error::Error for ChannelTransportError {}

impl<I, V> Transport<I, V> for ChannelTransport<I, V>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    type Error = ChannelTransportError;

    async fn send_batch(
        &self,
        target: &I,
        values: Vec<V>,
        _deadline: Duration,
    ) -> Result<(), Self::Error> {
        self.tx
            .send((target.clone(), values))
            .await
            .map_err(|e| ChannelTransportError(e.to_string()))
    }
}

/// A no-op transport that acknowledges and discards all batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

impl<I, V> Transport<I, V> for NoopTransport
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    type Error = std::convert::Infallible;

    async fn send_batch(
        &self,
        _target: &I,
        _values: Vec<V>,
        _deadline: Duration,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_transport() {
        let (transport, rx) = ChannelTransport::<String, i64>::bounded(16);

        transport
            .send_batch(&"n1".to_string(), vec![1, 2, 3], Duration::from_millis(250))
            .await
            .unwrap();

        let (target, values) = rx.recv().await.unwrap();
        assert_eq!(target, "n1");
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_noop_transport() {
        let transport = NoopTransport;
        Transport::<String, i64>::send_batch(
            &transport,
            &"n1".to_string(),
            vec![1],
            Duration::from_millis(250),
        )
        .await
        .unwrap();
    }
}
