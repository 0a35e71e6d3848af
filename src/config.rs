//! Configuration for the gossip engine.

use std::time::Duration;

/// Configuration options for the gossip engine.
///
/// These parameters control the latency / network-load trade-off of the
/// batch-and-flush dissemination cycle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GossipConfig {
    /// Interval between flush ticks.
    ///
    /// Each tick drains the relay buffer and fans batches out to
    /// neighbors. Shorter intervals reduce dissemination latency but
    /// increase packet count.
    ///
    /// Default: 100ms
    #[serde(with = "humantime_serde_impl")]
    pub flush_interval: Duration,

    /// Per-attempt deadline for the first delivery attempt to a neighbor.
    ///
    /// The deadline doubles after every failed attempt.
    ///
    /// Default: 250ms
    #[serde(with = "humantime_serde_impl")]
    pub retry_base_deadline: Duration,

    /// Upper bound on the per-attempt deadline.
    ///
    /// Caps the exponential growth so a long outage does not produce
    /// pathological deadlines. Retries themselves are unbounded: delivery
    /// is abandoned only on shutdown, never on a retry budget.
    ///
    /// Default: 8s
    #[serde(with = "humantime_serde_impl")]
    pub retry_max_deadline: Duration,

    /// Maximum number of values the relay buffer holds between flushes.
    ///
    /// Default: 10000
    pub relay_buffer_size: usize,

    /// Capacity of the dispatcher wake channel.
    ///
    /// Default: 1024
    pub dispatch_queue_capacity: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(100),
            retry_base_deadline: Duration::from_millis(250),
            retry_max_deadline: Duration::from_secs(8),
            relay_buffer_size: 10000,
            dispatch_queue_capacity: 1024,
        }
    }
}

impl GossipConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration optimized for LAN environments.
    ///
    /// - Faster flush cycle
    /// - Tighter retry deadlines
    pub fn lan() -> Self {
        Self {
            flush_interval: Duration::from_millis(50),
            retry_base_deadline: Duration::from_millis(100),
            retry_max_deadline: Duration::from_secs(2),
            relay_buffer_size: 10000,
            dispatch_queue_capacity: 1024,
        }
    }

    /// Configuration optimized for WAN environments.
    ///
    /// - Larger batches per flush
    /// - More patient retry deadlines
    pub fn wan() -> Self {
        Self {
            flush_interval: Duration::from_millis(250),
            retry_base_deadline: Duration::from_millis(500),
            retry_max_deadline: Duration::from_secs(16),
            relay_buffer_size: 20000,
            dispatch_queue_capacity: 1024,
        }
    }

    /// Set the flush interval (builder pattern).
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the base per-attempt deadline (builder pattern).
    pub const fn with_retry_base_deadline(mut self, deadline: Duration) -> Self {
        self.retry_base_deadline = deadline;
        self
    }

    /// Set the maximum per-attempt deadline (builder pattern).
    pub const fn with_retry_max_deadline(mut self, deadline: Duration) -> Self {
        self.retry_max_deadline = deadline;
        self
    }

    /// Set the relay buffer capacity (builder pattern).
    pub const fn with_relay_buffer_size(mut self, size: usize) -> Self {
        self.relay_buffer_size = size;
        self
    }

    /// Set the dispatcher wake channel capacity (builder pattern).
    pub const fn with_dispatch_queue_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_queue_capacity = capacity;
        self
    }
}

mod humantime_serde_impl {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_u64(duration.as_millis() as u64)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            // Simple parsing: expect "Nms" format
            let ms: u64 = s
                .trim_end_matches("ms")
                .parse()
                .map_err(serde::de::Error::custom)?;
            Ok(Duration::from_millis(ms))
        } else {
            let ms = u64::deserialize(deserializer)?;
            Ok(Duration::from_millis(ms))
        }
    }
}
