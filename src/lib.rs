//! # star-gossip
//!
//! Single-value gossip dissemination engine with star-topology fan-out,
//! anti-entropy batching, and unbounded-retry delivery.
//!
//! Each node accepts broadcast values from clients and peers, deduplicates
//! them into a grow-only store, buffers newly observed values, and
//! periodically relays them to its neighbors in echo-suppressed batches.
//! Deliveries retry forever with a per-attempt deadline that doubles after
//! every failure, so a value accepted anywhere eventually reaches every
//! node despite arbitrary transient partitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Harness                                 │
//! │            (decode requests, encode replies, RPC)                │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ handle_request()
//! ┌────────────────────────────▼────────────────────────────────────┐
//! │                       GossipEngine                               │
//! │     (request handlers + periodic flush scheduler)                │
//! ├──────────────┬──────────────────────────┬───────────────────────┤
//! │  ValueStore  │     TopologyManager      │      RelayBuffer      │
//! │   (dedup)    │  (star / supplied map)   │  (origin-tagged)      │
//! └──────────────┴──────────────────────────┴───────────┬───────────┘
//!                                                       │ submit()
//! ┌─────────────────────────────────────────────────────▼───────────┐
//! │                     GossipDispatcher                             │
//! │   (one in-flight delivery per destination, coalescing,          │
//! │    exponential per-attempt deadline, retries forever)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        Transport                                 │
//! │              (bring your own - channel, RPC, ...)                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use star_gossip::{GossipConfig, GossipDispatcher, GossipEngine, Request};
//!
//! let members: Vec<String> = vec!["n0".into(), "n1".into(), "n2".into()];
//! let engine: GossipEngine<String, i64> =
//!     GossipEngine::new("n1".into(), members, GossipConfig::lan());
//!
//! let dispatcher = GossipDispatcher::new(my_transport, engine.config());
//!
//! // Background tasks: delivery loop and flush scheduler.
//! spawn({ let d = dispatcher.clone(); async move { d.run().await } });
//! spawn({
//!     let (e, d) = (engine.clone(), dispatcher.clone());
//!     async move { e.run_flush_scheduler(&d).await }
//! });
//!
//! // Per incoming message:
//! let reply = engine.handle_request(src, request)?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

mod buffer;
mod config;
mod dispatch;
mod engine;
mod error;
mod store;
mod topology;
mod transport;
mod wire;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

// Re-export buffer types
pub use buffer::{Origin, RelayBuffer};

// Re-export config types
pub use config::GossipConfig;

// Re-export dispatcher types
pub use dispatch::GossipDispatcher;

// Re-export engine types
pub use engine::GossipEngine;

// Re-export error types
pub use error::{Error, Result};

// Re-export store types
pub use store::ValueStore;

// Re-export topology types
pub use topology::{Assignment, ReassignPolicy, TopologyManager, TopologyStrategy};

// Re-export transport types
pub use transport::{ChannelTransport, ChannelTransportError, NoopTransport, Transport};

// Re-export wire types
pub use wire::{decode_request, encode_reply, Reply, Request};
