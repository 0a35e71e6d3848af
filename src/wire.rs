//! JSON wire message types.
//!
//! Reproduces the protocol bodies exchanged with clients and peers. Only
//! `type` and the fields below belong to this core; framing, message ids,
//! and reply routing are owned by the transport harness.
//!
//! | type           | direction | fields                              |
//! |----------------|-----------|-------------------------------------|
//! | `broadcast`    | in        | `message: V` or `messages: [V]`     |
//! | `broadcast_ok` | out       | (none)                              |
//! | `read`         | in        | (none)                              |
//! | `read_ok`      | out       | `messages: [V]`                     |
//! | `topology`     | in        | `topology: {node: [node]}`          |
//! | `topology_ok`  | out       | (none)                              |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Inbound protocol message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(bound(
    serialize = "I: Serialize, V: Serialize",
    deserialize = "I: Deserialize<'de> + Eq + Hash, V: Deserialize<'de>"
))]
pub enum Request<I: Eq + Hash, V> {
    /// One or more values to disseminate.
    ///
    /// Clients send a single `message`; peer fan-out carries `messages`.
    /// A body with neither field is malformed.
    Broadcast {
        /// Single value, the client form.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<V>,
        /// Batched values, the gossip form.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<V>>,
    },

    /// Request for every value this node has observed.
    Read,

    /// Cluster adjacency hint.
    ///
    /// The payload is ignored under the star strategy but still carried so
    /// the supplied-adjacency strategy can consume it.
    Topology {
        /// Adjacency list, node id to neighbor ids.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topology: Option<HashMap<I, Vec<I>>>,
    },
}

/// Outbound protocol message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply<V> {
    /// Acknowledgment of a `broadcast`.
    BroadcastOk,

    /// All observed values.
    ReadOk {
        /// Point-in-time snapshot of the value store.
        messages: Vec<V>,
    },

    /// Acknowledgment of a `topology` message.
    TopologyOk,
}

impl<I: Eq + Hash, V> Request<I, V> {
    /// Pull the values out of a `broadcast` body.
    ///
    /// Returns an error for a non-broadcast body or a broadcast carrying
    /// neither `message` nor `messages`.
    pub fn into_broadcast_values(self) -> Result<Vec<V>> {
        match self {
            Request::Broadcast {
                message: Some(value),
                messages,
            } => {
                let mut values = vec![value];
                values.extend(messages.into_iter().flatten());
                Ok(values)
            }
            Request::Broadcast {
                message: None,
                messages: Some(values),
            } => Ok(values),
            Request::Broadcast {
                message: None,
                messages: None,
            } => Err(Error::MalformedRequest(
                "broadcast carries neither `message` nor `messages`".to_string(),
            )),
            _ => Err(Error::MalformedRequest(
                "not a broadcast body".to_string(),
            )),
        }
    }
}

/// Decode an inbound message body from JSON.
pub fn decode_request<I, V>(body: &[u8]) -> Result<Request<I, V>>
where
    I: Eq + Hash + for<'de> Deserialize<'de>,
    V: for<'de> Deserialize<'de>,
{
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}

/// Encode an outbound message body to JSON.
pub fn encode_reply<V: Serialize>(reply: &Reply<V>) -> Result<Vec<u8>> {
    serde_json::to_vec(reply).map_err(|e| Error::Encode(e.to_string()))
}
