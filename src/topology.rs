//! Neighbor topology assignment.
//!
//! The protocol deliberately ignores externally supplied adjacency by
//! default and enforces a star: one hub connected to every other node,
//! every other node connected only to the hub. The shape bounds fan-out
//! and keeps convergence reasoning simple. The supplied-adjacency variant
//! exists so alternate topologies can be substituted without touching the
//! buffer, flush, or sender contracts.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Policy for deriving this node's neighbor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyStrategy<I> {
    /// Star topology around a fixed hub, ignoring any supplied adjacency.
    ///
    /// The hub's neighbors are all other members; everyone else's neighbor
    /// set is `[hub]`.
    Star {
        /// The distinguished central node.
        hub: I,
    },

    /// Take the adjacency list supplied in the topology message verbatim.
    UseSupplied,
}

/// What to do when a topology message arrives after neighbors were already
/// assigned.
///
/// The protocol leaves this ambiguous; the default is first-write-wins and
/// later messages are acknowledged without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReassignPolicy {
    /// Keep the first derived neighbor set for the process lifetime.
    #[default]
    FirstWriteWins,
    /// Re-derive neighbors on every topology message.
    LatestWriteWins,
}

/// Outcome of a topology assignment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Neighbors were derived for the first time.
    Assigned,
    /// Neighbors were already set and the policy kept them.
    Retained,
    /// Neighbors were re-derived under [`ReassignPolicy::LatestWriteWins`].
    Reassigned,
}

/// Derives and holds this node's neighbor set.
///
/// Membership is fixed at construction (supplied by the process harness
/// before any handler runs); the neighbor set is derived on the first
/// topology message and read-only thereafter under the default policy.
#[derive(Debug)]
pub struct TopologyManager<I> {
    local_id: I,
    members: Vec<I>,
    strategy: TopologyStrategy<I>,
    policy: ReassignPolicy,
    neighbors: RwLock<Option<Vec<I>>>,
}

impl<I> TopologyManager<I>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a manager with no neighbors assigned yet.
    pub fn new(
        local_id: I,
        members: Vec<I>,
        strategy: TopologyStrategy<I>,
        policy: ReassignPolicy,
    ) -> Self {
        Self {
            local_id,
            members,
            strategy,
            policy,
            neighbors: RwLock::new(None),
        }
    }

    /// Derive the neighbor set from a topology message.
    ///
    /// Under [`TopologyStrategy::Star`] the supplied adjacency is ignored.
    /// Under [`TopologyStrategy::UseSupplied`] the entry for this node is
    /// taken verbatim (missing entry means no neighbors). Whether a repeat
    /// call re-derives is governed by the [`ReassignPolicy`].
    pub fn assign(&self, supplied: Option<&HashMap<I, Vec<I>>>) -> Assignment {
        let mut neighbors = self.neighbors.write();

        let already_assigned = neighbors.is_some();
        if already_assigned && self.policy == ReassignPolicy::FirstWriteWins {
            return Assignment::Retained;
        }

        let derived = match &self.strategy {
            TopologyStrategy::Star { hub } => {
                if self.local_id == *hub {
                    self.members
                        .iter()
                        .filter(|id| *id != hub)
                        .cloned()
                        .collect()
                } else {
                    vec![hub.clone()]
                }
            }
            TopologyStrategy::UseSupplied => supplied
                .and_then(|adjacency| adjacency.get(&self.local_id))
                .cloned()
                .unwrap_or_default(),
        };

        tracing::debug!(?derived, "derived neighbor set");
        *neighbors = Some(derived);

        if already_assigned {
            Assignment::Reassigned
        } else {
            Assignment::Assigned
        }
    }

    /// The assigned neighbor set, or `None` before the first assignment.
    pub fn neighbors(&self) -> Option<Vec<I>> {
        self.neighbors.read().clone()
    }

    /// Whether a neighbor set has been assigned.
    pub fn is_assigned(&self) -> bool {
        self.neighbors.read().is_some()
    }

    /// This node's identity.
    pub fn local_id(&self) -> &I {
        &self.local_id
    }

    /// The full cluster membership, including this node.
    pub fn members(&self) -> &[I] {
        &self.members
    }

    /// Whether the given id is a cluster member.
    pub fn is_member(&self, id: &I) -> bool {
        self.members.contains(id)
    }
}
