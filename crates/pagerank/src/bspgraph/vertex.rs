//! Vertex model for the BSP graph
//!
//! A vertex carries a value, its outgoing edge targets, and the mailbox
//! filled during the previous superstep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a vertex in the graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub String);

impl VertexId {
    /// Create a new VertexId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vertex execution state (Pregel's "vote to halt" mechanism)
///
/// - `Pending`: Added to the graph but not computed yet in this pass
/// - `Active`: Vertex will compute in the next superstep
/// - `Halted`: Vertex has voted to halt (will reactivate on message receipt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VertexState {
    /// Vertex awaits its initialization step
    #[default]
    Pending,
    /// Vertex is active and will compute in next superstep
    Active,
    /// Vertex has voted to halt
    Halted,
}

impl VertexState {
    /// Check if the vertex is waiting for initialization
    pub fn is_pending(&self) -> bool {
        matches!(self, VertexState::Pending)
    }

    /// Check if the vertex is active
    pub fn is_active(&self) -> bool {
        matches!(self, VertexState::Active)
    }

    /// Check if the vertex is halted (can be reactivated)
    pub fn is_halted(&self) -> bool {
        matches!(self, VertexState::Halted)
    }
}

/// A vertex owned by a [`Graph`](super::graph::Graph)
#[derive(Debug, Clone)]
pub struct Vertex<V, M> {
    pub(crate) id: VertexId,
    pub(crate) value: V,
    pub(crate) edges: BTreeSet<VertexId>,
    pub(crate) inbox: Vec<M>,
    pub(crate) state: VertexState,
}

impl<V: Default, M> Vertex<V, M> {
    pub(crate) fn new(id: VertexId) -> Self {
        Self {
            id,
            value: V::default(),
            edges: BTreeSet::new(),
            inbox: Vec::new(),
            state: VertexState::Pending,
        }
    }
}

impl<V, M> Vertex<V, M> {
    /// Vertex identity
    pub fn id(&self) -> &VertexId {
        &self.id
    }

    /// Current value
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Outgoing edge targets, deduplicated
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &VertexId> {
        self.edges.iter()
    }

    /// Number of outgoing edges
    pub fn out_degree(&self) -> usize {
        self.edges.len()
    }

    /// Execution state
    pub fn state(&self) -> VertexState {
        self.state
    }

    /// Messages waiting to be read in the next superstep
    pub fn pending_messages(&self) -> usize {
        self.inbox.len()
    }

    /// Whether the scheduler must compute this vertex in the next superstep
    pub(crate) fn is_scheduled(&self) -> bool {
        !self.state.is_halted() || !self.inbox.is_empty()
    }
}
