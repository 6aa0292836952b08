//! In-memory BSP graph
//!
//! Holds the vertices of one computation pass, their adjacency sets and
//! mailboxes, the superstep counter, and the registered aggregators.

use std::collections::{BTreeMap, HashMap};

use super::aggregator::Aggregator;
use super::error::BspError;
use super::vertex::{Vertex, VertexId, VertexState};

/// Graph of vertices processed by the [`Executor`](super::executor::Executor)
///
/// `V` is the per-vertex value and `M` the message type exchanged along edges.
#[derive(Debug)]
pub struct Graph<V, M> {
    vertices: HashMap<VertexId, Vertex<V, M>>,
    aggregators: BTreeMap<String, Box<dyn Aggregator>>,
    superstep: u64,
}

impl<V, M> Default for Graph<V, M> {
    fn default() -> Self {
        Self {
            vertices: HashMap::new(),
            aggregators: BTreeMap::new(),
            superstep: 0,
        }
    }
}

impl<V, M> Graph<V, M> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex, returning `false` if it already existed
    pub fn add_vertex(&mut self, id: impl Into<VertexId>) -> bool
    where
        V: Default,
    {
        let id = id.into();
        if self.vertices.contains_key(&id) {
            return false;
        }
        self.vertices.insert(id.clone(), Vertex::new(id));
        true
    }

    /// Add an edge from `src` to `dst`
    ///
    /// The source must already exist. The destination may be added later;
    /// targets that never materialize are dropped when a run starts.
    pub fn add_edge(
        &mut self,
        src: impl Into<VertexId>,
        dst: impl Into<VertexId>,
    ) -> Result<(), BspError> {
        let src = src.into();
        match self.vertices.get_mut(&src) {
            Some(vertex) => {
                vertex.edges.insert(dst.into());
                Ok(())
            }
            None => Err(BspError::UnknownEdgeSource(src)),
        }
    }

    /// Look up a vertex
    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex<V, M>> {
        self.vertices.get(id)
    }

    /// Iterate over every vertex once, in no particular order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<V, M>> {
        self.vertices.values()
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of completed supersteps
    pub fn superstep(&self) -> u64 {
        self.superstep
    }

    /// Clear vertices, edges, mailboxes and the superstep counter
    ///
    /// Aggregators stay registered but return to their initial value.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.superstep = 0;
        for aggregator in self.aggregators.values_mut() {
            aggregator.reset();
        }
    }

    /// Register (or replace) a named aggregator
    pub fn register_aggregator(
        &mut self,
        name: impl Into<String>,
        aggregator: impl Aggregator + 'static,
    ) {
        self.aggregators.insert(name.into(), Box::new(aggregator));
    }

    /// Look up an aggregator
    pub fn aggregator(&self, name: &str) -> Option<&dyn Aggregator> {
        self.aggregators.get(name).map(|agg| agg.as_ref())
    }

    /// Look up an aggregator for modification
    pub fn aggregator_mut(&mut self, name: &str) -> Option<&mut (dyn Aggregator + 'static)> {
        self.aggregators.get_mut(name).map(|agg| agg.as_mut())
    }

    /// Snapshot of every aggregator value
    pub fn aggregator_values(&self) -> HashMap<String, f64> {
        self.aggregators
            .iter()
            .map(|(name, agg)| (name.clone(), agg.get()))
            .collect()
    }

    /// Total number of undelivered messages
    pub fn pending_messages(&self) -> usize {
        self.vertices.values().map(|v| v.inbox.len()).sum()
    }

    /// Every vertex has voted to halt and no message is waiting
    pub fn is_quiescent(&self) -> bool {
        self.vertices
            .values()
            .all(|v| v.state.is_halted() && v.inbox.is_empty())
    }

    /// Reactivate every halted vertex for the next superstep
    pub fn activate_all(&mut self) {
        for vertex in self.vertices.values_mut() {
            if vertex.state.is_halted() {
                vertex.state = VertexState::Active;
            }
        }
    }

    /// Remove edges whose destination never materialized
    ///
    /// Returns the number of edges removed.
    pub fn drop_unresolved_edges(&mut self) -> usize {
        let unresolved: Vec<(VertexId, VertexId)> = self
            .vertices
            .values()
            .flat_map(|v| {
                v.edges
                    .iter()
                    .filter(|dst| !self.vertices.contains_key(*dst))
                    .map(|dst| (v.id.clone(), dst.clone()))
            })
            .collect();

        for (src, dst) in &unresolved {
            if let Some(vertex) = self.vertices.get_mut(src) {
                vertex.edges.remove(dst);
            }
        }
        unresolved.len()
    }

    /// Remove the vertices due for computation, sorted by id
    pub(crate) fn take_scheduled(&mut self) -> Vec<Vertex<V, M>> {
        let mut ids: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|v| v.is_scheduled())
            .map(|v| v.id.clone())
            .collect();
        ids.sort();

        ids.iter()
            .filter_map(|id| self.vertices.remove(id))
            .collect()
    }

    /// Put vertices back after a superstep
    pub(crate) fn restore(&mut self, vertices: impl IntoIterator<Item = Vertex<V, M>>) {
        for vertex in vertices {
            self.vertices.insert(vertex.id.clone(), vertex);
        }
    }

    /// Queue a message for the next superstep; `false` if the target is unknown
    pub(crate) fn deliver(&mut self, target: &VertexId, message: M) -> bool {
        match self.vertices.get_mut(target) {
            Some(vertex) => {
                vertex.inbox.push(message);
                true
            }
            None => false,
        }
    }

    pub(crate) fn advance_superstep(&mut self) {
        self.superstep += 1;
    }
}
