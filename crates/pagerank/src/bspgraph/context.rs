//! Compute context and the per-vertex compute trait
//!
//! Everything a compute step writes is buffered in the context and only
//! becomes visible after the superstep barrier.

use std::collections::{BTreeSet, HashMap};

use super::error::BspError;
use super::vertex::VertexId;

/// Context provided to a vertex during computation
///
/// Provides access to:
/// - Messages delivered during the previous superstep
/// - The vertex's current value and outgoing edges
/// - A snapshot of the aggregator values taken before the superstep
/// - Buffers for the new value, outgoing messages and aggregator contributions
pub struct ComputeContext<'a, V, M> {
    vertex_id: &'a VertexId,
    value: &'a V,
    edges: &'a BTreeSet<VertexId>,
    messages: &'a [M],
    superstep: u64,
    num_vertices: usize,
    aggregates: &'a HashMap<String, f64>,
    output: StepOutput<V, M>,
}

/// Buffered effects of one compute step
#[derive(Debug)]
pub(crate) struct StepOutput<V, M> {
    pub(crate) value: Option<V>,
    pub(crate) halt: bool,
    pub(crate) outbox: Vec<(VertexId, M)>,
    pub(crate) aggregations: Vec<(String, f64)>,
}

impl<V, M> Default for StepOutput<V, M> {
    fn default() -> Self {
        Self {
            value: None,
            halt: false,
            outbox: Vec::new(),
            aggregations: Vec::new(),
        }
    }
}

impl<'a, V, M> ComputeContext<'a, V, M> {
    /// Create a new compute context
    pub(crate) fn new(
        vertex_id: &'a VertexId,
        value: &'a V,
        edges: &'a BTreeSet<VertexId>,
        messages: &'a [M],
        superstep: u64,
        num_vertices: usize,
        aggregates: &'a HashMap<String, f64>,
    ) -> Self {
        Self {
            vertex_id,
            value,
            edges,
            messages,
            superstep,
            num_vertices,
            aggregates,
            output: StepOutput::default(),
        }
    }

    /// Get the current vertex ID
    pub fn id(&self) -> &VertexId {
        self.vertex_id
    }

    /// Value as of the start of this superstep
    pub fn value(&self) -> &V {
        self.value
    }

    /// Outgoing edge targets
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &'a VertexId> {
        self.edges.iter()
    }

    /// Number of outgoing edges
    pub fn out_degree(&self) -> usize {
        self.edges.len()
    }

    /// Messages sent to this vertex during the previous superstep
    pub fn messages(&self) -> &'a [M] {
        self.messages
    }

    /// Current superstep number (0-indexed)
    pub fn superstep(&self) -> u64 {
        self.superstep
    }

    /// Check if this is the first superstep
    pub fn is_first_superstep(&self) -> bool {
        self.superstep == 0
    }

    /// Number of vertices in the graph when the run started
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Aggregator value as of the end of the previous superstep
    pub fn aggregator(&self, name: &str) -> Result<f64, BspError> {
        self.aggregates
            .get(name)
            .copied()
            .ok_or_else(|| BspError::UnknownAggregator(name.to_string()))
    }

    /// Buffer a new value for this vertex
    pub fn set_value(&mut self, value: V) {
        self.output.value = Some(value);
    }

    /// Send a message to another vertex
    ///
    /// Messages will be delivered at the start of the next superstep.
    pub fn send_message(&mut self, target: impl Into<VertexId>, message: M) {
        self.output.outbox.push((target.into(), message));
    }

    /// Send the same message along every outgoing edge
    pub fn send_to_neighbors(&mut self, message: M)
    where
        M: Clone,
    {
        for target in self.edges.iter() {
            self.output.outbox.push((target.clone(), message.clone()));
        }
    }

    /// Record a contribution to a registered aggregator
    pub fn aggregate(&mut self, name: &str, value: f64) -> Result<(), BspError> {
        if !self.aggregates.contains_key(name) {
            return Err(BspError::UnknownAggregator(name.to_string()));
        }
        self.output.aggregations.push((name.to_string(), value));
        Ok(())
    }

    /// Vote to halt; a message in a later superstep reactivates the vertex
    pub fn vote_to_halt(&mut self) {
        self.output.halt = true;
    }

    /// Consume the context and return the buffered effects
    pub(crate) fn into_output(self) -> StepOutput<V, M> {
        self.output
    }
}

/// Per-vertex compute function run by the executor
///
/// Implementations must be deterministic for a given context; the executor
/// may call them from any worker thread.
pub trait ComputeFn<V, M>: Send + Sync {
    /// Execute one superstep for the vertex behind `ctx`
    fn compute(&self, ctx: &mut ComputeContext<'_, V, M>) -> Result<(), BspError>;
}

impl<V, M, F> ComputeFn<V, M> for F
where
    F: Fn(&mut ComputeContext<'_, V, M>) -> Result<(), BspError> + Send + Sync,
{
    fn compute(&self, ctx: &mut ComputeContext<'_, V, M>) -> Result<(), BspError> {
        self(ctx)
    }
}
