//! pagerank: BSP graph engine and PageRank calculator service
//!
//! - `bspgraph`: Bulk-Synchronous-Parallel graph, executor, and aggregators
//! - `calculator`: PageRank vertex program bound to a graph and executor
//! - `partition`: Partition ownership and leader detection
//! - `service`: Periodic pass orchestration over the link-graph and index stores
//!
//! # Example
//!
//! ```rust,ignore
//! use pagerank::{Calculator, CalculatorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut calculator = Calculator::new(CalculatorConfig::default())?;
//! for id in ["a", "b", "c"] {
//!     calculator.add_vertex(id);
//! }
//! calculator.add_edge("a", "b")?;
//! calculator.add_edge("b", "c")?;
//! calculator.add_edge("c", "a")?;
//!
//! calculator.run_to_completion(&CancellationToken::new()).await?;
//! calculator.for_each_score(|id, score| {
//!     println!("{id}: {score:.4}");
//!     Ok::<_, pagerank::CalculatorError>(())
//! })?;
//! ```

pub mod bspgraph;
pub mod calculator;
pub mod partition;
pub mod service;

// Re-exports for convenience
pub use bspgraph::{
    Aggregator, BspError, ComputeContext, ComputeFn, Executor, ExecutorCallbacks, ExecutorConfig,
    ExecutorState, Graph, MaxAggregator, NoCallbacks, RunSummary, StepStats, SumAggregator, Vertex,
    VertexId, VertexState,
};
pub use calculator::{Calculator, CalculatorConfig, CalculatorError, CalculatorStatus, RankState};
pub use partition::{FixedPartition, PartitionDetector, PartitionError, PartitionInfo, PeerDnsDetector};
pub use service::{
    Edge, GraphApi, InMemoryGraph, InMemoryIndex, IndexApi, Link, PassReport, Service,
    ServiceBuilder, ServiceConfig, ServiceError, ServiceHandle, StoreError, StoreIterator,
};

// Re-export for callers driving runs directly
pub use tokio_util::sync::CancellationToken;
