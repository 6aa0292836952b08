//! Bulk-Synchronous-Parallel graph engine
//!
//! Key concepts:
//!
//! - **Vertex**: keyed unit of state with outgoing edges and a mailbox
//! - **Superstep**: synchronized phase in which every scheduled vertex computes once
//! - **Message**: value sent along an edge, visible one superstep later
//! - **Aggregator**: global value combined from per-vertex contributions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Executor                             │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐                      │
//! │  │Superstep│→ │Superstep│→ │Superstep│→ ... → global halt   │
//! │  │    0    │  │    1    │  │    2    │                      │
//! │  └─────────┘  └─────────┘  └─────────┘                      │
//! │       │            │            │                           │
//! │       ▼            ▼            ▼                           │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │ Per-Superstep: Schedule → Compute → Barrier → Merge │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod vertex;

// Re-exports
pub use aggregator::{Aggregator, MaxAggregator, SumAggregator};
pub use config::ExecutorConfig;
pub use context::{ComputeContext, ComputeFn};
pub use error::BspError;
pub use executor::{Executor, ExecutorCallbacks, ExecutorState, NoCallbacks, RunSummary, StepStats};
pub use graph::Graph;
pub use vertex::{Vertex, VertexId, VertexState};
