//! Error types for the BSP engine
//!
//! Covers graph population, compute failures, and run control.

use super::vertex::VertexId;
use thiserror::Error;

/// Errors that can occur while populating or running a BSP graph
#[derive(Debug, Error)]
pub enum BspError {
    /// Edge references a source vertex that is not in the graph
    #[error("Unknown edge source: {0}")]
    UnknownEdgeSource(VertexId),

    /// Error raised by a vertex compute step
    #[error("Compute error in {vertex_id}: {message}")]
    ComputeError {
        vertex_id: VertexId,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Compute step referenced an aggregator that was never registered
    #[error("Unknown aggregator: {0}")]
    UnknownAggregator(String),

    /// A worker task panicked or was aborted
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Invalid executor configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Run stopped before reaching global halt
    #[error("Run cancelled")]
    Cancelled,
}

impl BspError {
    /// Create a compute error with a message
    pub fn compute_error(vertex_id: impl Into<VertexId>, message: impl Into<String>) -> Self {
        Self::ComputeError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a compute error with source
    pub fn compute_error_with_source(
        vertex_id: impl Into<VertexId>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ComputeError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this is the tolerated "edge source missing" condition
    pub fn is_unknown_edge_source(&self) -> bool {
        matches!(self, BspError::UnknownEdgeSource(_))
    }

    /// Check if the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BspError::Cancelled)
    }
}
