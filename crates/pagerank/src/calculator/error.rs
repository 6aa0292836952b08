//! Calculator error types

use thiserror::Error;

use crate::bspgraph::BspError;

/// Errors surfaced by the [`Calculator`](super::Calculator)
#[derive(Debug, Error)]
pub enum CalculatorError {
    /// Construction-time configuration problems, all of them at once
    #[error("Invalid calculator configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Error from the underlying graph or executor
    #[error(transparent)]
    Graph(#[from] BspError),

    /// Scores were requested before a run completed
    #[error("Scores are not available until a run completes")]
    NotConverged,
}

impl CalculatorError {
    /// Check if the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CalculatorError::Graph(err) if err.is_cancelled())
    }

    /// Check if an edge referenced a source missing from the graph
    pub fn is_unknown_edge_source(&self) -> bool {
        matches!(self, CalculatorError::Graph(err) if err.is_unknown_edge_source())
    }
}
