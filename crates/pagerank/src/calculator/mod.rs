//! PageRank calculator
//!
//! Binds the PageRank vertex program to a [`Graph`] and [`Executor`] and owns
//! the pass lifecycle: reset → populate → run → read scores.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut calculator = Calculator::new(CalculatorConfig::default())?;
//! calculator.add_vertex("a");
//! calculator.add_vertex("b");
//! calculator.add_edge("a", "b")?;
//! calculator.run_to_completion(&CancellationToken::new()).await?;
//! for (id, score) in calculator.scores()? {
//!     println!("{id}: {score}");
//! }
//! ```

pub mod compute;
pub mod config;
pub mod error;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bspgraph::{Executor, Graph, MaxAggregator, RunSummary, SumAggregator, VertexId};

pub use compute::{PageRankCompute, RankState, DANGLING_APPLIED, DANGLING_MASS, MAX_DELTA};
pub use config::CalculatorConfig;
pub use error::CalculatorError;

/// Outcome of the most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalculatorStatus {
    /// Graph is being populated; no scores yet
    #[default]
    Pending,
    /// Run finished and scores are readable
    Completed(RunSummary),
    /// Run was cancelled
    Cancelled,
    /// Run aborted with an error
    Failed,
}

/// PageRank calculator over an in-memory BSP graph
pub struct Calculator {
    config: CalculatorConfig,
    graph: Graph<RankState, f64>,
    executor: Executor<RankState, f64>,
    status: CalculatorStatus,
}

impl Calculator {
    /// Create a calculator, validating the configuration
    pub fn new(config: CalculatorConfig) -> Result<Self, CalculatorError> {
        config.validate()?;

        let program = Arc::new(PageRankCompute::new(config.damping, config.tolerance));
        let executor = Executor::<RankState, f64>::new(config.executor_config(), program.clone())?
            .with_callbacks(program);

        let mut graph = Graph::new();
        graph.register_aggregator(DANGLING_MASS, SumAggregator::new());
        graph.register_aggregator(DANGLING_APPLIED, SumAggregator::new());
        graph.register_aggregator(MAX_DELTA, MaxAggregator::new());

        Ok(Self {
            config,
            graph,
            executor,
            status: CalculatorStatus::Pending,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Underlying graph
    pub fn graph(&self) -> &Graph<RankState, f64> {
        &self.graph
    }

    /// Underlying executor
    pub fn executor(&self) -> &Executor<RankState, f64> {
        &self.executor
    }

    /// Outcome of the most recent run
    pub fn status(&self) -> CalculatorStatus {
        self.status
    }

    /// Drop every vertex and edge to start a new pass
    pub fn reset(&mut self) {
        self.graph.reset();
        self.status = CalculatorStatus::Pending;
    }

    /// Add a vertex; a no-op if it already exists
    pub fn add_vertex(&mut self, id: impl Into<VertexId>) -> bool {
        self.status = CalculatorStatus::Pending;
        self.graph.add_vertex(id)
    }

    /// Add an edge; the source vertex must already exist
    pub fn add_edge(
        &mut self,
        src: impl Into<VertexId>,
        dst: impl Into<VertexId>,
    ) -> Result<(), CalculatorError> {
        self.status = CalculatorStatus::Pending;
        self.graph.add_edge(src, dst)?;
        Ok(())
    }

    /// Run PageRank until every score settles
    pub async fn run_to_completion(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CalculatorError> {
        info!(
            vertices = self.graph.len(),
            workers = self.config.compute_workers,
            "Starting PageRank run"
        );

        match self.executor.run_to_completion(&mut self.graph, cancel).await {
            Ok(summary) => {
                if summary.converged {
                    info!(supersteps = summary.supersteps, "PageRank converged");
                } else {
                    warn!(
                        supersteps = summary.supersteps,
                        "PageRank stopped at superstep cap; scores are best-effort"
                    );
                }
                self.status = CalculatorStatus::Completed(summary);
                Ok(summary)
            }
            Err(err) => {
                self.status = if err.is_cancelled() {
                    CalculatorStatus::Cancelled
                } else {
                    CalculatorStatus::Failed
                };
                Err(err.into())
            }
        }
    }

    /// Iterate over `(vertex id, score)` once per vertex, in no particular order
    pub fn scores(&self) -> Result<impl Iterator<Item = (&VertexId, f64)> + '_, CalculatorError> {
        match self.status {
            CalculatorStatus::Completed(_) => Ok(self
                .graph
                .vertices()
                .map(|vertex| (vertex.id(), vertex.value().score))),
            _ => Err(CalculatorError::NotConverged),
        }
    }

    /// Invoke `callback` for every score, stopping at the first error
    pub fn for_each_score<E, F>(&self, mut callback: F) -> Result<(), E>
    where
        F: FnMut(&VertexId, f64) -> Result<(), E>,
        E: From<CalculatorError>,
    {
        for (id, score) in self.scores()? {
            callback(id, score)?;
        }
        Ok(())
    }
}
