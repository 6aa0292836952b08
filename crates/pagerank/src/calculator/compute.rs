//! PageRank vertex program
//!
//! Messages carry *changes* in a vertex's outgoing share rather than the
//! share itself. Each vertex keeps the running sum of everything it has been
//! sent, so a converged neighbour can stay silent without its contribution
//! disappearing from the sum.
//!
//! Mass held by vertices without outgoing edges is tracked in the
//! [`DANGLING_MASS`] aggregator and spread evenly over every vertex. The
//! barrier callback decides when a change in that mass is large enough to
//! be worth recomputing the whole graph for.

use tracing::debug;

use crate::bspgraph::{BspError, ComputeContext, ComputeFn, ExecutorCallbacks, Graph, StepStats};

/// Running total of score held by dangling vertices
pub const DANGLING_MASS: &str = "dangling_mass";

/// Dangling mass currently applied by compute steps
pub const DANGLING_APPLIED: &str = "dangling_applied";

/// Largest score change seen in the last superstep
pub const MAX_DELTA: &str = "max_delta";

/// Per-vertex PageRank state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankState {
    /// Current score
    pub score: f64,
    /// Sum of every share received so far
    pub incoming: f64,
    /// Score last propagated to neighbours (or to the dangling mass)
    pub announced: f64,
}

/// PageRank compute function and its barrier callbacks
#[derive(Debug, Clone, Copy)]
pub struct PageRankCompute {
    damping: f64,
    tolerance: f64,
}

impl PageRankCompute {
    pub fn new(damping: f64, tolerance: f64) -> Self {
        Self { damping, tolerance }
    }

    /// Minimum drift before a vertex re-announces its share
    fn announce_threshold(&self, num_vertices: usize) -> f64 {
        (1.0 - self.damping) * self.tolerance / (2.0 * num_vertices as f64)
    }

    /// Minimum dangling-mass change that triggers a graph-wide recompute
    fn dangling_threshold(&self) -> f64 {
        (1.0 - self.damping) * self.tolerance / 2.0
    }

    fn initialize(&self, ctx: &mut ComputeContext<'_, RankState, f64>) -> Result<(), BspError> {
        let score = 1.0 / ctx.num_vertices() as f64;

        if ctx.out_degree() == 0 {
            ctx.aggregate(DANGLING_MASS, score)?;
        } else {
            ctx.send_to_neighbors(score / ctx.out_degree() as f64);
        }

        ctx.set_value(RankState {
            score,
            incoming: 0.0,
            announced: score,
        });
        Ok(())
    }

    fn update(&self, ctx: &mut ComputeContext<'_, RankState, f64>) -> Result<(), BspError> {
        let n = ctx.num_vertices() as f64;
        let old = *ctx.value();
        let incoming = old.incoming + ctx.messages().iter().sum::<f64>();
        let dangling = ctx.aggregator(DANGLING_APPLIED)?;

        let score = (1.0 - self.damping) / n + self.damping * (incoming + dangling / n);
        if !score.is_finite() {
            return Err(BspError::compute_error(
                ctx.id(),
                format!("score diverged to {}", score),
            ));
        }

        let delta = (score - old.score).abs();
        let drift = score - old.announced;
        let mut announced = old.announced;

        if ctx.out_degree() == 0 {
            if drift != 0.0 {
                ctx.aggregate(DANGLING_MASS, drift)?;
                announced = score;
            }
        } else if drift.abs() >= self.announce_threshold(ctx.num_vertices()) {
            ctx.send_to_neighbors(drift / ctx.out_degree() as f64);
            announced = score;
        }

        ctx.aggregate(MAX_DELTA, delta)?;
        ctx.set_value(RankState {
            score,
            incoming,
            announced,
        });

        if delta < self.tolerance {
            ctx.vote_to_halt();
        }
        Ok(())
    }
}

impl ComputeFn<RankState, f64> for PageRankCompute {
    fn compute(&self, ctx: &mut ComputeContext<'_, RankState, f64>) -> Result<(), BspError> {
        if ctx.is_first_superstep() {
            self.initialize(ctx)
        } else {
            self.update(ctx)
        }
    }
}

impl ExecutorCallbacks<RankState, f64> for PageRankCompute {
    fn pre_step(&self, graph: &mut Graph<RankState, f64>) -> Result<(), BspError> {
        graph
            .aggregator_mut(MAX_DELTA)
            .ok_or_else(|| BspError::UnknownAggregator(MAX_DELTA.to_string()))?
            .reset();
        Ok(())
    }

    fn post_step(
        &self,
        graph: &mut Graph<RankState, f64>,
        stats: &StepStats,
    ) -> Result<bool, BspError> {
        let mass = aggregator_value(graph, DANGLING_MASS)?;
        let applied = aggregator_value(graph, DANGLING_APPLIED)?;
        let max_delta = aggregator_value(graph, MAX_DELTA)?;

        let refresh = stats.superstep == 0 || (mass - applied).abs() >= self.dangling_threshold();
        if refresh && !graph.is_empty() {
            if let Some(aggregator) = graph.aggregator_mut(DANGLING_APPLIED) {
                aggregator.set(mass);
            }
            graph.activate_all();
        }

        debug!(
            superstep = stats.superstep,
            max_delta,
            dangling_mass = mass,
            dangling_refreshed = refresh,
            "PageRank barrier"
        );
        Ok(true)
    }
}

fn aggregator_value(graph: &Graph<RankState, f64>, name: &str) -> Result<f64, BspError> {
    graph
        .aggregator(name)
        .map(|aggregator| aggregator.get())
        .ok_or_else(|| BspError::UnknownAggregator(name.to_string()))
}
