//! BSP Executor - drives supersteps over a graph
//!
//! Each superstep follows the sequence: Schedule → Compute → Barrier → Merge.
//! Scheduled vertices are split into contiguous chunks and moved into
//! blocking worker tasks, so no lock guards vertex state while computing.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::ExecutorConfig;
use super::context::{ComputeContext, ComputeFn, StepOutput};
use super::error::BspError;
use super::graph::Graph;
use super::vertex::{Vertex, VertexState};

/// Lifecycle of an executor run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorState {
    /// No run in progress
    #[default]
    Idle,
    /// Computing the given superstep
    Running(u64),
    /// Merging the results of the given superstep
    Barrier(u64),
    /// Last run reached global halt (or its superstep cap)
    Halted,
    /// Last run was cancelled
    Cancelled,
    /// Last run aborted with an error
    Failed,
}

/// Counters collected at a superstep barrier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Superstep these counters belong to
    pub superstep: u64,
    /// Vertices computed
    pub computed: usize,
    /// Vertices that voted to halt
    pub halted: usize,
    /// Messages delivered to next superstep's mailboxes
    pub messages_sent: usize,
    /// Messages addressed to unknown vertices
    pub messages_dropped: usize,
}

/// Result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Supersteps executed since the last graph reset
    pub supersteps: u64,
    /// Whether the run ended at global halt rather than a step limit
    pub converged: bool,
}

/// Hooks invoked with exclusive access to the graph around each superstep
pub trait ExecutorCallbacks<V, M>: Send + Sync {
    /// Called before the workers of a superstep start
    fn pre_step(&self, _graph: &mut Graph<V, M>) -> Result<(), BspError> {
        Ok(())
    }

    /// Called at the barrier after results are merged
    ///
    /// Returning `false` stops the run after this superstep.
    fn post_step(&self, _graph: &mut Graph<V, M>, _stats: &StepStats) -> Result<bool, BspError> {
        Ok(true)
    }
}

/// Callbacks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl<V, M> ExecutorCallbacks<V, M> for NoCallbacks {}

/// What a worker hands back at the barrier
struct WorkerOutput<V, M> {
    vertices: Vec<Vertex<V, M>>,
    outputs: Vec<StepOutput<V, M>>,
    error: Option<BspError>,
}

/// BSP executor running a compute function over a [`Graph`]
pub struct Executor<V, M> {
    config: ExecutorConfig,
    compute: Arc<dyn ComputeFn<V, M>>,
    callbacks: Arc<dyn ExecutorCallbacks<V, M>>,
    state: ExecutorState,
}

impl<V, M> Executor<V, M>
where
    V: Send + 'static,
    M: Send + 'static,
{
    /// Create an executor, validating the configuration
    pub fn new(config: ExecutorConfig, compute: Arc<dyn ComputeFn<V, M>>) -> Result<Self, BspError> {
        config.validate()?;
        Ok(Self {
            config,
            compute,
            callbacks: Arc::new(NoCallbacks),
            state: ExecutorState::Idle,
        })
    }

    /// Attach step callbacks
    pub fn with_callbacks(mut self, callbacks: Arc<dyn ExecutorCallbacks<V, M>>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run supersteps until global halt, the superstep cap, or cancellation
    ///
    /// Cancellation is only observed before the first superstep and at
    /// barriers; a cancelled run returns [`BspError::Cancelled`].
    pub async fn run_to_completion(
        &mut self,
        graph: &mut Graph<V, M>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, BspError> {
        let result = self.run_inner(graph, cancel, None).await;
        self.finish(&result);
        result
    }

    /// Run at most `steps` supersteps
    pub async fn run_steps(
        &mut self,
        graph: &mut Graph<V, M>,
        cancel: &CancellationToken,
        steps: u64,
    ) -> Result<RunSummary, BspError> {
        let result = self.run_inner(graph, cancel, Some(steps)).await;
        self.finish(&result);
        result
    }

    fn finish(&mut self, result: &Result<RunSummary, BspError>) {
        self.state = match result {
            Ok(_) => ExecutorState::Halted,
            Err(BspError::Cancelled) => ExecutorState::Cancelled,
            Err(_) => ExecutorState::Failed,
        };
    }

    async fn run_inner(
        &mut self,
        graph: &mut Graph<V, M>,
        cancel: &CancellationToken,
        step_limit: Option<u64>,
    ) -> Result<RunSummary, BspError> {
        if cancel.is_cancelled() {
            return Err(BspError::Cancelled);
        }

        if graph.superstep() == 0 {
            let dropped = graph.drop_unresolved_edges();
            if dropped > 0 {
                debug!(dropped, "Dropped edges to vertices that never materialized");
            }
        }

        let first_step = graph.superstep();
        loop {
            if graph.is_quiescent() {
                return Ok(RunSummary {
                    supersteps: graph.superstep(),
                    converged: true,
                });
            }

            if graph.superstep() >= self.config.max_supersteps {
                warn!(
                    max_supersteps = self.config.max_supersteps,
                    "Superstep cap reached before global halt"
                );
                return Ok(RunSummary {
                    supersteps: graph.superstep(),
                    converged: false,
                });
            }

            if matches!(step_limit, Some(limit) if graph.superstep() - first_step >= limit) {
                return Ok(RunSummary {
                    supersteps: graph.superstep(),
                    converged: false,
                });
            }

            let superstep = graph.superstep();
            self.state = ExecutorState::Running(superstep);
            self.callbacks.pre_step(graph)?;

            let stats = self.execute_superstep(graph).await?;

            self.state = ExecutorState::Barrier(superstep);
            let keep_running = self.callbacks.post_step(graph, &stats)?;
            graph.advance_superstep();

            debug!(
                superstep,
                computed = stats.computed,
                halted = stats.halted,
                messages_sent = stats.messages_sent,
                messages_dropped = stats.messages_dropped,
                "Superstep complete"
            );

            if !keep_running {
                return Ok(RunSummary {
                    supersteps: graph.superstep(),
                    converged: false,
                });
            }

            if cancel.is_cancelled() {
                return Err(BspError::Cancelled);
            }
        }
    }

    /// Execute a single superstep and merge its results at the barrier
    async fn execute_superstep(&self, graph: &mut Graph<V, M>) -> Result<StepStats, BspError> {
        let superstep = graph.superstep();
        let num_vertices = graph.len();
        let aggregates = Arc::new(graph.aggregator_values());

        let scheduled = graph.take_scheduled();
        let computed = scheduled.len();

        let handles: Vec<_> = split_chunks(scheduled, self.config.compute_workers)
            .into_iter()
            .map(|chunk| {
                let compute = Arc::clone(&self.compute);
                let aggregates = Arc::clone(&aggregates);
                tokio::task::spawn_blocking(move || {
                    run_worker(compute.as_ref(), chunk, superstep, num_vertices, &aggregates)
                })
            })
            .collect();

        // Barrier: every worker finishes before anything is merged
        let results = join_all(handles).await;

        let mut first_error = None;
        let mut finished = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(mut output) => {
                    if let Some(err) = output.error.take() {
                        first_error.get_or_insert(err);
                    }
                    finished.push(output);
                }
                Err(join_err) => {
                    first_error.get_or_insert(BspError::WorkerFailed(join_err.to_string()));
                }
            }
        }

        if let Some(err) = first_error {
            for output in finished {
                graph.restore(output.vertices);
            }
            return Err(err);
        }

        let mut stats = StepStats {
            superstep,
            computed,
            ..StepStats::default()
        };
        let mut outbox = Vec::new();
        let mut aggregations = Vec::new();

        for WorkerOutput {
            mut vertices,
            outputs,
            ..
        } in finished
        {
            for (vertex, output) in vertices.iter_mut().zip(outputs) {
                if let Some(value) = output.value {
                    vertex.value = value;
                }
                vertex.inbox.clear();
                vertex.state = if output.halt {
                    stats.halted += 1;
                    VertexState::Halted
                } else {
                    VertexState::Active
                };
                outbox.extend(output.outbox);
                aggregations.extend(output.aggregations);
            }
            graph.restore(vertices);
        }

        for (target, message) in outbox {
            if graph.deliver(&target, message) {
                stats.messages_sent += 1;
            } else {
                stats.messages_dropped += 1;
            }
        }

        for (name, value) in aggregations {
            match graph.aggregator_mut(&name) {
                Some(aggregator) => aggregator.aggregate(value),
                None => return Err(BspError::UnknownAggregator(name)),
            }
        }

        Ok(stats)
    }
}

/// Compute every vertex of one chunk; stop at the first error
///
/// A panicking compute step is reported as [`BspError::WorkerFailed`] so the
/// chunk's vertices still make it back to the graph.
fn run_worker<V, M>(
    compute: &dyn ComputeFn<V, M>,
    vertices: Vec<Vertex<V, M>>,
    superstep: u64,
    num_vertices: usize,
    aggregates: &HashMap<String, f64>,
) -> WorkerOutput<V, M> {
    let mut outputs = Vec::with_capacity(vertices.len());
    let mut error = None;

    for vertex in &vertices {
        let mut ctx = ComputeContext::new(
            &vertex.id,
            &vertex.value,
            &vertex.edges,
            &vertex.inbox,
            superstep,
            num_vertices,
            aggregates,
        );
        match panic::catch_unwind(AssertUnwindSafe(|| compute.compute(&mut ctx))) {
            Ok(Ok(())) => outputs.push(ctx.into_output()),
            Ok(Err(err)) => {
                error = Some(err);
                break;
            }
            Err(payload) => {
                error = Some(BspError::WorkerFailed(format!(
                    "compute panicked in {}: {}",
                    vertex.id,
                    panic_message(payload.as_ref())
                )));
                break;
            }
        }
    }

    WorkerOutput {
        vertices,
        outputs,
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Split into at most `workers` contiguous chunks, preserving order
fn split_chunks<T>(mut items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = items.len().div_ceil(workers.max(1));
    let mut chunks = Vec::with_capacity(workers);
    while items.len() > chunk_size {
        let tail = items.split_off(chunk_size);
        chunks.push(items);
        items = tail;
    }
    chunks.push(items);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspgraph::aggregator::SumAggregator;
    use crate::bspgraph::vertex::VertexId;
    use std::sync::Mutex;

    type TestGraph = Graph<f64, f64>;

    /// Records the messages each vertex saw, per superstep
    #[derive(Default)]
    struct RecordingCompute {
        seen: Mutex<Vec<(u64, String, Vec<f64>)>>,
    }

    impl ComputeFn<f64, f64> for RecordingCompute {
        fn compute(&self, ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            self.seen.lock().unwrap().push((
                ctx.superstep(),
                ctx.id().to_string(),
                ctx.messages().to_vec(),
            ));
            if ctx.superstep() == 0 {
                ctx.send_to_neighbors(ctx.superstep() as f64 + 1.0);
                ctx.set_value(1.0);
            } else {
                ctx.vote_to_halt();
            }
            Ok(())
        }
    }

    /// Sums incoming messages and forwards them once, then halts
    fn relay(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
        let incoming: f64 = ctx.messages().iter().sum();
        if ctx.is_first_superstep() {
            ctx.send_to_neighbors(1.0);
        } else {
            ctx.set_value(*ctx.value() + incoming);
        }
        ctx.aggregate("total", incoming)?;
        ctx.vote_to_halt();
        Ok(())
    }

    fn chain(ids: &[&str]) -> TestGraph {
        let mut graph = TestGraph::new();
        for id in ids {
            graph.add_vertex(*id);
        }
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        graph
    }

    fn executor(workers: usize, compute: Arc<dyn ComputeFn<f64, f64>>) -> Executor<f64, f64> {
        Executor::new(
            ExecutorConfig::new().with_compute_workers(workers).with_max_supersteps(50),
            compute,
        )
        .unwrap()
    }

    #[test]
    fn test_split_chunks() {
        let chunks = split_chunks((0..10).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);

        let chunks = split_chunks(vec![1, 2], 8);
        assert_eq!(chunks, vec![vec![1], vec![2]]);

        assert!(split_chunks(Vec::<u8>::new(), 4).is_empty());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = Executor::<f64, f64>::new(
            ExecutorConfig::new().with_compute_workers(0),
            Arc::new(relay),
        );
        assert!(matches!(result, Err(BspError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_messages_delayed_one_superstep() {
        let recorder = Arc::new(RecordingCompute::default());
        let mut graph = chain(&["a", "b"]);
        let mut exec = executor(2, recorder.clone());

        let summary = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap();
        assert!(summary.converged);

        let seen = recorder.seen.lock().unwrap();
        // Nothing is visible during the superstep it was sent in
        assert!(seen.iter().filter(|(step, _, _)| *step == 0).all(|(_, _, m)| m.is_empty()));
        // b reads a's message exactly one superstep later
        assert!(seen
            .iter()
            .any(|(step, id, m)| *step == 1 && id == "b" && m == &vec![1.0]));
    }

    #[tokio::test]
    async fn test_halted_vertex_reactivated_by_message() {
        let mut graph = chain(&["a", "b", "c"]);
        graph.register_aggregator("total", SumAggregator::new());
        let mut exec = executor(1, Arc::new(relay));

        let summary = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap();

        // Everyone halts at step 0, b and c wake up at step 1 then halt again
        assert!(summary.converged);
        assert_eq!(summary.supersteps, 2);
        assert_eq!(exec.state(), ExecutorState::Halted);
        assert_eq!(*graph.vertex(&VertexId::from("b")).unwrap().value(), 1.0);
        assert_eq!(*graph.vertex(&VertexId::from("c")).unwrap().value(), 1.0);
        assert_eq!(*graph.vertex(&VertexId::from("a")).unwrap().value(), 0.0);
        assert_eq!(graph.aggregator("total").unwrap().get(), 2.0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut graph = chain(&["a", "b"]);
        graph.register_aggregator("total", SumAggregator::new());
        let mut exec = executor(2, Arc::new(relay));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = exec.run_to_completion(&mut graph, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(exec.state(), ExecutorState::Cancelled);
        assert_eq!(graph.superstep(), 0);
    }

    #[tokio::test]
    async fn test_compute_error_discards_step() {
        struct FailOn(&'static str);
        impl ComputeFn<f64, f64> for FailOn {
            fn compute(&self, ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
                if ctx.id().as_str() == self.0 {
                    return Err(BspError::compute_error(ctx.id(), "boom"));
                }
                ctx.set_value(42.0);
                ctx.send_to_neighbors(1.0);
                Ok(())
            }
        }

        let mut graph = chain(&["a", "b", "c", "d"]);
        let mut exec = executor(2, Arc::new(FailOn("c")));

        let err = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BspError::ComputeError { .. }));
        assert_eq!(exec.state(), ExecutorState::Failed);

        // Every vertex is back in the graph, untouched
        assert_eq!(graph.len(), 4);
        assert!(graph.vertices().all(|v| *v.value() == 0.0));
        assert_eq!(graph.pending_messages(), 0);
        assert_eq!(graph.superstep(), 0);
    }

    #[tokio::test]
    async fn test_superstep_cap_is_soft_stop() {
        fn never_halts(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            ctx.set_value(*ctx.value() + 1.0);
            Ok(())
        }

        let mut graph = chain(&["a"]);
        let mut exec = Executor::new(
            ExecutorConfig::new().with_compute_workers(1).with_max_supersteps(5),
            Arc::new(never_halts),
        )
        .unwrap();

        let summary = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!summary.converged);
        assert_eq!(summary.supersteps, 5);
        assert_eq!(*graph.vertex(&VertexId::from("a")).unwrap().value(), 5.0);
    }

    #[tokio::test]
    async fn test_run_steps_and_resume() {
        fn count(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            ctx.set_value(*ctx.value() + 1.0);
            if ctx.superstep() >= 3 {
                ctx.vote_to_halt();
            }
            Ok(())
        }

        let mut graph = chain(&["a", "b"]);
        let mut exec = executor(2, Arc::new(count));
        let cancel = CancellationToken::new();

        let partial = exec.run_steps(&mut graph, &cancel, 2).await.unwrap();
        assert_eq!(partial.supersteps, 2);
        assert!(!partial.converged);

        let done = exec.run_to_completion(&mut graph, &cancel).await.unwrap();
        assert!(done.converged);
        assert_eq!(done.supersteps, 4);
    }

    #[tokio::test]
    async fn test_post_step_can_stop_run() {
        struct StopAfterFirst;
        impl ExecutorCallbacks<f64, f64> for StopAfterFirst {
            fn post_step(&self, _graph: &mut TestGraph, stats: &StepStats) -> Result<bool, BspError> {
                Ok(stats.superstep < 1)
            }
        }

        fn busy(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            ctx.send_to_neighbors(1.0);
            Ok(())
        }

        let mut graph = chain(&["a", "b"]);
        graph.add_edge("b", "a").unwrap();
        let mut exec = executor(1, Arc::new(busy)).with_callbacks(Arc::new(StopAfterFirst));

        let summary = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.supersteps, 2);
        assert!(!summary.converged);
    }

    #[tokio::test]
    async fn test_cancel_during_run_stops_at_next_barrier() {
        struct CancelAt {
            superstep: u64,
            cancel: CancellationToken,
        }
        impl ExecutorCallbacks<f64, f64> for CancelAt {
            fn post_step(&self, _graph: &mut TestGraph, stats: &StepStats) -> Result<bool, BspError> {
                if stats.superstep == self.superstep {
                    self.cancel.cancel();
                }
                Ok(true)
            }
        }

        fn count(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            ctx.set_value(*ctx.value() + 1.0);
            ctx.send_to_neighbors(1.0);
            Ok(())
        }

        let cancel = CancellationToken::new();
        let mut graph = chain(&["a", "b"]);
        graph.add_edge("b", "a").unwrap();
        let mut exec = executor(2, Arc::new(count)).with_callbacks(Arc::new(CancelAt {
            superstep: 2,
            cancel: cancel.clone(),
        }));

        let err = exec.run_to_completion(&mut graph, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(exec.state(), ExecutorState::Cancelled);

        // Superstep 2 finished and was merged before the run stopped
        assert_eq!(graph.superstep(), 3);
        assert!(graph.vertices().all(|v| *v.value() == 3.0));
        assert_eq!(graph.pending_messages(), 2);
    }

    #[tokio::test]
    async fn test_panicking_worker_keeps_vertices() {
        fn explode_on_c(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            if ctx.id().as_str() == "c" {
                panic!("bad vertex");
            }
            ctx.set_value(7.0);
            ctx.send_to_neighbors(1.0);
            Ok(())
        }

        let mut graph = chain(&["a", "b", "c", "d"]);
        let mut exec = executor(2, Arc::new(explode_on_c));

        let err = exec
            .run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(&err, BspError::WorkerFailed(msg) if msg.contains("bad vertex")));
        assert_eq!(exec.state(), ExecutorState::Failed);

        assert_eq!(graph.len(), 4);
        assert!(graph.vertices().all(|v| *v.value() == 0.0));
        assert_eq!(graph.pending_messages(), 0);
        assert_eq!(graph.superstep(), 0);
    }

    #[tokio::test]
    async fn test_messages_to_unknown_vertices_dropped() {
        struct Capture(Mutex<Vec<StepStats>>);
        impl ExecutorCallbacks<f64, f64> for Capture {
            fn post_step(&self, _graph: &mut TestGraph, stats: &StepStats) -> Result<bool, BspError> {
                self.0.lock().unwrap().push(stats.clone());
                Ok(true)
            }
        }

        fn shout(ctx: &mut ComputeContext<'_, f64, f64>) -> Result<(), BspError> {
            if ctx.is_first_superstep() {
                ctx.send_message("nobody", 1.0);
            }
            ctx.vote_to_halt();
            Ok(())
        }

        let capture = Arc::new(Capture(Mutex::new(Vec::new())));
        let mut graph = chain(&["a"]);
        let mut exec = executor(1, Arc::new(shout)).with_callbacks(capture.clone());
        exec.run_to_completion(&mut graph, &CancellationToken::new())
            .await
            .unwrap();

        let stats = capture.0.lock().unwrap();
        assert_eq!(stats[0].messages_dropped, 1);
        assert_eq!(stats[0].messages_sent, 0);
    }
}
