//! PageRank calculator service
//!
//! Periodically rebuilds the link graph from a [`GraphApi`], recomputes
//! PageRank scores, and writes them back through an [`IndexApi`]. Only the
//! instance owning partition 0 runs passes.
//!
//! # Example
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .graph_api(graph)
//!     .index_api(index)
//!     .partition_detector(Arc::new(FixedPartition::default()))
//!     .build()?;
//!
//! let handle = service.start();
//! // ...
//! handle.stop().await?;
//! ```

pub mod api;
pub mod config;
pub mod memory;
mod scheduler;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::calculator::{Calculator, CalculatorError};
use crate::partition::{PartitionDetector, PartitionError};

pub use api::{
    Edge, EdgeIterator, GraphApi, IndexApi, Link, LinkIterator, StoreError, StoreIterator,
    MAX_LINK_ID,
};
pub use config::ServiceConfig;
pub use memory::{InMemoryGraph, InMemoryIndex, SnapshotIterator};
pub use scheduler::ServiceHandle;

/// Errors raised by the service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Construction-time problems, all of them at once
    #[error("Service config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Link-graph or index store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Calculator failure, including cancellation
    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    /// Partition detection failure other than warm-up
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// A vertex id could not be mapped back to a link id
    #[error("Invalid link id {id}: {source}")]
    InvalidLinkId {
        id: String,
        #[source]
        source: uuid::Error,
    },

    /// The background task panicked or was aborted
    #[error("Service task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Check if the pass stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Calculator(err) if err.is_cancelled())
    }

    /// Check if the failure is transient and worth retrying next tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(_))
    }
}

/// Outcome of one update pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    /// Vertices scored
    pub vertices: usize,
    /// Edges ignored because their source link was not loaded
    pub skipped_edges: usize,
    /// Supersteps executed
    pub supersteps: u64,
    /// Whether the run reached global halt before the superstep cap
    pub converged: bool,
    /// Wall time of the whole pass
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Builder validating collaborators and configuration
#[derive(Default)]
pub struct ServiceBuilder {
    graph_api: Option<Arc<dyn GraphApi>>,
    index_api: Option<Arc<dyn IndexApi>>,
    partition_detector: Option<Arc<dyn PartitionDetector>>,
    config: ServiceConfig,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph_api(mut self, graph_api: Arc<dyn GraphApi>) -> Self {
        self.graph_api = Some(graph_api);
        self
    }

    pub fn index_api(mut self, index_api: Arc<dyn IndexApi>) -> Self {
        self.index_api = Some(index_api);
        self
    }

    pub fn partition_detector(mut self, detector: Arc<dyn PartitionDetector>) -> Self {
        self.partition_detector = Some(detector);
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.update_interval = interval;
        self
    }

    pub fn compute_workers(mut self, workers: usize) -> Self {
        self.config.calculator.compute_workers = workers;
        self
    }

    /// Validate everything and build the service
    pub fn build(self) -> Result<Service, ServiceError> {
        let mut problems = Vec::new();
        if self.graph_api.is_none() {
            problems.push("graph API has not been provided".to_string());
        }
        if self.index_api.is_none() {
            problems.push("index API has not been provided".to_string());
        }
        if self.partition_detector.is_none() {
            problems.push("partition detector has not been provided".to_string());
        }
        if self.config.update_interval.is_zero() {
            problems.push("update interval must be greater than zero".to_string());
        }
        if let Err(CalculatorError::Validation(calculator_problems)) =
            self.config.calculator.validate()
        {
            problems.extend(calculator_problems);
        }

        match (self.graph_api, self.index_api, self.partition_detector) {
            (Some(graph_api), Some(index_api), Some(partition_detector)) if problems.is_empty() => {
                let calculator = Calculator::new(self.config.calculator.clone())?;
                Ok(Service {
                    config: self.config,
                    graph_api,
                    index_api,
                    partition_detector,
                    calculator,
                })
            }
            _ => Err(ServiceError::Validation(problems)),
        }
    }
}

/// PageRank calculator service
pub struct Service {
    config: ServiceConfig,
    graph_api: Arc<dyn GraphApi>,
    index_api: Arc<dyn IndexApi>,
    partition_detector: Arc<dyn PartitionDetector>,
    calculator: Calculator,
}

impl Service {
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Calculator holding the graph and scores of the last pass
    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    /// Run update passes every `update_interval` until cancelled
    ///
    /// Store failures are logged and retried on the next tick. Returns `Ok`
    /// once `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let interval = self.config.update_interval;
        info!(
            update_interval = ?interval,
            workers = self.config.calculator.compute_workers,
            "PageRank service started"
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("PageRank service stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.tick(&cancel).await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {
                    info!("PageRank pass cancelled; service stopping");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Handle one timer tick: check leadership, then run a pass
    async fn tick(&mut self, cancel: &CancellationToken) -> Result<(), ServiceError> {
        let info = match self.partition_detector.partition_info().await {
            Ok(info) => info,
            Err(err) if err.is_not_available_yet() => {
                warn!("Deferring PageRank update pass: partition data not yet available");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !info.is_leader() {
            info!(
                partition = info.partition,
                num_partitions = info.num_partitions,
                "Skipping PageRank update pass: only the partition 0 leader computes scores"
            );
            return Ok(());
        }

        match self.run_pass(cancel).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_retryable() => {
                error!(error = %err, "PageRank update pass failed; retrying on next tick");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Rebuild the graph, compute scores, and persist them
    pub async fn run_pass(&mut self, cancel: &CancellationToken) -> Result<PassReport, ServiceError> {
        let started = Instant::now();
        let snapshot_time = Utc::now();
        info!("Starting PageRank update pass");

        self.calculator.reset();
        self.load_links(snapshot_time).await?;
        let skipped_edges = self.load_edges(snapshot_time).await?;

        let summary = self.calculator.run_to_completion(cancel).await?;
        self.persist_scores().await?;

        let report = PassReport {
            vertices: self.calculator.graph().len(),
            skipped_edges,
            supersteps: summary.supersteps,
            converged: summary.converged,
            elapsed: started.elapsed(),
        };
        info!(
            vertices = report.vertices,
            skipped_edges = report.skipped_edges,
            supersteps = report.supersteps,
            converged = report.converged,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Completed PageRank update pass"
        );
        Ok(report)
    }

    async fn load_links(&mut self, retrieved_before: chrono::DateTime<Utc>) -> Result<usize, ServiceError> {
        let mut links = self
            .graph_api
            .links(Uuid::nil(), MAX_LINK_ID, retrieved_before)
            .await?;

        let mut count = 0;
        while let Some(link) = links.next().await {
            self.calculator.add_vertex(link.id.to_string());
            count += 1;
        }

        if let Some(err) = links.take_error() {
            if let Err(close_err) = links.close().await {
                debug!(error = %close_err, "Failed to close link iterator");
            }
            return Err(err.into());
        }
        links.close().await?;

        debug!(links = count, "Loaded links");
        Ok(count)
    }

    /// Returns the number of edges skipped because their source is unknown
    async fn load_edges(&mut self, updated_before: chrono::DateTime<Utc>) -> Result<usize, ServiceError> {
        let mut edges = self
            .graph_api
            .edges(Uuid::nil(), MAX_LINK_ID, updated_before)
            .await?;

        let mut loaded = 0;
        let mut skipped = 0;
        while let Some(edge) = edges.next().await {
            // Links written after the link scan may already have edges
            match self.calculator.add_edge(edge.src.to_string(), edge.dst.to_string()) {
                Ok(()) => loaded += 1,
                Err(err) if err.is_unknown_edge_source() => skipped += 1,
                Err(err) => {
                    if let Err(close_err) = edges.close().await {
                        debug!(error = %close_err, "Failed to close edge iterator");
                    }
                    return Err(err.into());
                }
            }
        }

        if let Some(err) = edges.take_error() {
            if let Err(close_err) = edges.close().await {
                debug!(error = %close_err, "Failed to close edge iterator");
            }
            return Err(err.into());
        }
        edges.close().await?;

        debug!(edges = loaded, skipped, "Loaded edges");
        Ok(skipped)
    }

    async fn persist_scores(&self) -> Result<(), ServiceError> {
        for (id, score) in self.calculator.scores()? {
            let link_id = Uuid::parse_str(id.as_str()).map_err(|source| ServiceError::InvalidLinkId {
                id: id.to_string(),
                source,
            })?;
            self.index_api.update_rank(link_id, score).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{FixedPartition, PartitionInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn builder_with(graph: Arc<InMemoryGraph>, index: Arc<InMemoryIndex>) -> ServiceBuilder {
        ServiceBuilder::new()
            .graph_api(graph)
            .index_api(index)
            .partition_detector(Arc::new(FixedPartition::default()))
            .compute_workers(2)
    }

    async fn populate(graph: &InMemoryGraph) -> Vec<Link> {
        let t0 = Utc::now() - chrono::Duration::minutes(1);
        let mut links = Vec::new();
        for url in ["https://a.example", "https://b.example", "https://c.example"] {
            links.push(graph.upsert_link(Link::new(url, t0)).await);
        }
        for i in 0..links.len() {
            let next = (i + 1) % links.len();
            graph
                .upsert_edge(Edge::new(links[i].id, links[next].id, t0))
                .await
                .unwrap();
        }
        links
    }

    #[test]
    fn test_build_reports_every_problem() {
        let err = ServiceBuilder::new()
            .update_interval(Duration::ZERO)
            .compute_workers(0)
            .build()
            .err()
            .unwrap();

        match err {
            ServiceError::Validation(problems) => {
                assert_eq!(problems.len(), 5, "{:?}", problems);
                assert!(problems.iter().any(|p| p.contains("graph API")));
                assert!(problems.iter().any(|p| p.contains("index API")));
                assert!(problems.iter().any(|p| p.contains("partition detector")));
                assert!(problems.iter().any(|p| p.contains("update interval")));
                assert!(problems.iter().any(|p| p.contains("compute_workers")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_pass_persists_scores() {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());
        let links = populate(&graph).await;

        let mut service = builder_with(graph, index.clone()).build().unwrap();
        let report = service.run_pass(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.vertices, 3);
        assert_eq!(report.skipped_edges, 0);
        assert!(report.converged);
        for link in &links {
            let rank = index.rank(link.id).await.unwrap();
            assert!((rank - 1.0 / 3.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_cancelled_pass_persists_nothing() {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());
        populate(&graph).await;

        let mut service = builder_with(graph, index.clone()).build().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service.run_pass(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(index.is_empty().await);
    }

    /// Reports an edge whose source was never returned by the link scan
    struct RacyGraph {
        inner: InMemoryGraph,
        late_src: Uuid,
    }

    #[async_trait]
    impl GraphApi for RacyGraph {
        async fn links(
            &self,
            from: Uuid,
            to: Uuid,
            before: chrono::DateTime<Utc>,
        ) -> Result<LinkIterator, StoreError> {
            self.inner.links(from, to, before).await
        }

        async fn edges(
            &self,
            from: Uuid,
            to: Uuid,
            before: chrono::DateTime<Utc>,
        ) -> Result<EdgeIterator, StoreError> {
            let mut edges = Vec::new();
            let mut it = self.inner.edges(from, to, before).await?;
            while let Some(edge) = it.next().await {
                edges.push(edge);
            }
            it.close().await?;
            edges.push(Edge::new(self.late_src, edges[0].dst, before));
            Ok(Box::new(SnapshotIterator::new(edges)))
        }
    }

    #[tokio::test]
    async fn test_unknown_edge_source_is_tolerated() {
        let inner = InMemoryGraph::new();
        populate(&inner).await;
        let graph = Arc::new(RacyGraph {
            inner,
            late_src: Uuid::new_v4(),
        });
        let index = Arc::new(InMemoryIndex::new());

        let mut service = ServiceBuilder::new()
            .graph_api(graph)
            .index_api(index.clone())
            .partition_detector(Arc::new(FixedPartition::default()))
            .compute_workers(1)
            .build()
            .unwrap();

        let report = service.run_pass(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.skipped_edges, 1);
        assert_eq!(report.vertices, 3);
        assert_eq!(index.len().await, 3);
    }

    /// Link iterator that fails midway
    struct BrokenIterator {
        yielded: bool,
        error: Option<StoreError>,
    }

    #[async_trait]
    impl StoreIterator<Link> for BrokenIterator {
        async fn next(&mut self) -> Option<Link> {
            if self.yielded {
                self.error = Some(StoreError::Unavailable("connection reset".into()));
                return None;
            }
            self.yielded = true;
            Some(Link::new("https://a.example", Utc::now()))
        }

        fn take_error(&mut self) -> Option<StoreError> {
            self.error.take()
        }

        async fn close(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct FlakyGraph {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphApi for FlakyGraph {
        async fn links(
            &self,
            _from: Uuid,
            _to: Uuid,
            _before: chrono::DateTime<Utc>,
        ) -> Result<LinkIterator, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(BrokenIterator {
                yielded: false,
                error: None,
            }))
        }

        async fn edges(
            &self,
            _from: Uuid,
            _to: Uuid,
            _before: chrono::DateTime<Utc>,
        ) -> Result<EdgeIterator, StoreError> {
            Ok(Box::new(SnapshotIterator::new(Vec::new())))
        }
    }

    #[tokio::test]
    async fn test_iterator_error_aborts_pass() {
        let index = Arc::new(InMemoryIndex::new());
        let mut service = ServiceBuilder::new()
            .graph_api(Arc::new(FlakyGraph {
                calls: AtomicUsize::new(0),
            }))
            .index_api(index.clone())
            .partition_detector(Arc::new(FixedPartition::default()))
            .compute_workers(1)
            .build()
            .unwrap();

        let err = service.run_pass(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_errors_retried_on_next_tick() {
        let graph = Arc::new(FlakyGraph {
            calls: AtomicUsize::new(0),
        });
        let service = ServiceBuilder::new()
            .graph_api(graph.clone())
            .index_api(Arc::new(InMemoryIndex::new()))
            .partition_detector(Arc::new(FixedPartition::default()))
            .update_interval(Duration::from_millis(10))
            .compute_workers(1)
            .build()
            .unwrap();

        let handle = service.start();
        let deadline = Instant::now() + Duration::from_secs(5);
        while graph.calls.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(graph.calls.load(Ordering::SeqCst) >= 3);
        handle.stop().await.unwrap();
    }

    /// Detector that is not ready for the first few calls
    struct WarmingDetector {
        calls: AtomicUsize,
        ready_after: usize,
        info: PartitionInfo,
    }

    #[async_trait]
    impl PartitionDetector for WarmingDetector {
        async fn partition_info(&self) -> Result<PartitionInfo, PartitionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.ready_after {
                Err(PartitionError::NotAvailableYet)
            } else {
                Ok(self.info)
            }
        }
    }

    #[tokio::test]
    async fn test_pass_deferred_until_partition_known() {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());
        populate(&graph).await;
        let detector = Arc::new(WarmingDetector {
            calls: AtomicUsize::new(0),
            ready_after: 2,
            info: PartitionInfo::new(0, 1),
        });

        let service = builder_with(graph, index.clone())
            .partition_detector(detector.clone())
            .update_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let handle = service.start();

        let deadline = Instant::now() + Duration::from_secs(5);
        while index.len().await < 3 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.stop().await.unwrap();

        assert_eq!(index.len().await, 3);
        assert!(detector.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_follower_never_writes() {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());
        populate(&graph).await;
        let detector = Arc::new(WarmingDetector {
            calls: AtomicUsize::new(0),
            ready_after: 0,
            info: PartitionInfo::new(1, 2),
        });

        let service = builder_with(graph, index.clone())
            .partition_detector(detector.clone())
            .update_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let handle = service.start();

        let deadline = Instant::now() + Duration::from_secs(5);
        while detector.calls.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.stop().await.unwrap();

        assert!(detector.calls.load(Ordering::SeqCst) >= 3);
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_partition_failure_stops_service() {
        struct BrokenDetector;

        #[async_trait]
        impl PartitionDetector for BrokenDetector {
            async fn partition_info(&self) -> Result<PartitionInfo, PartitionError> {
                Err(PartitionError::InvalidHostname("web".into()))
            }
        }

        let service = builder_with(Arc::new(InMemoryGraph::new()), Arc::new(InMemoryIndex::new()))
            .partition_detector(Arc::new(BrokenDetector))
            .update_interval(Duration::from_millis(10))
            .build()
            .unwrap();

        let handle = service.start();
        let result = handle.wait().await;
        assert!(matches!(result, Err(ServiceError::Partition(_))));
    }
}
