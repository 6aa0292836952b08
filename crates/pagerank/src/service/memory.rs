//! In-memory link graph and document index
//!
//! **Note:** state sits behind `tokio::sync::RwLock` so the stores can be
//! shared between the service loop and loaders.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::api::{
    Edge, EdgeIterator, GraphApi, IndexApi, Link, LinkIterator, StoreError, StoreIterator,
};

#[derive(Debug, Default)]
struct GraphData {
    links: BTreeMap<Uuid, Link>,
    url_to_id: HashMap<String, Uuid>,
    edges: BTreeMap<Uuid, Edge>,
    edge_to_id: HashMap<(Uuid, Uuid), Uuid>,
}

/// Link graph held in memory
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    data: RwLock<GraphData>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a link or refresh the one sharing its URL
    ///
    /// An existing link keeps its id and the later of both retrieval times.
    /// Returns the stored link.
    pub async fn upsert_link(&self, link: Link) -> Link {
        let mut data = self.data.write().await;

        if let Some(id) = data.url_to_id.get(&link.url).copied() {
            if let Some(existing) = data.links.get_mut(&id) {
                existing.retrieved_at = existing.retrieved_at.max(link.retrieved_at);
                return existing.clone();
            }
        }

        let mut link = link;
        if link.id.is_nil() {
            link.id = Uuid::new_v4();
        }
        data.url_to_id.insert(link.url.clone(), link.id);
        data.links.insert(link.id, link.clone());
        link
    }

    /// Insert an edge or refresh the one with the same endpoints
    ///
    /// Both endpoints must be known links.
    pub async fn upsert_edge(&self, edge: Edge) -> Result<Edge, StoreError> {
        let mut data = self.data.write().await;

        if !data.links.contains_key(&edge.src) || !data.links.contains_key(&edge.dst) {
            return Err(StoreError::UnknownEdgeLinks {
                src: edge.src,
                dst: edge.dst,
            });
        }

        if let Some(id) = data.edge_to_id.get(&(edge.src, edge.dst)).copied() {
            if let Some(existing) = data.edges.get_mut(&id) {
                existing.updated_at = existing.updated_at.max(edge.updated_at);
                return Ok(existing.clone());
            }
        }

        let mut edge = edge;
        if edge.id.is_nil() {
            edge.id = Uuid::new_v4();
        }
        data.edge_to_id.insert((edge.src, edge.dst), edge.id);
        data.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    pub async fn lookup_link(&self, id: Uuid) -> Result<Link, StoreError> {
        self.data
            .read()
            .await
            .links
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Delete the edges of `src` not refreshed since `updated_before`
    pub async fn remove_stale_edges(&self, src: Uuid, updated_before: DateTime<Utc>) -> usize {
        let mut data = self.data.write().await;
        let stale: Vec<Edge> = data
            .edges
            .values()
            .filter(|edge| edge.src == src && edge.updated_at < updated_before)
            .cloned()
            .collect();

        for edge in &stale {
            data.edges.remove(&edge.id);
            data.edge_to_id.remove(&(edge.src, edge.dst));
        }
        stale.len()
    }

    pub async fn link_count(&self) -> usize {
        self.data.read().await.links.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.data.read().await.edges.len()
    }
}

#[async_trait]
impl GraphApi for InMemoryGraph {
    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StoreError> {
        if from >= to {
            return Ok(Box::new(SnapshotIterator::new(Vec::new())));
        }
        let data = self.data.read().await;
        let links: Vec<Link> = data
            .links
            .range(from..to)
            .map(|(_, link)| link)
            .filter(|link| link.retrieved_at < retrieved_before)
            .cloned()
            .collect();
        Ok(Box::new(SnapshotIterator::new(links)))
    }

    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StoreError> {
        let data = self.data.read().await;
        let edges: Vec<Edge> = data
            .edges
            .values()
            .filter(|edge| edge.src >= from && edge.src < to && edge.updated_at < updated_before)
            .cloned()
            .collect();
        Ok(Box::new(SnapshotIterator::new(edges)))
    }
}

/// Iterator over results copied out of the store when the query ran
#[derive(Debug)]
pub struct SnapshotIterator<T> {
    items: std::vec::IntoIter<T>,
    closed: bool,
    error: Option<StoreError>,
}

impl<T> SnapshotIterator<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
            closed: false,
            error: None,
        }
    }
}

#[async_trait]
impl<T: Send> StoreIterator<T> for SnapshotIterator<T> {
    async fn next(&mut self) -> Option<T> {
        if self.closed {
            self.error.get_or_insert(StoreError::Closed);
            return None;
        }
        self.items.next()
    }

    fn take_error(&mut self) -> Option<StoreError> {
        self.error.take()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

/// Document index that only tracks PageRank scores
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    ranks: RwLock<HashMap<Uuid, f64>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score stored for a link
    pub async fn rank(&self, link_id: Uuid) -> Option<f64> {
        self.ranks.read().await.get(&link_id).copied()
    }

    /// Copy of every stored score
    pub async fn ranks(&self) -> HashMap<Uuid, f64> {
        self.ranks.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.ranks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ranks.read().await.is_empty()
    }
}

#[async_trait]
impl IndexApi for InMemoryIndex {
    async fn update_rank(&self, link_id: Uuid, score: f64) -> Result<(), StoreError> {
        self.ranks.write().await.insert(link_id, score);
        Ok(())
    }
}
