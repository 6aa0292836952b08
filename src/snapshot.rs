//! # Snapshot Module
//!
//! Reads a JSON link-graph snapshot into the in-memory graph store and
//! writes the resulting scores back out as JSON.
//!
//! ```json
//! {
//!   "links": [{ "url": "https://a.example/" }, { "url": "https://b.example/" }],
//!   "edges": [{ "src": "https://a.example/", "dst": "https://b.example/" }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use pagerank::{Edge, InMemoryGraph, Link};

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================
/// Link graph as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub links: Vec<SnapshotLink>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLink {
    pub url: String,
    /// Defaults to the Unix epoch so every pass picks the link up
    #[serde(default = "epoch")]
    pub retrieved_at: DateTime<Utc>,
}

/// Edge between two links, referenced by URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub src: String,
    pub dst: String,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Problems with the snapshot contents
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Edge references unknown link URL: {0}")]
    UnknownUrl(String),
}

/// Parse a snapshot file
pub fn read_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

/// Load a snapshot into the graph store, returning the link ids by URL
pub async fn load_into(graph: &InMemoryGraph, snapshot: GraphSnapshot) -> Result<HashMap<String, Uuid>> {
    let mut ids = HashMap::with_capacity(snapshot.links.len());
    for link in snapshot.links {
        let stored = graph
            .upsert_link(Link::new(link.url.clone(), link.retrieved_at))
            .await;
        ids.insert(link.url, stored.id);
    }

    for edge in snapshot.edges {
        let src = *ids
            .get(&edge.src)
            .ok_or_else(|| SnapshotError::UnknownUrl(edge.src.clone()))?;
        let dst = *ids
            .get(&edge.dst)
            .ok_or_else(|| SnapshotError::UnknownUrl(edge.dst.clone()))?;
        graph
            .upsert_edge(Edge::new(src, dst, epoch()))
            .await
            .with_context(|| format!("Failed to add edge {} -> {}", edge.src, edge.dst))?;
    }

    Ok(ids)
}

// =============================================================================
// SCORE OUTPUT
// =============================================================================
/// One scored link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub link_id: Uuid,
    pub url: String,
    pub score: f64,
}

/// Join scores with their URLs, highest score first
pub fn score_entries(ranks: &HashMap<Uuid, f64>, urls: &HashMap<String, Uuid>) -> Vec<ScoreEntry> {
    let mut entries: Vec<ScoreEntry> = urls
        .iter()
        .filter_map(|(url, id)| {
            ranks.get(id).map(|score| ScoreEntry {
                link_id: *id,
                url: url.clone(),
                score: *score,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.url.cmp(&b.url)));
    entries
}

/// Write entries as pretty JSON to `path`, or stdout when `None`
pub fn write_scores(entries: &[ScoreEntry], path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("Failed to serialize scores")?;
    match path {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write scores to {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).context("Failed to write scores to stdout")?;
        }
    }
    Ok(())
}
