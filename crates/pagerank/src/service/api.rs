//! Contracts of the external link-graph and index stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound of the link id space; ranges are half-open so this id itself
/// is never returned
pub const MAX_LINK_ID: Uuid = Uuid::from_u128(u128::MAX);

/// A page known to the link graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub url: String,
    pub retrieved_at: DateTime<Utc>,
}

impl Link {
    /// A link with a fresh random id
    pub fn new(url: impl Into<String>, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            retrieved_at,
        }
    }
}

/// Directed hyperlink between two links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub src: Uuid,
    pub dst: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(src: Uuid, dst: Uuid, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            src,
            dst,
            updated_at,
        }
    }
}

/// I/O failure reported by a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached or rejected the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No link with this id
    #[error("Link not found: {0}")]
    NotFound(Uuid),

    /// Edge endpoints are not both known links
    #[error("Unknown edge links: {src} -> {dst}")]
    UnknownEdgeLinks { src: Uuid, dst: Uuid },

    /// Iterator used after it was closed
    #[error("Iterator already closed")]
    Closed,
}

/// Forward-only, single-pass cursor over store results
///
/// `next` returns `None` both at the end and on failure; callers check
/// [`take_error`](StoreIterator::take_error) afterwards and must always
/// [`close`](StoreIterator::close) the iterator.
#[async_trait]
pub trait StoreIterator<T: Send>: Send {
    /// Advance to the next item
    async fn next(&mut self) -> Option<T>;

    /// Terminal error that stopped iteration, if any
    fn take_error(&mut self) -> Option<StoreError>;

    /// Release the underlying cursor
    async fn close(&mut self) -> Result<(), StoreError>;
}

pub type LinkIterator = Box<dyn StoreIterator<Link>>;
pub type EdgeIterator = Box<dyn StoreIterator<Edge>>;

/// Read access to the link graph
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Links with `from <= id < to` retrieved strictly before `retrieved_before`
    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator, StoreError>;

    /// Edges with `from <= src < to` updated strictly before `updated_before`
    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator, StoreError>;
}

/// Write access to the document index
#[async_trait]
pub trait IndexApi: Send + Sync {
    /// Store the PageRank score of a link; idempotent and retryable
    async fn update_rank(&self, link_id: Uuid, score: f64) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(StoreError: Send, Sync);
    static_assertions::assert_obj_safe!(GraphApi, IndexApi);

    #[test]
    fn test_max_link_id() {
        assert_eq!(
            MAX_LINK_ID.to_string(),
            "ffffffff-ffff-ffff-ffff-ffffffffffff"
        );
        assert!(Uuid::nil() < MAX_LINK_ID);
    }

    #[test]
    fn test_link_serialization() {
        let link = Link::new("https://example.com", Utc::now());
        let json = serde_json::to_string(&link).unwrap();
        let back: Link = serde_json::from_str(&json).unwrap();
        assert_eq!(link, back);
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::UnknownEdgeLinks {
            src: Uuid::nil(),
            dst: MAX_LINK_ID,
        };
        assert!(err.to_string().starts_with("Unknown edge links"));
    }
}
