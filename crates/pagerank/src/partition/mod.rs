//! Partition ownership
//!
//! A [`PartitionDetector`] tells an instance which partition it owns. Only
//! the owner of partition 0 may run a computation pass and write scores.

mod dns;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use dns::{parse_ordinal, partition_from_peers, PeerDnsDetector};

/// Partition assignment of this instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Partition owned by this instance
    pub partition: u32,
    /// Total number of partitions in the cluster
    pub num_partitions: u32,
}

impl PartitionInfo {
    pub fn new(partition: u32, num_partitions: u32) -> Self {
        Self {
            partition,
            num_partitions,
        }
    }

    /// Whether this instance may run passes
    pub fn is_leader(&self) -> bool {
        self.partition == 0
    }
}

/// Errors raised while detecting partitions
#[derive(Debug, Error)]
pub enum PartitionError {
    /// Partition discovery is still warming up; retry later
    #[error("No partition data available yet")]
    NotAvailableYet,

    /// The instance hostname carries no ordinal suffix
    #[error("Cannot derive partition from hostname: {0}")]
    InvalidHostname(String),
}

impl PartitionError {
    /// Check if the caller should defer and retry
    pub fn is_not_available_yet(&self) -> bool {
        matches!(self, PartitionError::NotAvailableYet)
    }
}

/// Reports the partition owned by this instance
#[async_trait]
pub trait PartitionDetector: Send + Sync {
    async fn partition_info(&self) -> Result<PartitionInfo, PartitionError>;
}

/// Detector returning a fixed assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPartition {
    info: PartitionInfo,
}

impl FixedPartition {
    pub fn new(partition: u32, num_partitions: u32) -> Self {
        Self {
            info: PartitionInfo::new(partition, num_partitions),
        }
    }
}

impl Default for FixedPartition {
    /// The single-shard deployment: partition 0 of 1
    fn default() -> Self {
        Self::new(0, 1)
    }
}

#[async_trait]
impl PartitionDetector for FixedPartition {
    async fn partition_info(&self) -> Result<PartitionInfo, PartitionError> {
        Ok(self.info)
    }
}
