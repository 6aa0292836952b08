//! Partition detection for stateful-set style deployments
//!
//! Instances are named `<name>-<ordinal>` and register behind a headless
//! service name that resolves to one address per running peer.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use tracing::debug;

use super::{PartitionDetector, PartitionError, PartitionInfo};

/// Derives the partition from the hostname ordinal and the peer count from DNS
#[derive(Debug, Clone)]
pub struct PeerDnsDetector {
    hostname: String,
    service_addr: String,
}

impl PeerDnsDetector {
    /// `service_addr` is a `host:port` pair resolving to every peer
    pub fn new(hostname: impl Into<String>, service_addr: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            service_addr: service_addr.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn service_addr(&self) -> &str {
        &self.service_addr
    }
}

#[async_trait]
impl PartitionDetector for PeerDnsDetector {
    async fn partition_info(&self) -> Result<PartitionInfo, PartitionError> {
        let ordinal = parse_ordinal(&self.hostname)?;

        let peers: BTreeSet<IpAddr> = match tokio::net::lookup_host(self.service_addr.as_str()).await {
            Ok(addrs) => addrs.map(|addr| addr.ip()).collect(),
            Err(err) => {
                debug!(service = %self.service_addr, error = %err, "Peer lookup failed");
                return Err(PartitionError::NotAvailableYet);
            }
        };

        partition_from_peers(ordinal, peers.len())
    }
}

/// Extract the trailing `-<n>` ordinal of a hostname
pub fn parse_ordinal(hostname: &str) -> Result<u32, PartitionError> {
    let short = hostname.split('.').next().unwrap_or(hostname);
    short
        .rsplit_once('-')
        .and_then(|(_, suffix)| suffix.parse().ok())
        .ok_or_else(|| PartitionError::InvalidHostname(hostname.to_string()))
}

/// Build the assignment once enough peers are visible
pub fn partition_from_peers(ordinal: u32, peers: usize) -> Result<PartitionInfo, PartitionError> {
    let num_partitions = u32::try_from(peers).map_err(|_| PartitionError::NotAvailableYet)?;
    if ordinal >= num_partitions {
        return Err(PartitionError::NotAvailableYet);
    }
    Ok(PartitionInfo::new(ordinal, num_partitions))
}
