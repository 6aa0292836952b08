//! Executor configuration
//!
//! Worker pool size and the superstep safety cap.

use serde::{Deserialize, Serialize};

use super::error::BspError;

/// BSP executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of parallel workers computing vertices within a superstep
    pub compute_workers: usize,

    /// Maximum supersteps before the run is soft-stopped
    pub max_supersteps: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            compute_workers: num_cpus::get(),
            max_supersteps: 500,
        }
    }
}

impl ExecutorConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count
    pub fn with_compute_workers(mut self, workers: usize) -> Self {
        self.compute_workers = workers;
        self
    }

    /// Set maximum supersteps
    pub fn with_max_supersteps(mut self, max: u64) -> Self {
        self.max_supersteps = max;
        self
    }

    /// Reject configurations the executor cannot run with
    pub fn validate(&self) -> Result<(), BspError> {
        if self.compute_workers == 0 {
            return Err(BspError::config_error("compute_workers must be greater than zero"));
        }
        if self.max_supersteps == 0 {
            return Err(BspError::config_error("max_supersteps must be greater than zero"));
        }
        Ok(())
    }
}
