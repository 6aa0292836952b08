//! Service configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::calculator::CalculatorConfig;

/// PageRank service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Time between update passes
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,

    /// Calculator settings, including the compute worker count
    pub calculator: CalculatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30 * 60), // 30 min between passes
            calculator: CalculatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_compute_workers(mut self, workers: usize) -> Self {
        self.calculator.compute_workers = workers;
        self
    }

    pub fn with_calculator(mut self, calculator: CalculatorConfig) -> Self {
        self.calculator = calculator;
        self
    }
}
