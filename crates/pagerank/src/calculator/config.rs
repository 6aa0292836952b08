//! PageRank calculator configuration

use serde::{Deserialize, Serialize};

use super::error::CalculatorError;
use crate::bspgraph::ExecutorConfig;

/// Configuration for a [`Calculator`](super::Calculator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Probability of following a link rather than jumping to a random page
    pub damping: f64,

    /// A vertex halts once its score moves less than this between supersteps
    pub tolerance: f64,

    /// Safety cap on supersteps per run
    pub max_supersteps: u64,

    /// Number of parallel compute workers
    pub compute_workers: usize,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_supersteps: 500,
            compute_workers: num_cpus::get(),
        }
    }
}

impl CalculatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_supersteps(mut self, max: u64) -> Self {
        self.max_supersteps = max;
        self
    }

    pub fn with_compute_workers(mut self, workers: usize) -> Self {
        self.compute_workers = workers;
        self
    }

    /// Check every field, reporting all problems together
    pub fn validate(&self) -> Result<(), CalculatorError> {
        let mut problems = Vec::new();
        if self.compute_workers == 0 {
            problems.push("compute_workers must be greater than zero".to_string());
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            problems.push(format!("damping must be in (0, 1), got {}", self.damping));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            problems.push(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if self.max_supersteps == 0 {
            problems.push("max_supersteps must be greater than zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CalculatorError::Validation(problems))
        }
    }

    /// Executor settings derived from this config
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new()
            .with_compute_workers(self.compute_workers)
            .with_max_supersteps(self.max_supersteps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CalculatorConfig::default();
        assert_eq!(config.damping, 0.85);
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.max_supersteps, 500);
        assert!(config.compute_workers > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let config = CalculatorConfig::new()
            .with_compute_workers(0)
            .with_damping(1.5)
            .with_tolerance(0.0)
            .with_max_supersteps(0);

        match config.validate() {
            Err(CalculatorError::Validation(problems)) => assert_eq!(problems.len(), 4),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_damping_rejected() {
        let config = CalculatorConfig::new().with_damping(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CalculatorConfig = serde_json::from_str(r#"{"damping": 0.9}"#).unwrap();
        assert_eq!(config.damping, 0.9);
        assert_eq!(config.max_supersteps, 500);
    }

    #[test]
    fn test_executor_config() {
        let config = CalculatorConfig::new()
            .with_compute_workers(3)
            .with_max_supersteps(7)
            .executor_config();
        assert_eq!(config.compute_workers, 3);
        assert_eq!(config.max_supersteps, 7);
    }
}
