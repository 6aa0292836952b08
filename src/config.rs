//! # Configuration Module
//!
//! Loads the service configuration from environment variables (and an
//! optional `.env` file), then lets command-line flags override it.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pagerank::{CalculatorConfig, ServiceConfig};

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the PageRank service.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON snapshot of the link graph to load at startup
    pub snapshot: Option<PathBuf>,

    /// Where to write scores (stdout when unset)
    pub output: Option<PathBuf>,

    /// Time between update passes
    pub update_interval: Duration,

    /// Calculator settings (damping, tolerance, cap, workers)
    pub calculator: CalculatorConfig,

    /// `host:port` resolving to every peer; enables DNS partition detection
    pub peer_service: Option<String>,

    /// Name of this instance, used to derive its partition ordinal
    pub hostname: String,
}

impl Default for Config {
    fn default() -> Self {
        let service = ServiceConfig::default();
        Self {
            snapshot: None,
            output: None,
            update_interval: service.update_interval,
            calculator: service.calculator,
            peer_service: None,
            hostname: "pagerank-0".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Example
    /// ```ignore
    /// let config = Config::from_env()?;
    /// println!("Passes every {:?}", config.update_interval);
    /// ```
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("PAGERANK_SNAPSHOT") {
            config.snapshot = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("PAGERANK_OUTPUT") {
            config.output = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("UPDATE_INTERVAL_SECS") {
            let secs: u64 = val
                .parse()
                .context("UPDATE_INTERVAL_SECS must be a whole number of seconds")?;
            config.update_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = env::var("COMPUTE_WORKERS") {
            config.calculator.compute_workers = val
                .parse()
                .context("COMPUTE_WORKERS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("DAMPING_FACTOR") {
            config.calculator.damping = val
                .parse()
                .context("DAMPING_FACTOR must be a valid floating-point number (e.g., 0.85)")?;
        }

        if let Ok(val) = env::var("TOLERANCE") {
            config.calculator.tolerance = val
                .parse()
                .context("TOLERANCE must be a valid floating-point number (e.g., 1e-6)")?;
        }

        if let Ok(val) = env::var("MAX_SUPERSTEPS") {
            config.calculator.max_supersteps = val
                .parse()
                .context("MAX_SUPERSTEPS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("PEER_SERVICE_ADDR") {
            config.peer_service = Some(val);
        }

        if let Ok(val) = env::var("HOSTNAME") {
            config.hostname = val;
        }

        Ok(config)
    }

    /// Validate the configuration before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.snapshot.is_none() {
            anyhow::bail!("A link graph snapshot is required (--snapshot or PAGERANK_SNAPSHOT)");
        }

        if self.update_interval.is_zero() {
            anyhow::bail!("UPDATE_INTERVAL_SECS must be at least 1");
        }

        if self.peer_service.is_some() && self.hostname.is_empty() {
            anyhow::bail!("HOSTNAME cannot be empty when PEER_SERVICE_ADDR is set");
        }

        self.calculator
            .validate()
            .context("Invalid calculator settings")?;

        Ok(())
    }

    /// Settings handed to the service builder
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig::new()
            .with_update_interval(self.update_interval)
            .with_calculator(self.calculator.clone())
    }
}
