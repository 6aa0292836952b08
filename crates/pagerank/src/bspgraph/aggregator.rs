//! Global aggregators
//!
//! Aggregators hold values shared by every vertex of a graph. Compute steps
//! read a snapshot taken before the superstep and record contributions,
//! which the executor replays into the aggregators at the barrier.

use std::fmt;

/// A named global value combined from per-vertex contributions
pub trait Aggregator: Send + Sync + fmt::Debug {
    /// Fold one contribution into the current value
    fn aggregate(&mut self, value: f64);

    /// Current value
    fn get(&self) -> f64;

    /// Overwrite the current value
    fn set(&mut self, value: f64);

    /// Restore the initial value
    fn reset(&mut self) {
        self.set(0.0);
    }
}

/// Running sum of contributions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SumAggregator {
    value: f64,
}

impl SumAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for SumAggregator {
    fn aggregate(&mut self, value: f64) {
        self.value += value;
    }

    fn get(&self) -> f64 {
        self.value
    }

    fn set(&mut self, value: f64) {
        self.value = value;
    }
}

/// Largest contribution seen since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaxAggregator {
    value: f64,
}

impl MaxAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for MaxAggregator {
    fn aggregate(&mut self, value: f64) {
        if value > self.value {
            self.value = value;
        }
    }

    fn get(&self) -> f64 {
        self.value
    }

    fn set(&mut self, value: f64) {
        self.value = value;
    }
}
