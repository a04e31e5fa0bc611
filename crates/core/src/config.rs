// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager configuration
//!
//! Loaded from TOML; every field is optional and falls back to
//! [`ManagerConfig::default`]:
//!
//! ```toml
//! name = "indexer"
//! workers = 2
//! wait_slice = "50ms"
//! long_wait_threshold = "10s"
//! deadlock_detection = true
//! ```

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Prefix for worker thread names and log spans
    pub name: String,
    /// Number of worker threads running scheduled jobs
    pub workers: usize,
    /// Upper bound on a single condvar wait while blocked on admission;
    /// the waiter re-checks admission and refreshes wait bookkeeping after each slice
    #[serde(with = "humantime_serde")]
    pub wait_slice: Duration,
    /// Waits older than this are reported once per episode
    #[serde(with = "humantime_serde")]
    pub long_wait_threshold: Duration,
    pub deadlock_detection: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: "rj".to_string(),
            workers: 4,
            wait_slice: Duration::from_millis(100),
            long_wait_threshold: Duration::from_secs(30),
            deadlock_detection: true,
        }
    }
}

impl ManagerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_wait_slice(mut self, slice: Duration) -> Self {
        self.wait_slice = slice;
        self
    }

    pub fn with_long_wait_threshold(mut self, threshold: Duration) -> Self {
        self.long_wait_threshold = threshold;
        self
    }

    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.deadlock_detection = enabled;
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, JobError> {
        let config: ManagerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, JobError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.workers == 0 {
            return Err(JobError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.wait_slice.is_zero() {
            return Err(JobError::InvalidConfig(
                "wait_slice must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
