// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Constructed once (defaults or a TOML file) and shared by reference with
//! every component. Every field has a default, so a partial file is valid.

use crate::retry::RetryPolicy;
use crate::row::MAX_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the batch writer submits rows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Unconditional upsert, last writer wins
    #[default]
    InsertOrReplace,
    /// Insert only; an existing row fails the whole chunk
    Insert,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows per submitted chunk, at most the store limit
    pub max_batch_size: usize,
    pub mode: BatchMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_SIZE,
            mode: BatchMode::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Rows requested per segment
    pub page_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { page_size: 1000 }
    }
}

/// Bounds on lock acquisition; all unbounded by default
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Give up acquiring after this long
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
    /// Give up acquiring after this many attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Force-unlock a lock whose timestamp is older than this
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub stale_after: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub batch: BatchConfig,
    pub scan: ScanConfig,
    pub lock: LockConfig,
    /// Create a missing table on first write and retry
    pub auto_create_tables: bool,
    /// Upper bound on any single operation including its retries
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub operation_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            batch: BatchConfig::default(),
            scan: ScanConfig::default(),
            lock: LockConfig::default(),
            auto_create_tables: true,
            operation_deadline: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_batch_size == 0 || self.batch.max_batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "batch.max_batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch.max_batch_size
            )));
        }
        if self.scan.page_size == 0 {
            return Err(ConfigError::Invalid(
                "scan.page_size must be at least 1".to_string(),
            ));
        }
        if self.retry.transient.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.transient.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.contention.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "retry.contention.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lock.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "lock.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.transient.initial_delay > self.retry.transient.max_delay {
            return Err(ConfigError::Invalid(
                "retry.transient.initial_delay exceeds max_delay".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
