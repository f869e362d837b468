// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Layered configuration: compiled defaults, then an optional TOML file,
//! then environment variables with the `AETHER_` prefix, then explicit CLI
//! overrides. Deserialization is non-permissive (`deny_unknown_fields`):
//! a typo'd key fails startup instead of silently doing nothing.
//!
//! The contract constants (chunk size, bundle size, chunk count, domain
//! tags) are deliberately **not** configurable; they live in the domain
//! contract module and change only with a contract version bump. What is
//! configurable here is deployment shape: paths, database, cadences, and
//! the disk thresholds.

use std::path::PathBuf;
use std::time::Duration;

use aether_upload_domain::contract::{
    ASSEMBLING_MAX_AGE_HOURS, DISK_USAGE_EMERGENCY_THRESHOLD, DISK_USAGE_REJECT_THRESHOLD, ORPHAN_RETENTION_HOURS,
};
use aether_upload_domain::EngineError;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Deployment configuration for the upload engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Root directory of all upload storage (single filesystem).
    pub upload_root: PathBuf,
    /// SQLite connection string.
    pub database_url: String,
    /// Cadence of the Tier-3 global cleanup sweep, in seconds.
    pub cleanup_interval_secs: u64,
    /// Orphan directory retention, in hours.
    pub orphan_retention_hours: i64,
    /// Stale `.assembling` retention, in hours.
    pub assembling_max_age_hours: i64,
    /// Reject new writes at this used/total ratio.
    pub disk_usage_reject_threshold: f64,
    /// Refuse all but reads at this used/total ratio.
    pub disk_usage_emergency_threshold: f64,
}

impl EngineConfig {
    /// Loads defaults < file < environment.
    ///
    /// # Errors
    /// `InvalidRequest` on malformed or unknown keys, `InternalError` on
    /// source failures.
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self, EngineError> {
        let mut builder = Config::builder()
            .set_default("upload_root", "storage/uploads")
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("database_url", "sqlite://aether_upload.db")
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("cleanup_interval_secs", 3600_i64)
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("orphan_retention_hours", ORPHAN_RETENTION_HOURS)
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("assembling_max_age_hours", ASSEMBLING_MAX_AGE_HOURS)
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("disk_usage_reject_threshold", DISK_USAGE_REJECT_THRESHOLD)
            .map_err(|e| EngineError::internal_error(e.to_string()))?
            .set_default("disk_usage_emergency_threshold", DISK_USAGE_EMERGENCY_THRESHOLD)
            .map_err(|e| EngineError::internal_error(e.to_string()))?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }
        builder = builder.add_source(Environment::with_prefix("AETHER"));

        let settings = builder
            .build()
            .map_err(|e| EngineError::InvalidRequest(format!("configuration load failed: {}", e)))?;
        let config: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::InvalidRequest(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies explicit CLI overrides on top of the loaded layers.
    pub fn with_overrides(mut self, upload_root: Option<PathBuf>, database_url: Option<String>) -> Result<Self, EngineError> {
        if let Some(root) = upload_root {
            self.upload_root = root;
        }
        if let Some(url) = database_url {
            self.database_url = url;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.disk_usage_reject_threshold)
            || !(0.0..=1.0).contains(&self.disk_usage_emergency_threshold)
        {
            return Err(EngineError::InvalidRequest(
                "configuration: disk thresholds must be ratios in [0, 1]".to_string(),
            ));
        }
        if self.disk_usage_reject_threshold >= self.disk_usage_emergency_threshold {
            return Err(EngineError::InvalidRequest(
                "configuration: reject threshold must be below the emergency threshold".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(EngineError::InvalidRequest(
                "configuration: cleanup interval must be positive".to_string(),
            ));
        }
        if self.orphan_retention_hours <= 0 || self.assembling_max_age_hours <= 0 {
            return Err(EngineError::InvalidRequest(
                "configuration: retention windows must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn orphan_retention(&self) -> Duration {
        Duration::from_secs(self.orphan_retention_hours as u64 * 3600)
    }

    pub fn assembling_max_age(&self) -> Duration {
        Duration::from_secs(self.assembling_max_age_hours as u64 * 3600)
    }
}
