// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Disk Quota Gate
//!
//! Consulted before every write path. Two thresholds:
//!
//! - **Reject** (default 0.85): new writes are refused with a retry-later
//!   signal; reads and cleanup continue
//! - **Emergency** (default 0.95): everything but reads is refused,
//!   including cleanup temp space
//!
//! A failed capacity stat fails closed: if the engine cannot tell how full
//! the disk is, it must assume the worst.

use std::path::PathBuf;
use std::sync::Arc;

use aether_upload_bootstrap::Platform;
use aether_upload_domain::EngineError;
use tracing::warn;

/// Write-admission gate over filesystem capacity.
pub struct DiskQuotaGate {
    platform: Arc<dyn Platform>,
    probe_path: PathBuf,
    reject_threshold: f64,
    emergency_threshold: f64,
}

impl DiskQuotaGate {
    /// Creates a gate probing the filesystem that holds `probe_path`.
    pub fn new(
        platform: Arc<dyn Platform>,
        probe_path: PathBuf,
        reject_threshold: f64,
        emergency_threshold: f64,
    ) -> Self {
        Self {
            platform,
            probe_path,
            reject_threshold,
            emergency_threshold,
        }
    }

    /// Admits or rejects a new write.
    ///
    /// # Errors
    /// `DiskQuotaExceeded` (retryable) above the reject threshold or when
    /// the filesystem cannot be stat'ed.
    pub fn check_write_allowed(&self) -> Result<(), EngineError> {
        let ratio = self.used_ratio()?;
        if ratio >= self.reject_threshold {
            warn!(
                quota = true,
                used_ratio = ratio,
                threshold = self.reject_threshold,
                "rejecting write: disk usage above threshold"
            );
            return Err(EngineError::DiskQuotaExceeded(format!(
                "disk usage {:.1}% >= {:.0}%",
                ratio * 100.0,
                self.reject_threshold * 100.0
            )));
        }
        Ok(())
    }

    /// True above the emergency threshold, where even cleanup must not
    /// claim temp space.
    pub fn is_emergency(&self) -> bool {
        match self.used_ratio() {
            Ok(ratio) => ratio >= self.emergency_threshold,
            // Fail closed.
            Err(_) => true,
        }
    }

    fn used_ratio(&self) -> Result<f64, EngineError> {
        let usage = self.platform.disk_usage(&self.probe_path).map_err(|e| {
            warn!(quota = true, "disk stat failed, failing closed: {}", e);
            EngineError::DiskQuotaExceeded(format!("cannot stat filesystem: {}", e))
        })?;
        Ok(usage.used_ratio())
    }
}
