// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Periodic Cleanup Scheduler
//!
//! Runs the Tier-3 global sweep at process startup and then on a fixed
//! cadence (>= 1 hour in production; tests shrink it). The scheduler is
//! the one piece of process-wide cleanup state: the last-run timestamp is
//! monotonic (`Instant`), owned by this service, and injected at startup
//! rather than living in a global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aether_upload_bootstrap::CancellationToken;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::cleanup_engine::CleanupEngine;

/// Minimum production cadence for the global sweep.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Startup + periodic driver for Tier-3 cleanup.
pub struct CleanupScheduler {
    engine: Arc<CleanupEngine>,
    interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl CleanupScheduler {
    pub fn new(engine: Arc<CleanupEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            last_run: Mutex::new(None),
        }
    }

    /// Monotonic time since the last completed sweep, if any.
    pub async fn since_last_run(&self) -> Option<Duration> {
        self.last_run.lock().await.map(|t| t.elapsed())
    }

    /// Runs one sweep immediately and records the run.
    pub async fn run_once(&self) {
        let report = self.engine.tier3_global(Utc::now()).await;
        *self.last_run.lock().await = Some(Instant::now());
        debug!(?report, "scheduled cleanup pass recorded");
    }

    /// Runs the startup sweep, then loops until the token is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "cleanup scheduler starting");
        self.run_once().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("cleanup scheduler stopping");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.run_once().await;
                }
            }
        }
    }
}
