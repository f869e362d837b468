// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Three-Tier Self-Healing Cleanup Engine
//!
//! - **Tier 1, post-assembly (synchronous)**: after completion returns,
//!   remove the session's `chunks/` and `assembly/` subtrees.
//! - **Tier 2, per-user on session creation**: expire the calling user's
//!   overdue in-progress sessions before accepting a new one.
//! - **Tier 3, global periodic and startup**: expire all overdue
//!   sessions, sweep orphan directories past retention, and delete stale
//!   `.assembling` staging files.
//!
//! ## Two iron rules
//!
//! 1. **Fail-open**: cleanup never raises. Every failed deletion is logged
//!    and recorded in the report's error list, and the sweep continues.
//!    Residue left by an incomplete tier is picked up by Tier 3.
//! 2. **DB-before-file**: a session is marked `expired` and committed
//!    before its files are touched. The reverse order admits a crash
//!    window where the files are gone but the database still advertises an
//!    in-progress session.
//!
//! All tiers are idempotent under repeated invocation and need no
//! cross-tier locking: deletion targets are keyed by on-disk state that
//! each pass re-reads.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use aether_upload_domain::contract::{ASSEMBLING_MAX_AGE_HOURS, BUNDLE_ASSEMBLING_SUFFIX, ORPHAN_RETENTION_HOURS};
use aether_upload_domain::repositories::SessionRepository;
use aether_upload_domain::value_objects::{UploadId, UserId};
use aether_upload_domain::SessionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::infrastructure::storage::UploadRoot;

/// Retention knobs, defaulting to the contract constants. Tests shrink
/// them to exercise the sweeps without clock manipulation.
#[derive(Debug, Clone, Copy)]
pub struct CleanupPolicy {
    pub orphan_retention: Duration,
    pub assembling_max_age: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            orphan_retention: Duration::from_secs(ORPHAN_RETENTION_HOURS as u64 * 3600),
            assembling_max_age: Duration::from_secs(ASSEMBLING_MAX_AGE_HOURS as u64 * 3600),
        }
    }
}

/// Observability counts for one cleanup invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub chunks_deleted: u64,
    pub dirs_deleted: u64,
    pub sessions_expired: u64,
    pub orphans_cleaned: u64,
    pub assembling_cleaned: u64,
    pub elapsed_ms: u64,
    pub errors: Vec<String>,
}

impl CleanupReport {
    fn record_error(&mut self, context: &str, err: impl std::fmt::Display) {
        let line = format!("{}: {}", context, err);
        warn!(cleanup_error = true, "{}", line);
        self.errors.push(line);
    }
}

/// The cleanup engine shared by the orchestrator and the scheduler.
pub struct CleanupEngine {
    root: Arc<UploadRoot>,
    sessions: Arc<dyn SessionRepository>,
    policy: CleanupPolicy,
}

impl CleanupEngine {
    pub fn new(root: Arc<UploadRoot>, sessions: Arc<dyn SessionRepository>, policy: CleanupPolicy) -> Self {
        Self { root, sessions, policy }
    }

    /// Tier 1: remove a session's `chunks/` and `assembly/` subtrees.
    ///
    /// Runs synchronously after completion, success or failure, and never
    /// raises.
    pub async fn tier1_post_assembly(&self, upload_id: &UploadId) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport::default();

        self.remove_subtree(&self.root.chunks_dir(upload_id), &mut report, true).await;
        self.remove_subtree(&self.root.assembly_dir(upload_id), &mut report, false).await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(upload_id = %upload_id, report = ?report, "tier-1 cleanup finished");
        report
    }

    /// Tier 2: expire the calling user's overdue sessions.
    ///
    /// Called before a new session is accepted. DB-first, files second.
    pub async fn tier2_expire_user_sessions(&self, user_id: &UserId, now: DateTime<Utc>) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport::default();

        match self.sessions.find_expired_for_user(user_id, now).await {
            Ok(expired) => {
                for session in expired {
                    self.expire_one(session.id(), &mut report).await;
                }
            }
            Err(e) => report.record_error("tier-2 expired-session query", e),
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        if report.sessions_expired > 0 {
            info!(user_id = %user_id, expired = report.sessions_expired, "tier-2 expired stale sessions");
        }
        report
    }

    /// Tier 3: global sweep. Runs at startup and on the periodic cadence.
    pub async fn tier3_global(&self, now: DateTime<Utc>) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport::default();

        // Scan 1: expire every overdue in-progress session, DB-first.
        match self.sessions.find_expired(now).await {
            Ok(expired) => {
                for session in expired {
                    self.expire_one(session.id(), &mut report).await;
                }
            }
            Err(e) => report.record_error("tier-3 expired-session query", e),
        }

        // Scan 2: orphan directories not backed by any session row.
        self.sweep_orphans(&mut report).await;

        // Scan 3: residual staging files.
        self.sweep_stale_staging(&mut report).await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            sessions_expired = report.sessions_expired,
            orphans = report.orphans_cleaned,
            assembling = report.assembling_cleaned,
            errors = report.errors.len(),
            elapsed_ms = report.elapsed_ms,
            "tier-3 global cleanup finished"
        );
        report
    }

    /// Marks one session expired (commit) and then removes its directory.
    async fn expire_one(&self, id: &UploadId, report: &mut CleanupReport) {
        if let Err(e) = self.sessions.update_status(id, SessionStatus::Expired).await {
            report.record_error(&format!("expiring session {}", id), e);
            // Files stay; the database still owns the truth.
            return;
        }
        report.sessions_expired += 1;

        let dir = self.root.session_dir(id);
        match tokio::fs::try_exists(&dir).await {
            Ok(true) => self.remove_subtree(&dir, report, false).await,
            Ok(false) => {}
            Err(e) => report.record_error(&format!("checking session dir {}", dir.display()), e),
        }
    }

    /// Removes directories under the root that no session row accounts for
    /// and whose mtime is past the orphan retention window.
    async fn sweep_orphans(&self, report: &mut CleanupReport) {
        let known: Vec<UploadId> = match self.sessions.all_session_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                report.record_error("tier-3 session id listing", e);
                return;
            }
        };

        let mut entries = match tokio::fs::read_dir(self.root.path()).await {
            Ok(entries) => entries,
            Err(e) => {
                report.record_error("tier-3 upload root listing", e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if known.iter().any(|id| id.as_str() == name) {
                continue;
            }
            match self.is_older_than(&path, self.policy.orphan_retention).await {
                Ok(true) => {
                    // Containment re-check before the only recursive delete
                    // driven by scanned (not constructed) paths.
                    match self.root.ensure_contained(&path).await {
                        Ok(resolved) => match tokio::fs::remove_dir_all(&resolved).await {
                            Ok(()) => {
                                report.orphans_cleaned += 1;
                                info!(dir = %resolved.display(), "removed orphan directory");
                            }
                            Err(e) => report.record_error(&format!("removing orphan {}", resolved.display()), e),
                        },
                        Err(e) => report.record_error(&format!("containment check {}", path.display()), e),
                    }
                }
                Ok(false) => {}
                Err(e) => report.record_error(&format!("stat {}", path.display()), e),
            }
        }
    }

    /// Deletes `*.assembling` staging files older than the staging cap.
    async fn sweep_stale_staging(&self, report: &mut CleanupReport) {
        let mut dirs = match tokio::fs::read_dir(self.root.path()).await {
            Ok(entries) => entries,
            Err(e) => {
                report.record_error("tier-3 staging sweep root listing", e);
                return;
            }
        };

        while let Ok(Some(entry)) = dirs.next_entry().await {
            let assembly_dir = entry.path().join("assembly");
            let mut files = match tokio::fs::read_dir(&assembly_dir).await {
                Ok(files) => files,
                // Most entries have no assembly dir; nothing to sweep.
                Err(_) => continue,
            };
            while let Ok(Some(file)) = files.next_entry().await {
                let path = file.path();
                let name = file.file_name().to_string_lossy().into_owned();
                if !name.ends_with(BUNDLE_ASSEMBLING_SUFFIX) {
                    continue;
                }
                match self.is_older_than(&path, self.policy.assembling_max_age).await {
                    Ok(true) => match tokio::fs::remove_file(&path).await {
                        Ok(()) => {
                            report.assembling_cleaned += 1;
                            info!(file = %path.display(), "removed stale staging file");
                        }
                        Err(e) => report.record_error(&format!("removing staging {}", path.display()), e),
                    },
                    Ok(false) => {}
                    Err(e) => report.record_error(&format!("stat {}", path.display()), e),
                }
            }
        }
    }

    /// Fail-open recursive removal, counting chunk files when asked.
    async fn remove_subtree(&self, dir: &Path, report: &mut CleanupReport, count_chunks: bool) {
        match tokio::fs::try_exists(dir).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                report.record_error(&format!("checking {}", dir.display()), e);
                return;
            }
        }

        if count_chunks {
            if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                        report.chunks_deleted += 1;
                    }
                }
            }
        }

        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => report.dirs_deleted += 1,
            Err(e) => report.record_error(&format!("removing {}", dir.display()), e),
        }
    }

    async fn is_older_than(&self, path: &Path, age: Duration) -> Result<bool, std::io::Error> {
        let metadata = tokio::fs::metadata(path).await?;
        let mtime = metadata.modified()?;
        match SystemTime::now().duration_since(mtime) {
            Ok(elapsed) => Ok(elapsed >= age),
            // Future mtime: treat as fresh.
            Err(_) => Ok(false),
        }
    }
}
