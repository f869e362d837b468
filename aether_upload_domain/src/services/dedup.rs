// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Deduplication Decision Values
//!
//! Immutable outcomes of the three dedup paths. The lookup key is always
//! `(bundle_hash, user_id)`; dedup never returns another user's job even
//! for identical content. That is a privacy contract, not a performance
//! optimization, and it is enforced by the repository query shape rather
//! than by filtering here.

use serde::{Deserialize, Serialize};

/// What the caller should do with the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupDecision {
    /// No live duplicate; continue the normal path.
    Proceed,
    /// Pre-upload match; the client need not upload at all.
    InstantUpload,
    /// Post-assembly match; the fresh bundle was discarded in favor of the
    /// existing job.
    ReuseBundle,
}

/// Immutable result of a dedup check.
///
/// Fields are private and there are no mutators; once constructed the
/// outcome cannot be altered by later pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupOutcome {
    decision: DedupDecision,
    existing_job_id: Option<String>,
    message: String,
}

impl DedupOutcome {
    /// No duplicate found.
    pub fn proceed() -> Self {
        Self {
            decision: DedupDecision::Proceed,
            existing_job_id: None,
            message: "no live duplicate".to_string(),
        }
    }

    /// Pre-upload duplicate found.
    pub fn instant_upload(existing_job_id: impl Into<String>) -> Self {
        Self {
            decision: DedupDecision::InstantUpload,
            existing_job_id: Some(existing_job_id.into()),
            message: "identical bundle already processed for this user".to_string(),
        }
    }

    /// Post-assembly duplicate found.
    pub fn reuse_bundle(existing_job_id: impl Into<String>) -> Self {
        Self {
            decision: DedupDecision::ReuseBundle,
            existing_job_id: Some(existing_job_id.into()),
            message: "concurrent upload of identical bundle won the race".to_string(),
        }
    }

    pub fn decision(&self) -> DedupDecision {
        self.decision
    }

    pub fn existing_job_id(&self) -> Option<&str> {
        self.existing_job_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the upload should not proceed to publication.
    pub fn is_duplicate(&self) -> bool {
        self.decision != DedupDecision::Proceed
    }
}
