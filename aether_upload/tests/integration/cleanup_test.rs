// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Three-tier cleanup: post-assembly residue, per-user expiry ordering,
//! orphan and staging sweeps, idempotence, and crash recovery.

use std::time::Duration;

use aether_upload::application::commands::CompleteSessionRequest;
use aether_upload::infrastructure::cleanup::CleanupPolicy;
use aether_upload_domain::repositories::SessionRepository;
use aether_upload_domain::value_objects::{BundleHash, ChunkCount, UploadId, UserId};
use aether_upload_domain::{SessionStatus, UploadSession};
use chrono::{Duration as ChronoDuration, Utc};

use super::common::{create_request, engine, engine_with, headers_for, user};

/// Policy where both sweeps fire immediately; ages become irrelevant.
fn sweep_everything() -> CleanupPolicy {
    CleanupPolicy {
        orphan_retention: Duration::ZERO,
        assembling_max_age: Duration::ZERO,
    }
}

/// Saves a session row that expired in the past, with on-disk residue.
async fn seed_expired_session(fx: &super::common::TestEngine, owner: &str) -> UploadId {
    let created_at = Utc::now() - ChronoDuration::hours(30);
    let session = UploadSession::new(
        UserId::new(owner).unwrap(),
        "capture".to_string(),
        BundleHash::digest(b"stale"),
        64,
        ChunkCount::new(1).unwrap(),
        created_at,
    );
    fx.sessions.save_session(&session).await.unwrap();
    tokio::fs::create_dir_all(fx.root.chunks_dir(session.id())).await.unwrap();
    tokio::fs::write(
        fx.root.chunks_dir(session.id()).join("000000.chunk"),
        b"stale bytes",
    )
    .await
    .unwrap();
    session.id().clone()
}

#[tokio::test]
async fn test_tier1_removes_residue_but_keeps_bundle() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk = vec![0x11u8; 256];
    let hash = BundleHash::digest(&chunk);

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&chunk, 1))
        .await
        .unwrap();
    fx.orchestrator
        .upload_chunk(&alice, &created.upload_id, &headers_for(0, &chunk), &chunk)
        .await
        .unwrap();
    fx.orchestrator
        .complete_session(
            &alice,
            &created.upload_id,
            CompleteSessionRequest {
                bundle_hash: hash.to_hex(),
                schema_version: None,
            },
        )
        .await
        .unwrap();

    // Completion ran Tier-1 synchronously: chunks and staging are gone,
    // the content-addressed bundle stays.
    let id = UploadId::parse(&created.upload_id).unwrap();
    assert!(!fx.root.chunks_dir(&id).exists());
    assert!(!fx.root.assembly_dir(&id).exists());
    assert!(fx.root.bundle_file(&hash).exists());
}

#[tokio::test]
async fn test_tier2_expires_db_first_then_files_on_create() {
    let fx = engine().await;
    let stale_id = seed_expired_session(&fx, "alice").await;

    // The next create for the same user runs Tier-2 first, so the stale
    // session no longer blocks the active-session cap.
    let resp = fx
        .orchestrator
        .create_session(&user("alice"), create_request(b"fresh bundle", 1))
        .await
        .unwrap();
    assert_eq!(resp.status, "in_progress");

    let stale = fx.sessions.find_session(&stale_id).await.unwrap().unwrap();
    assert_eq!(stale.status(), SessionStatus::Expired);
    assert!(!fx.root.session_dir(&stale_id).exists());
}

#[tokio::test]
async fn test_tier3_expires_overdue_sessions() {
    let fx = engine().await;
    let stale_id = seed_expired_session(&fx, "carol").await;

    let report = fx.cleanup.tier3_global(Utc::now()).await;
    assert_eq!(report.sessions_expired, 1);
    assert!(report.errors.is_empty());

    let stale = fx.sessions.find_session(&stale_id).await.unwrap().unwrap();
    assert_eq!(stale.status(), SessionStatus::Expired);
    assert!(!fx.root.session_dir(&stale_id).exists());
}

#[tokio::test]
async fn test_tier3_orphan_sweep_respects_session_rows() {
    let fx = engine_with(10, sweep_everything()).await;

    // A ghost directory with no session row.
    let ghost = fx.root.path().join("ghost-1");
    tokio::fs::create_dir_all(ghost.join("chunks")).await.unwrap();
    tokio::fs::write(ghost.join("chunks/000000.chunk"), b"orphaned").await.unwrap();

    // A directory backed by a session row must survive even past
    // retention.
    let session = UploadSession::new(
        UserId::new("dave").unwrap(),
        "capture".to_string(),
        BundleHash::digest(b"live"),
        1,
        ChunkCount::new(1).unwrap(),
        Utc::now(),
    );
    fx.sessions.save_session(&session).await.unwrap();
    tokio::fs::create_dir_all(fx.root.session_dir(session.id())).await.unwrap();

    let report = fx.cleanup.tier3_global(Utc::now()).await;
    assert_eq!(report.orphans_cleaned, 1);
    assert!(!ghost.exists());
    assert!(fx.root.session_dir(session.id()).exists());
}

#[tokio::test]
async fn test_tier3_fresh_orphans_survive_retention() {
    // Default 48h retention: a fresh ghost stays.
    let fx = engine().await;
    let ghost = fx.root.path().join("ghost-fresh");
    tokio::fs::create_dir_all(&ghost).await.unwrap();

    let report = fx.cleanup.tier3_global(Utc::now()).await;
    assert_eq!(report.orphans_cleaned, 0);
    assert!(ghost.exists());
}

#[tokio::test]
async fn test_tier3_sweeps_stale_staging_crash_recovery() {
    // Simulated crash: a .assembling file exists, rename never happened.
    let fx = engine_with(10, sweep_everything()).await;

    let session = UploadSession::new(
        UserId::new("erin").unwrap(),
        "capture".to_string(),
        BundleHash::digest(b"crashed"),
        1,
        ChunkCount::new(1).unwrap(),
        Utc::now(),
    );
    fx.sessions.save_session(&session).await.unwrap();
    let staging = fx.root.staging_file(session.id(), session.bundle_hash());
    tokio::fs::create_dir_all(staging.parent().unwrap()).await.unwrap();
    tokio::fs::write(&staging, b"partial bundle bytes").await.unwrap();

    let report = fx.cleanup.tier3_global(Utc::now()).await;
    assert_eq!(report.assembling_cleaned, 1);
    assert!(!staging.exists());
    // The session directory itself survives until expiry.
    assert!(fx.root.session_dir(session.id()).exists());
    // No bundle was ever committed.
    assert!(!fx.root.bundle_file(session.bundle_hash()).exists());
}

#[tokio::test]
async fn test_tier3_is_idempotent() {
    let fx = engine_with(10, sweep_everything()).await;
    seed_expired_session(&fx, "frank").await;
    let ghost = fx.root.path().join("ghost-2");
    tokio::fs::create_dir_all(&ghost).await.unwrap();

    let first = fx.cleanup.tier3_global(Utc::now()).await;
    assert!(first.sessions_expired + first.orphans_cleaned > 0);

    let second = fx.cleanup.tier3_global(Utc::now()).await;
    assert_eq!(second.sessions_expired, 0);
    assert_eq!(second.orphans_cleaned, 0);
    assert_eq!(second.assembling_cleaned, 0);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn test_tier1_is_fail_open_on_missing_dirs() {
    let fx = engine().await;
    let id = UploadId::parse("never-existed").unwrap();
    let report = fx.cleanup.tier1_post_assembly(&id).await;
    assert_eq!(report.dirs_deleted, 0);
    assert!(report.errors.is_empty());
}
