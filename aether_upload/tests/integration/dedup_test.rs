// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Deduplication paths: instant upload, post-assembly reuse, user scoping,
//! and the non-blocking job states.

use aether_upload::application::commands::CompleteSessionRequest;
use aether_upload_domain::value_objects::BundleHash;

use super::common::{create_request, engine, headers_for, insert_job, user};

#[tokio::test]
async fn test_instant_upload_when_live_job_exists() {
    let fx = engine().await;
    let alice = user("alice");
    let bundle = b"already processed bundle".to_vec();
    let hash = BundleHash::digest(&bundle);

    let existing = insert_job(&fx.pool, "alice", &hash, "completed").await;

    let resp = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 1))
        .await
        .unwrap();
    assert_eq!(resp.upload_id, "instant");
    assert_eq!(resp.status, "completed");
    assert_eq!(resp.job_id, Some(existing.clone()));
    assert!(resp.upload_url.is_none());

    // Idempotence law: every call short-circuits the same way.
    let again = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 1))
        .await
        .unwrap();
    assert_eq!(again.job_id, Some(existing));
}

#[tokio::test]
async fn test_dead_job_states_do_not_block_reupload() {
    let fx = engine().await;
    let alice = user("alice");
    let bundle = b"bundle with a failed history".to_vec();
    let hash = BundleHash::digest(&bundle);

    for state in ["failed", "cancelled", "pending", "uploading", "packaging", "capacity_saturated"] {
        insert_job(&fx.pool, "alice", &hash, state).await;
    }

    let resp = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 1))
        .await
        .unwrap();
    assert_eq!(resp.status, "in_progress");
    assert!(resp.job_id.is_none());
}

#[tokio::test]
async fn test_dedup_never_crosses_users() {
    let fx = engine().await;
    let bob = user("bob");
    let bundle = b"identical content, different owner".to_vec();
    let hash = BundleHash::digest(&bundle);

    // Alice already processed identical content.
    insert_job(&fx.pool, "alice", &hash, "completed").await;

    // Bob still uploads from scratch; Alice's job never leaks.
    let resp = fx
        .orchestrator
        .create_session(&bob, create_request(&bundle, 1))
        .await
        .unwrap();
    assert_eq!(resp.status, "in_progress");
    assert!(resp.job_id.is_none());
}

#[tokio::test]
async fn test_post_assembly_reuse_discards_fresh_bundle() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk = vec![0xEEu8; 512];
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

    // A concurrent identical upload wins the race between our path-1
    // check and our completion.
    let winner = insert_job(&fx.pool, "alice", &hash, "queued").await;

    let completed = fx
        .orchestrator
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

    // The existing job is reused and the freshly assembled bundle is gone.
    assert_eq!(completed.job_id, winner);
    assert!(!fx.root.bundle_file(&hash).exists());

    // Exactly one job row for the key.
    let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE bundle_hash = ? AND user_id = 'alice'")
        .bind(hash.to_hex())
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(jobs, 1);
}
