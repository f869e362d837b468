// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end upload lifecycle: session creation, chunk ingestion,
//! completion, and the externally visible failure shapes.

use aether_upload::application::commands::{ChunkStatus, CompleteSessionRequest};
use aether_upload_domain::repositories::{JobRepository, SessionRepository};
use aether_upload_domain::value_objects::BundleHash;
use aether_upload_domain::{ApiErrorCode, EngineError, JobState, SessionStatus};
use sha2::{Digest, Sha256};

use super::common::{create_request, engine, headers_for, user};

fn complete_request(bundle: &[u8]) -> CompleteSessionRequest {
    CompleteSessionRequest {
        bundle_hash: BundleHash::digest(bundle).to_hex(),
        schema_version: None,
    }
}

#[tokio::test]
async fn test_happy_path_small_bundle() {
    let fx = engine().await;
    let alice = user("alice");

    let chunk0 = vec![0xA5u8; 1024];
    let chunk1 = vec![0x5Au8; 1024];
    let bundle: Vec<u8> = [chunk0.clone(), chunk1.clone()].concat();

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 2))
        .await
        .unwrap();
    assert_eq!(created.status, "in_progress");
    assert_eq!(created.chunk_size, Some(5 * 1024 * 1024));
    let upload_id = created.upload_id.clone();

    let r0 = fx
        .orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(0, &chunk0), &chunk0)
        .await
        .unwrap();
    assert_eq!(r0.chunk_status, ChunkStatus::Stored);
    assert_eq!(r0.total_received, 1);

    let r1 = fx
        .orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(1, &chunk1), &chunk1)
        .await
        .unwrap();
    assert_eq!(r1.total_received, 2);
    assert_eq!(r1.total_chunks, 2);

    let completed = fx
        .orchestrator
        .complete_session(&alice, &upload_id, complete_request(&bundle))
        .await
        .unwrap();
    assert_eq!(completed.status, "completed");
    assert!(!completed.job_id.is_empty());

    // The bundle file exists, has the declared size, and hashes to the
    // declared bundle hash.
    let bundle_hash = BundleHash::digest(&bundle);
    let bundle_path = fx.root.bundle_file(&bundle_hash);
    let on_disk = tokio::fs::read(&bundle_path).await.unwrap();
    assert_eq!(on_disk.len(), 2048);
    let digest: [u8; 32] = Sha256::digest(&on_disk).into();
    assert_eq!(hex::encode(digest), bundle_hash.to_hex());

    // No staging residue alongside the committed bundle.
    let upload_id_parsed = aether_upload_domain::value_objects::UploadId::parse(&upload_id).unwrap();
    assert!(!fx.root.staging_file(&upload_id_parsed, &bundle_hash).exists());

    // The job was published queued with its initial timeline event.
    let job = fx.jobs.find_job(&completed.job_id).await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Queued);
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_events WHERE job_id = ?")
        .bind(&completed.job_id)
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(events, 1);

    let session = fx.sessions.find_session(&upload_id_parsed).await.unwrap().unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn test_chunk_hash_mismatch_rejected_with_400_and_no_file() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk0 = vec![1u8; 512];
    let chunk1 = vec![2u8; 512];
    let bundle: Vec<u8> = [chunk0.clone(), chunk1.clone()].concat();

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 2))
        .await
        .unwrap();
    let upload_id = created.upload_id;

    fx.orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(0, &chunk0), &chunk0)
        .await
        .unwrap();

    // Declared hash belongs to different content.
    let mut bad_headers = headers_for(1, &chunk1);
    bad_headers.chunk_hash = Some(BundleHash::digest(b"not chunk1").to_hex());
    let err = fx
        .orchestrator
        .upload_chunk(&alice, &upload_id, &bad_headers, &chunk1)
        .await
        .unwrap_err();

    let resp = err.to_response();
    assert_eq!(resp.http_status, 400);
    assert_eq!(resp.code, ApiErrorCode::InvalidRequest);

    // No chunk file 1 on disk, and no row either.
    let upload_id_parsed = aether_upload_domain::value_objects::UploadId::parse(&upload_id).unwrap();
    let chunks_dir = fx.root.chunks_dir(&upload_id_parsed);
    let names: Vec<String> = std::fs::read_dir(&chunks_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["000000.chunk".to_string()]);
}

#[tokio::test]
async fn test_duplicate_chunk_idempotence_and_conflict() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk0 = vec![3u8; 256];
    let chunk1 = vec![4u8; 256];
    let bundle: Vec<u8> = [chunk0.clone(), chunk1.clone()].concat();

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 2))
        .await
        .unwrap();
    let upload_id = created.upload_id;

    fx.orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(0, &chunk0), &chunk0)
        .await
        .unwrap();

    // Identical re-upload: already_present, still one file.
    let again = fx
        .orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(0, &chunk0), &chunk0)
        .await
        .unwrap();
    assert_eq!(again.chunk_status, ChunkStatus::AlreadyPresent);
    assert_eq!(again.total_received, 1);

    let upload_id_parsed = aether_upload_domain::value_objects::UploadId::parse(&upload_id).unwrap();
    let files = std::fs::read_dir(fx.root.chunks_dir(&upload_id_parsed)).unwrap().count();
    assert_eq!(files, 1);

    // Same index, different bytes: 409.
    let err = fx
        .orchestrator
        .upload_chunk(&alice, &upload_id, &headers_for(0, &chunk1), &chunk1)
        .await
        .unwrap_err();
    let resp = err.to_response();
    assert_eq!(resp.http_status, 409);
    assert_eq!(resp.code, ApiErrorCode::StateConflict);
}

#[tokio::test]
async fn test_missing_chunks_on_completion_names_the_gap() {
    let fx = engine().await;
    let alice = user("alice");
    let chunks: Vec<Vec<u8>> = vec![vec![1u8; 64], vec![2u8; 64], vec![3u8; 64]];
    let bundle: Vec<u8> = chunks.concat();

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&bundle, 3))
        .await
        .unwrap();
    let upload_id = created.upload_id;

    for i in [0usize, 2] {
        fx.orchestrator
            .upload_chunk(&alice, &upload_id, &headers_for(i as u32, &chunks[i]), &chunks[i])
            .await
            .unwrap();
    }

    let err = fx
        .orchestrator
        .complete_session(&alice, &upload_id, complete_request(&bundle))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingChunks(ref m) if m == &vec![1]));

    let resp = err.to_response();
    assert_eq!(resp.http_status, 400);
    assert_eq!(resp.details.unwrap()["missing"], serde_json::json!([1]));

    // Chunks are retained so the client can resume.
    let listing = fx.orchestrator.list_chunks(&alice, &upload_id).await.unwrap();
    assert_eq!(listing.received_chunks, vec![0, 2]);
    assert_eq!(listing.missing_chunks, vec![1]);
}

#[tokio::test]
async fn test_cross_user_access_is_unified_404() {
    let fx = engine().await;
    let alice = user("alice");
    let mallory = user("mallory");
    let chunk = vec![9u8; 128];

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&chunk, 1))
        .await
        .unwrap();

    // Someone else's session and a nonexistent session are
    // indistinguishable.
    let foreign = fx
        .orchestrator
        .upload_chunk(&mallory, &created.upload_id, &headers_for(0, &chunk), &chunk)
        .await
        .unwrap_err();
    let ghost = fx
        .orchestrator
        .upload_chunk(&mallory, "does-not-exist", &headers_for(0, &chunk), &chunk)
        .await
        .unwrap_err();

    let foreign_resp = foreign.to_response();
    let ghost_resp = ghost.to_response();
    assert_eq!(foreign_resp.http_status, 404);
    assert_eq!(ghost_resp.http_status, 404);
    assert_eq!(foreign_resp.message, ghost_resp.message);
}

#[tokio::test]
async fn test_header_validation_shapes() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk = vec![7u8; 64];

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&chunk, 1))
        .await
        .unwrap();
    let upload_id = created.upload_id;

    // Missing Content-Length.
    let mut h = headers_for(0, &chunk);
    h.content_length = None;
    let err = fx.orchestrator.upload_chunk(&alice, &upload_id, &h, &chunk).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);

    // Declared length disagrees with the body.
    let mut h = headers_for(0, &chunk);
    h.content_length = Some("63".to_string());
    let err = fx.orchestrator.upload_chunk(&alice, &upload_id, &h, &chunk).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);

    // Oversized declaration: 413 before the body is considered.
    let mut h = headers_for(0, &chunk);
    h.content_length = Some((6 * 1024 * 1024u64).to_string());
    let err = fx.orchestrator.upload_chunk(&alice, &upload_id, &h, &chunk).await.unwrap_err();
    let resp = err.to_response();
    assert_eq!(resp.http_status, 413);
    assert_eq!(resp.code, ApiErrorCode::PayloadTooLarge);

    // Out-of-range index.
    let mut h = headers_for(5, &chunk);
    h.content_length = Some(chunk.len().to_string());
    let err = fx.orchestrator.upload_chunk(&alice, &upload_id, &h, &chunk).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);
}

#[tokio::test]
async fn test_create_session_validation() {
    let fx = engine().await;
    let alice = user("alice");

    // Wrong capture source.
    let mut req = create_request(b"data", 1);
    req.capture_source = "webcam".to_string();
    let err = fx.orchestrator.create_session(&alice, req).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);

    // Oversized bundle declaration.
    let mut req = create_request(b"data", 1);
    req.bundle_size = 500 * 1024 * 1024 + 1;
    let err = fx.orchestrator.create_session(&alice, req).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);

    // Chunk count above the cap.
    let mut req = create_request(b"data", 1);
    req.chunk_count = 201;
    let err = fx.orchestrator.create_session(&alice, req).await.unwrap_err();
    assert_eq!(err.to_response().http_status, 400);

    // Active-session cap of one.
    fx.orchestrator
        .create_session(&alice, create_request(b"first", 1))
        .await
        .unwrap();
    let err = fx
        .orchestrator
        .create_session(&alice, create_request(b"second", 1))
        .await
        .unwrap_err();
    let resp = err.to_response();
    assert_eq!(resp.http_status, 409);
    assert_eq!(resp.code, ApiErrorCode::StateConflict);
}

#[tokio::test]
async fn test_declared_hash_mismatch_at_completion() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk = vec![8u8; 64];

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&chunk, 1))
        .await
        .unwrap();
    fx.orchestrator
        .upload_chunk(&alice, &created.upload_id, &headers_for(0, &chunk), &chunk)
        .await
        .unwrap();

    let err = fx
        .orchestrator
        .complete_session(&alice, &created.upload_id, complete_request(b"some other bundle"))
        .await
        .unwrap_err();
    let resp = err.to_response();
    assert_eq!(resp.http_status, 409);
    assert_eq!(resp.code, ApiErrorCode::StateConflict);
}
