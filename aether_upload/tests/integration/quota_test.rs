// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Disk-quota gating across the write paths.

use aether_upload_domain::ApiErrorCode;

use super::common::{create_request, engine, headers_for, user};

#[tokio::test]
async fn test_create_session_rejected_above_threshold() {
    let fx = engine().await;
    fx.platform.set_used_percent(90);

    let err = fx
        .orchestrator
        .create_session(&user("alice"), create_request(b"data", 1))
        .await
        .unwrap_err();

    // Retry-later on the wire (closed code set); retryable internally.
    assert!(err.is_retryable());
    let resp = err.to_response();
    assert_eq!(resp.http_status, 429);
    assert_eq!(resp.code, ApiErrorCode::RateLimited);
}

#[tokio::test]
async fn test_upload_chunk_rejected_when_disk_fills_mid_session() {
    let fx = engine().await;
    let alice = user("alice");
    let chunk = vec![1u8; 128];

    let created = fx
        .orchestrator
        .create_session(&alice, create_request(&chunk, 1))
        .await
        .unwrap();

    // Disk fills between session creation and the chunk write.
    fx.platform.set_used_percent(88);
    let err = fx
        .orchestrator
        .upload_chunk(&alice, &created.upload_id, &headers_for(0, &chunk), &chunk)
        .await
        .unwrap_err();
    assert_eq!(err.to_response().http_status, 429);

    // Space freed: the same request succeeds.
    fx.platform.set_used_percent(40);
    fx.orchestrator
        .upload_chunk(&alice, &created.upload_id, &headers_for(0, &chunk), &chunk)
        .await
        .unwrap();
}
