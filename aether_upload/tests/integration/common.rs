// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures: a fully wired engine over a temp directory and an
//! in-memory SQLite database, with a controllable platform stub for the
//! disk-quota paths.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aether_upload::application::commands::{ChunkUploadHeaders, CreateSessionRequest};
use aether_upload::application::UploadOrchestrator;
use aether_upload::infrastructure::assembly::{BundleAssembler, ChunkWriter};
use aether_upload::infrastructure::cleanup::{CleanupEngine, CleanupPolicy};
use aether_upload::infrastructure::dedup::Deduplicator;
use aether_upload::infrastructure::repositories::{schema, SqliteJobRepository, SqliteSessionRepository};
use aether_upload::infrastructure::storage::{DiskQuotaGate, UploadRoot};
use aether_upload::infrastructure::verification::IntegrityVerifier;
use aether_upload_bootstrap::{DiskUsage, Platform, PlatformError};
use aether_upload_domain::repositories::{JobRepository, SessionRepository};
use aether_upload_domain::value_objects::{BundleHash, UserId};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Platform stub with an adjustable used-percentage and real fsync
/// semantics (data fsync; the macOS barrier is irrelevant to tests).
pub struct TestPlatform {
    used_percent: AtomicU64,
}

impl TestPlatform {
    pub fn new(used_percent: u64) -> Self {
        Self {
            used_percent: AtomicU64::new(used_percent),
        }
    }

    pub fn set_used_percent(&self, percent: u64) {
        self.used_percent.store(percent, Ordering::SeqCst);
    }
}

#[async_trait]
impl Platform for TestPlatform {
    fn platform_name(&self) -> &'static str {
        "test"
    }

    fn cpu_count(&self) -> usize {
        1
    }

    fn page_size(&self) -> usize {
        4096
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn disk_usage(&self, _path: &Path) -> Result<DiskUsage, PlatformError> {
        Ok(DiskUsage {
            total_bytes: 100,
            used_bytes: self.used_percent.load(Ordering::SeqCst),
        })
    }

    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError> {
        file.sync_data()
            .await
            .map_err(|e| PlatformError::Io(e.to_string()))
    }

    async fn sync_dir(&self, path: &Path) -> Result<(), PlatformError> {
        let dir = tokio::fs::File::open(path)
            .await
            .map_err(|e| PlatformError::Io(e.to_string()))?;
        dir.sync_all().await.map_err(|e| PlatformError::Io(e.to_string()))
    }
}

/// A fully wired engine over throwaway storage.
pub struct TestEngine {
    pub _guard: tempfile::TempDir,
    pub root: Arc<UploadRoot>,
    pub pool: SqlitePool,
    pub platform: Arc<TestPlatform>,
    pub sessions: Arc<dyn SessionRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub cleanup: Arc<CleanupEngine>,
    pub orchestrator: UploadOrchestrator,
}

pub async fn engine() -> TestEngine {
    engine_with(10, CleanupPolicy::default()).await
}

pub async fn engine_with(used_percent: u64, policy: CleanupPolicy) -> TestEngine {
    let guard = tempfile::tempdir().unwrap();
    let root = Arc::new(UploadRoot::open(guard.path()).await.unwrap());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    schema::ensure_schema(&pool).await.unwrap();

    let platform = Arc::new(TestPlatform::new(used_percent));
    let platform_dyn: Arc<dyn Platform> = platform.clone();
    let sessions: Arc<dyn SessionRepository> = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let quota = Arc::new(DiskQuotaGate::new(
        platform_dyn.clone(),
        root.path().to_path_buf(),
        0.85,
        0.95,
    ));
    let cleanup = Arc::new(CleanupEngine::new(root.clone(), sessions.clone(), policy));

    let orchestrator = UploadOrchestrator::new(
        sessions.clone(),
        jobs.clone(),
        root.clone(),
        ChunkWriter::new(root.clone(), platform_dyn.clone(), quota.clone()),
        BundleAssembler::new(root.clone(), platform_dyn.clone(), quota.clone()),
        IntegrityVerifier::new(root.clone()),
        Deduplicator::new(jobs.clone(), root.clone()),
        cleanup.clone(),
        quota,
    );

    TestEngine {
        _guard: guard,
        root,
        pool,
        platform,
        sessions,
        jobs,
        cleanup,
        orchestrator,
    }
}

pub fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

pub fn create_request(bundle: &[u8], chunk_count: u32) -> CreateSessionRequest {
    CreateSessionRequest {
        capture_source: "aether_camera".to_string(),
        bundle_hash: BundleHash::digest(bundle).to_hex(),
        bundle_size: bundle.len() as u64,
        chunk_count,
        capture_session_id: "capture-1".to_string(),
        device_info: None,
        idempotency_key: None,
        schema_version: None,
    }
}

pub fn headers_for(index: u32, body: &[u8]) -> ChunkUploadHeaders {
    ChunkUploadHeaders {
        content_length: Some(body.len().to_string()),
        chunk_index: Some(index.to_string()),
        chunk_hash: Some(BundleHash::digest(body).to_hex()),
    }
}

/// Inserts a raw job row, bypassing publication (dedup fixtures).
pub async fn insert_job(pool: &SqlitePool, user: &str, bundle: &BundleHash, state: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO jobs (id, user_id, bundle_hash, state, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(user)
        .bind(bundle.to_hex())
        .bind(state)
        .bind(chrono::Utc::now())
        .execute(pool)
        .await
        .unwrap();
    id
}
