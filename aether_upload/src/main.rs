// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Daemon Entry Point
//!
//! Composition root for the upload engine: CLI → configuration → database
//! → storage sandbox → engine wiring → startup cleanup → periodic
//! scheduler → graceful shutdown.
//!
//! The HTTP transport (framing, authentication, rate limiting, idempotency
//! cache) is an external collaborator that consumes [`UploadOrchestrator`]
//! through the library crate; this binary hosts the engine lifecycle
//! around it. The `cleanup` subcommand runs one Tier-3 sweep and exits,
//! for cron-style deployments.

use std::sync::Arc;

use aether_upload::application::UploadOrchestrator;
use aether_upload::infrastructure::assembly::{BundleAssembler, ChunkWriter};
use aether_upload::infrastructure::cleanup::{CleanupEngine, CleanupPolicy, CleanupScheduler};
use aether_upload::infrastructure::dedup::Deduplicator;
use aether_upload::infrastructure::logging::init_tracing;
use aether_upload::infrastructure::repositories::{schema, SqliteJobRepository, SqliteSessionRepository};
use aether_upload::infrastructure::storage::{DiskQuotaGate, UploadRoot};
use aether_upload::infrastructure::verification::IntegrityVerifier;
use aether_upload::EngineConfig;
use aether_upload_bootstrap::{
    bootstrap_cli, create_platform, install_signal_handlers, result_to_exit_code, Commands, Platform,
    ShutdownCoordinator, ValidatedCli,
};
use aether_upload_domain::repositories::{JobRepository, SessionRepository};
use aether_upload_domain::EngineError;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("CLI error: {}", e);
            return std::process::ExitCode::from(65); // EX_DATAERR
        }
    };
    init_tracing(&cli.log_level);
    result_to_exit_code(run(cli).await).into()
}

async fn run(cli: ValidatedCli) -> Result<(), EngineError> {
    let config = EngineConfig::load(cli.config.as_ref())?.with_overrides(cli.upload_root, cli.database_url)?;
    info!(
        upload_root = %config.upload_root.display(),
        cleanup_interval_secs = config.cleanup_interval_secs,
        "engine configuration loaded"
    );

    let platform: Arc<dyn Platform> = Arc::from(create_platform());
    let root = Arc::new(UploadRoot::open(&config.upload_root).await?);
    let pool = connect(&config.database_url).await?;
    schema::ensure_schema(&pool).await?;

    let sessions: Arc<dyn SessionRepository> = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let quota = Arc::new(DiskQuotaGate::new(
        platform.clone(),
        root.path().to_path_buf(),
        config.disk_usage_reject_threshold,
        config.disk_usage_emergency_threshold,
    ));
    let policy = CleanupPolicy {
        orphan_retention: config.orphan_retention(),
        assembling_max_age: config.assembling_max_age(),
    };
    let cleanup = Arc::new(CleanupEngine::new(root.clone(), sessions.clone(), policy));

    match cli.command {
        Commands::Cleanup => {
            let report = cleanup.tier3_global(Utc::now()).await;
            info!(
                sessions_expired = report.sessions_expired,
                orphans = report.orphans_cleaned,
                assembling = report.assembling_cleaned,
                errors = report.errors.len(),
                "one-shot cleanup finished"
            );
            Ok(())
        }
        Commands::Serve => {
            let orchestrator = Arc::new(UploadOrchestrator::new(
                sessions.clone(),
                jobs.clone(),
                root.clone(),
                ChunkWriter::new(root.clone(), platform.clone(), quota.clone()),
                BundleAssembler::new(root.clone(), platform.clone(), quota.clone()),
                IntegrityVerifier::new(root.clone()),
                Deduplicator::new(jobs.clone(), root.clone()),
                cleanup.clone(),
                quota,
            ));
            serve(orchestrator, cleanup, config).await
        }
    }
}

async fn serve(
    orchestrator: Arc<UploadOrchestrator>,
    cleanup: Arc<CleanupEngine>,
    config: EngineConfig,
) -> Result<(), EngineError> {
    // The transport layer mounts the orchestrator; the daemon owns the
    // cleanup cadence and the shutdown choreography.
    let _engine = orchestrator;

    let coordinator = ShutdownCoordinator::default();
    let _signals = install_signal_handlers(coordinator.clone());

    let scheduler = Arc::new(CleanupScheduler::new(cleanup, config.cleanup_interval()));
    let scheduler_task = {
        let scheduler = scheduler.clone();
        let token = coordinator.token();
        tokio::spawn(async move { scheduler.run(token).await })
    };

    info!("upload engine ready");
    coordinator.token().cancelled().await;

    if let Err(e) = scheduler_task.await {
        tracing::warn!("cleanup scheduler task join failed: {}", e);
    }
    coordinator.complete_shutdown();
    info!("upload engine stopped");
    Ok(())
}

async fn connect(database_url: &str) -> Result<SqlitePool, EngineError> {
    let options: SqliteConnectOptions = database_url
        .parse::<SqliteConnectOptions>()
        .map_err(|e| EngineError::InvalidRequest(format!("invalid database url: {}", e)))?
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| EngineError::DatabaseError(format!("cannot open database: {}", e)))
}
