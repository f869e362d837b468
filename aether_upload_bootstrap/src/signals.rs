// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Wires OS termination signals to the [`ShutdownCoordinator`]. On unix
//! SIGTERM, SIGINT, and SIGHUP all initiate graceful shutdown; elsewhere
//! only Ctrl-C is available.

use crate::shutdown::ShutdownCoordinator;

/// Spawns the signal listener task.
///
/// The task runs until the first termination signal arrives, initiates
/// shutdown on the coordinator, then exits. Repeated signals after the
/// first are absorbed by the coordinator's idempotent initiation.
pub fn install_signal_handlers(coordinator: ShutdownCoordinator) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        coordinator.initiate_shutdown();
    })
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to install SIGTERM handler: {}", e);
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to install SIGINT handler: {}", e);
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
        _ = sighup.recv() => tracing::info!("received SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
    } else {
        tracing::info!("received ctrl-c");
    }
}
