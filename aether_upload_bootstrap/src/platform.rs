// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform Abstraction
//!
//! OS-specific operations behind a trait so the engine's durability and
//! quota logic stays testable and portable.
//!
//! ## Why the engine needs this
//!
//! Two contract obligations bottom out in platform calls:
//!
//! - **Durability**: "durable" means file fsync plus directory fsync of the
//!   containing directory. On macOS a plain `fsync(2)` only reaches the
//!   drive cache, so `sync_file` issues `F_FULLFSYNC` there; Windows has no
//!   directory fsync and `sync_dir` is a documented no-op.
//! - **Disk quota**: every mutating operation consults `disk_usage` before
//!   writing; the gate fails closed when the filesystem cannot be stat'ed.
//!
//! ## Platform selection
//!
//! Compile-time: `UnixPlatform` (libc) on unix targets, `WindowsPlatform`
//! (winapi) on windows, each with cross-compilation stubs on the other.

pub mod unix;
pub mod windows;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use unix::UnixPlatform;
pub use windows::WindowsPlatform;

/// Platform operation errors
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Operation not supported on this platform: {0}")]
    NotSupported(String),

    #[error("Platform IO error: {0}")]
    Io(String),

    #[error("Platform error: {0}")]
    Other(String),
}

/// Snapshot of filesystem capacity at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Total bytes on the filesystem holding the path.
    pub total_bytes: u64,
    /// Bytes currently in use.
    pub used_bytes: u64,
}

impl DiskUsage {
    /// Used fraction in `[0.0, 1.0]`; zero-capacity filesystems report 1.0
    /// so the quota gate fails closed.
    pub fn used_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64
    }
}

/// Platform abstraction trait for OS-specific operations
///
/// Implementations must be thread-safe; the trait object is shared across
/// all request handlers and the cleanup scheduler.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Human-readable platform name
    fn platform_name(&self) -> &'static str;

    /// Number of logical CPUs
    fn cpu_count(&self) -> usize;

    /// Memory page size in bytes
    fn page_size(&self) -> usize;

    /// System temporary directory
    fn temp_dir(&self) -> PathBuf;

    /// Capacity snapshot of the filesystem containing `path`
    ///
    /// # Errors
    /// Returns error when the filesystem cannot be stat'ed; callers must
    /// treat that as quota-exceeded (fail closed).
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, PlatformError>;

    /// Flush a file's data to durable storage
    ///
    /// On macOS this issues `F_FULLFSYNC` (plain fsync stops at the drive
    /// cache); elsewhere it is a data fsync.
    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError>;

    /// Flush a directory's metadata to durable storage
    ///
    /// Required after rename to persist the directory entry. No-op on
    /// Windows, which has no directory fsync.
    async fn sync_dir(&self, path: &Path) -> Result<(), PlatformError>;
}

// === Platform Selection ===

#[cfg(unix)]
type PlatformImpl = UnixPlatform;

#[cfg(windows)]
type PlatformImpl = WindowsPlatform;

/// Create the platform-specific implementation for the current OS.
pub fn create_platform() -> Box<dyn Platform> {
    Box::new(PlatformImpl::new())
}
