// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unix Platform Implementation
//!
//! POSIX implementation backed by libc, with cross-compilation stubs for
//! non-unix targets.
//!
//! ## POSIX APIs Used (when on Unix)
//!
//! - `statvfs(3)` - filesystem capacity for the disk-quota gate
//! - `fcntl(F_FULLFSYNC)` - full durability barrier on macOS
//! - `fsync`/`fdatasync` via std - file and directory durability
//! - `sysconf(3)` - page size

use super::{DiskUsage, Platform, PlatformError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Unix platform implementation
pub struct UnixPlatform;

impl UnixPlatform {
    /// Create a new Unix platform instance
    pub fn new() -> Self {
        Self
    }

    #[cfg(unix)]
    fn disk_usage_impl(path: &Path) -> Result<DiskUsage, PlatformError> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| PlatformError::Other("path contains interior NUL".to_string()))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(PlatformError::Io(format!(
                "statvfs failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        let frsize = stat.f_frsize as u64;
        let total = (stat.f_blocks as u64).saturating_mul(frsize);
        let free = (stat.f_bfree as u64).saturating_mul(frsize);
        Ok(DiskUsage {
            total_bytes: total,
            used_bytes: total.saturating_sub(free),
        })
    }

    #[cfg(not(unix))]
    fn disk_usage_impl(_path: &Path) -> Result<DiskUsage, PlatformError> {
        // Stub for cross-compilation
        Err(PlatformError::NotSupported(
            "POSIX APIs not available on this platform".to_string(),
        ))
    }

    #[cfg(unix)]
    fn page_size_impl() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    #[cfg(not(unix))]
    fn page_size_impl() -> usize {
        4096
    }
}

impl Default for UnixPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for UnixPlatform {
    fn platform_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "macos"
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            "unix"
        }
        #[cfg(not(unix))]
        {
            "unix-stub"
        }
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    fn page_size(&self) -> usize {
        Self::page_size_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, PlatformError> {
        Self::disk_usage_impl(path)
    }

    #[cfg(target_os = "macos")]
    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError> {
        use std::os::fd::AsRawFd;

        // fsync on macOS only reaches the drive cache; F_FULLFSYNC forces
        // the drive to flush to permanent storage.
        let fd = file.as_raw_fd();
        let rc = tokio::task::spawn_blocking(move || unsafe { libc::fcntl(fd, libc::F_FULLFSYNC) })
            .await
            .map_err(|e| PlatformError::Other(format!("sync task join failed: {}", e)))?;
        if rc == -1 {
            return Err(PlatformError::Io(format!(
                "F_FULLFSYNC failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError> {
        file.sync_data()
            .await
            .map_err(|e| PlatformError::Io(format!("fdatasync failed: {}", e)))
    }

    async fn sync_dir(&self, path: &Path) -> Result<(), PlatformError> {
        let dir = tokio::fs::File::open(path)
            .await
            .map_err(|e| PlatformError::Io(format!("open dir for fsync failed: {}", e)))?;
        dir.sync_all()
            .await
            .map_err(|e| PlatformError::Io(format!("dir fsync failed: {}", e)))
    }
}
