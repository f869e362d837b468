// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Windows Platform Implementation
//!
//! Windows API implementation with cross-platform stubs.
//!
//! ## Implementation Notes
//!
//! - **On Windows**: Uses winapi crate for native Windows API calls
//! - **On Unix**: Provides stub implementations for cross-compilation
//! - Windows has no directory fsync; `sync_dir` is a documented no-op and
//!   the atomic-rename durability guarantee is correspondingly weaker.
//!   Production deployments target a single POSIX filesystem.
//!
//! ## Windows APIs Used (when on Windows)
//!
//! - `GetDiskFreeSpaceExW` - Filesystem capacity
//! - `GetSystemInfo` - CPU count and page size
//! - `FlushFileBuffers` via std `sync_all` - File durability

use super::{DiskUsage, Platform, PlatformError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Windows platform implementation
///
/// Provides Windows-specific implementations on Windows,
/// and stub implementations on Unix for cross-compilation.
pub struct WindowsPlatform;

impl WindowsPlatform {
    /// Create a new Windows platform instance
    pub fn new() -> Self {
        Self
    }

    #[cfg(windows)]
    fn disk_usage_impl(path: &Path) -> Result<DiskUsage, PlatformError> {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;
        use winapi::um::winnt::ULARGE_INTEGER;

        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();

        unsafe {
            let mut free_to_caller: ULARGE_INTEGER = std::mem::zeroed();
            let mut total: ULARGE_INTEGER = std::mem::zeroed();
            let mut free: ULARGE_INTEGER = std::mem::zeroed();

            if GetDiskFreeSpaceExW(wide.as_ptr(), &mut free_to_caller, &mut total, &mut free) == 0 {
                return Err(PlatformError::Io(format!(
                    "GetDiskFreeSpaceExW failed: {}",
                    std::io::Error::last_os_error()
                )));
            }

            let total_bytes = *total.QuadPart();
            let free_bytes = *free.QuadPart();
            Ok(DiskUsage {
                total_bytes,
                used_bytes: total_bytes.saturating_sub(free_bytes),
            })
        }
    }

    #[cfg(not(windows))]
    fn disk_usage_impl(_path: &Path) -> Result<DiskUsage, PlatformError> {
        // Stub for cross-compilation
        Err(PlatformError::NotSupported(
            "Windows APIs not available on this platform".to_string(),
        ))
    }

    #[cfg(windows)]
    fn get_page_size_impl() -> usize {
        use std::mem;
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

        unsafe {
            let mut sys_info: SYSTEM_INFO = mem::zeroed();
            GetSystemInfo(&mut sys_info);
            sys_info.dwPageSize as usize
        }
    }

    #[cfg(not(windows))]
    fn get_page_size_impl() -> usize {
        // Stub returns default page size
        4096
    }
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for WindowsPlatform {
    fn platform_name(&self) -> &'static str {
        "windows"
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    fn page_size(&self) -> usize {
        Self::get_page_size_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, PlatformError> {
        Self::disk_usage_impl(path)
    }

    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError> {
        // sync_all maps to FlushFileBuffers on Windows.
        file.sync_all()
            .await
            .map_err(|e| PlatformError::Io(format!("FlushFileBuffers failed: {}", e)))
    }

    async fn sync_dir(&self, _path: &Path) -> Result<(), PlatformError> {
        // Windows has no directory fsync.
        Ok(())
    }
}
