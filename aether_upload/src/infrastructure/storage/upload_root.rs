// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Root Sandbox
//!
//! Every path the engine touches is built here, from validated value
//! objects, under one canonicalized root. Two layers enforce containment:
//!
//! 1. **Component guard**: path components come only from `UploadId`,
//!    `ChunkIndex`, and `BundleHash` values, whose constructors reject
//!    anything outside their character contracts. Raw strings never reach a
//!    join.
//! 2. **Resolved-path check**: before any destructive operation on a path
//!    that already exists on disk, [`UploadRoot::ensure_contained`]
//!    canonicalizes it and verifies the prefix against the canonical root.
//!    The first layer cannot see symlinks or mount tricks; this one can.
//!
//! ## On-disk layout
//!
//! ```text
//! <upload_root>/
//!   <upload_id>/
//!     chunks/
//!       000000.chunk          // final
//!       000001.chunk.tmp      // transient
//!     assembly/
//!       <bundle_hash>.bundle.assembling   // transient
//!   <bundle_hash>.bundle       // final, content-addressed
//! ```

use std::path::{Path, PathBuf};

use aether_upload_domain::value_objects::{BundleHash, ChunkIndex, UploadId};
use aether_upload_domain::EngineError;

/// Directory name for a session's chunk files.
const CHUNKS_DIR: &str = "chunks";

/// Directory name for a session's assembly staging.
const ASSEMBLY_DIR: &str = "assembly";

/// Canonicalized root of all upload storage.
#[derive(Debug, Clone)]
pub struct UploadRoot {
    root: PathBuf,
}

impl UploadRoot {
    /// Creates (if needed) and canonicalizes the upload root.
    ///
    /// # Errors
    /// `AssemblyIo` when the directory cannot be created or resolved.
    pub async fn open(root: &Path) -> Result<Self, EngineError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("failed to create upload root: {}", e)))?;
        let canonical = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("failed to resolve upload root: {}", e)))?;
        Ok(Self { root: canonical })
    }

    /// The canonical root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `<root>/<upload_id>/`
    pub fn session_dir(&self, id: &UploadId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// `<root>/<upload_id>/chunks/`
    pub fn chunks_dir(&self, id: &UploadId) -> PathBuf {
        self.session_dir(id).join(CHUNKS_DIR)
    }

    /// `<root>/<upload_id>/chunks/<NNNNNN>.chunk`
    pub fn chunk_file(&self, id: &UploadId, index: ChunkIndex) -> PathBuf {
        self.chunks_dir(id)
            .join(format!("{}{}", index.file_stem(), aether_upload_domain::contract::CHUNK_FILE_SUFFIX))
    }

    /// `<root>/<upload_id>/chunks/<NNNNNN>.chunk.tmp`
    pub fn chunk_tmp_file(&self, id: &UploadId, index: ChunkIndex) -> PathBuf {
        self.chunks_dir(id)
            .join(format!("{}{}", index.file_stem(), aether_upload_domain::contract::CHUNK_TMP_SUFFIX))
    }

    /// `<root>/<upload_id>/assembly/`
    pub fn assembly_dir(&self, id: &UploadId) -> PathBuf {
        self.session_dir(id).join(ASSEMBLY_DIR)
    }

    /// `<root>/<upload_id>/assembly/<hash>.bundle.assembling`
    pub fn staging_file(&self, id: &UploadId, hash: &BundleHash) -> PathBuf {
        self.assembly_dir(id).join(format!(
            "{}{}",
            hash.to_hex(),
            aether_upload_domain::contract::BUNDLE_ASSEMBLING_SUFFIX
        ))
    }

    /// `<root>/<hash>.bundle` (content-addressed, sessions never share it)
    pub fn bundle_file(&self, hash: &BundleHash) -> PathBuf {
        self.root.join(format!(
            "{}{}",
            hash.to_hex(),
            aether_upload_domain::contract::BUNDLE_FILE_SUFFIX
        ))
    }

    /// Lexical containment check for freshly built paths.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Resolved containment check for paths that exist on disk.
    ///
    /// Canonicalizes `path` (following symlinks) and verifies the result is
    /// still under the canonical root. Use before every destructive
    /// operation on scanned paths.
    ///
    /// # Errors
    /// `PathEscape` when the resolved path leaves the root or cannot be
    /// resolved.
    pub async fn ensure_contained(&self, path: &Path) -> Result<PathBuf, EngineError> {
        if !self.contains(path) {
            return Err(EngineError::PathEscape(format!(
                "path is lexically outside the upload root: {}",
                path.display()
            )));
        }
        let resolved = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| EngineError::PathEscape(format!("cannot resolve {}: {}", path.display(), e)))?;
        if !resolved.starts_with(&self.root) {
            return Err(EngineError::PathEscape(format!(
                "resolved path escapes the upload root: {}",
                resolved.display()
            )));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_upload_domain::value_objects::ChunkCount;

    async fn root() -> (tempfile::TempDir, UploadRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = UploadRoot::open(dir.path()).await.unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn test_layout_paths() {
        let (_guard, root) = root().await;
        let id = UploadId::parse("session-1").unwrap();
        let count = ChunkCount::new(3).unwrap();
        let index = ChunkIndex::new(1, count).unwrap();
        let hash = BundleHash::digest(b"bundle");

        assert_eq!(root.chunk_file(&id, index), root.path().join("session-1/chunks/000001.chunk"));
        assert_eq!(
            root.chunk_tmp_file(&id, index),
            root.path().join("session-1/chunks/000001.chunk.tmp")
        );
        assert_eq!(
            root.staging_file(&id, &hash),
            root.path()
                .join(format!("session-1/assembly/{}.bundle.assembling", hash.to_hex()))
        );
        assert_eq!(root.bundle_file(&hash), root.path().join(format!("{}.bundle", hash.to_hex())));
        assert!(root.contains(&root.bundle_file(&hash)));
    }

    #[tokio::test]
    async fn test_ensure_contained_rejects_outside_paths() {
        let (_guard, root) = root().await;
        let err = root.ensure_contained(Path::new("/etc/hosts")).await.unwrap_err();
        assert!(err.is_security_error());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_contained_rejects_symlink_escape() {
        let (_guard, root) = root().await;
        let outside = tempfile::tempdir().unwrap();
        let link = root.path().join("sneaky");
        tokio::fs::symlink(outside.path(), &link).await.unwrap();

        // Lexically inside, resolves outside.
        let err = root.ensure_contained(&link).await.unwrap_err();
        assert!(err.is_security_error());
    }

    #[tokio::test]
    async fn test_ensure_contained_accepts_real_children() {
        let (_guard, root) = root().await;
        let child = root.path().join("child-dir");
        tokio::fs::create_dir(&child).await.unwrap();
        let resolved = root.ensure_contained(&child).await.unwrap();
        assert!(resolved.starts_with(root.path()));
    }
}
