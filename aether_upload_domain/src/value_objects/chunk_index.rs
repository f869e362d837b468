// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Index Value Object
//!
//! Zero-based position of a chunk within its bundle, validated against the
//! session's declared [`ChunkCount`]. Carries the canonical on-disk file
//! stem: six decimal digits, zero padded, so lexicographic directory order
//! equals numeric order.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use super::ChunkCount;
use crate::error::EngineError;

/// Validated chunk position, `0..chunk_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkIndex(u32);

impl ChunkIndex {
    /// Validates an index against the session's declared count.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` when `index >= count`.
    pub fn new(index: u32, count: ChunkCount) -> Result<Self, EngineError> {
        if index >= count.get() {
            return Err(EngineError::InvalidRequest(format!(
                "chunk index {} out of range 0..{}",
                index,
                count.get()
            )));
        }
        Ok(Self(index))
    }

    /// Returns the index as a plain integer.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Renders the canonical zero-padded file stem, e.g. `000042`.
    pub fn file_stem(&self) -> String {
        format!("{:06}", self.0)
    }
}

impl Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
