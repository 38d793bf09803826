// Copyright (c) 2019-present the Asset Property Graph contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Error kinds for the asset property graph.
//!
//! These are data, not exceptions: most of them are recovered from locally
//! (see [`ApgError::is_recoverable`]) rather than aborting the calling
//! operation.

use crate::item_id::ItemId;
use crate::path::NodePath;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum ApgError {
    /// A required argument was missing/null, or a reconcile target does not
    /// belong to the graph it was passed to.
    InvalidArgument(String),

    /// `resolve` walked off the end of the graph. Non-fatal: the caller
    /// drops the offending metadata entry and logs a warning.
    PathUnreachable(NodePath),

    /// A path expected a Member/Object/IndexedObject kind but found another
    /// one. Indicates document corruption; the operation that discovered it
    /// must abort.
    KindMismatch {
        path: NodePath,
        expected: &'static str,
        found: &'static str,
    },

    /// An identifiable collection/dictionary contained `ItemId::EMPTY`. The
    /// offending item is dropped during reconciliation.
    CorruptedIdMap(NodePath),

    /// A dictionary add during reconciliation would collide with an
    /// existing key. Not fatal: the id is recorded as deleted instead.
    BaseLinkCollision { path: NodePath, item_id: ItemId },
}

impl ApgError {
    /// `true` for every variant that is recovered from
    /// locally (skip and continue) rather than surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ApgError::KindMismatch { .. })
    }
}

impl Display for ApgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApgError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ApgError::PathUnreachable(path) => write!(f, "path unreachable: {path}"),
            ApgError::KindMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "kind mismatch at {path}: expected {expected}, found {found}"
            ),
            ApgError::CorruptedIdMap(path) => {
                write!(f, "corrupted id map at {path}: empty item id")
            }
            ApgError::BaseLinkCollision { path, item_id } => {
                write!(f, "base link collision at {path} for item {item_id}")
            }
        }
    }
}

impl std::error::Error for ApgError {}
