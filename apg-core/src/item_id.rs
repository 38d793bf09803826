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

//! Stable identity for entries of identifiable collections and dictionaries.
//!
//! An [`ItemId`] is independent of index or key: an item keeps the same id
//! across reorders, renames, and reconciliation passes. This is what lets the
//! reconciler diff a base and a derived collection by identity instead of by
//! position.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// A 128-bit opaque identifier for an entry of an identifiable collection or
/// dictionary.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// The sentinel id. Never assigned to a live item; seeing it in an id map
    /// indicates a corrupted entry (see `ApgError::CorruptedIdMap`).
    pub const EMPTY: ItemId = ItemId(Uuid::nil());

    /// Generates a new, effectively-unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an already-known uuid, e.g. one read back from saved metadata.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(self) -> Uuid {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Generates stable identifiers for items of identifiable collections and
/// dictionaries. Kept as an explicit, cloneable service rather than a
/// process-wide singleton.
#[derive(Default, Clone, Copy)]
pub struct ItemIdGenerator;

impl ItemIdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates a single fresh id.
    pub fn generate(&self) -> ItemId {
        ItemId::new()
    }

    /// Generates `count` fresh, pairwise-distinct ids.
    pub fn generate_many(&self, count: usize) -> Vec<ItemId> {
        (0..count).map(|_| self.generate()).collect()
    }
}
