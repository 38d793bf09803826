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

//! Leaf value types that can sit at a member, a collection item, or a
//! dictionary entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A primitive value an asset member/item/entry can hold directly (as
/// opposed to holding a structural sub-object).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(Uuid),
    /// An opaque handle to another asset document, carrying `(id, url)`.
    /// Two content references are reconciled by comparing the pair, never
    /// by following the url.
    ContentReference(ContentReference),
}

impl PrimitiveValue {
    pub fn as_content_reference(&self) -> Option<&ContentReference> {
        match self {
            PrimitiveValue::ContentReference(r) => Some(r),
            _ => None,
        }
    }
}

/// A handle to another asset, as opposed to an [`crate::item_id::ItemId`]
/// pointer to an object *inside* the same asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    pub id: Uuid,
    pub url: String,
}

/// A restricted, hashable/orderable subset of [`PrimitiveValue`] usable as a
/// dictionary key (floats are excluded: they are neither `Eq` nor `Hash`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DictKey {
    Bool(bool),
    I64(i64),
    String(String),
    Uuid(Uuid),
}
