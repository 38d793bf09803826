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

//! Base→derived reverse index (component F).
//!
//! An object reference member on the base side stores the `ItemId` of the
//! identifiable object it points to. Resolving that same reference on the
//! derived side (S6: "the reference in the derived points to the *derived*
//! counterpart, not the base instance") means looking the base id up here to
//! find which derived `ObjectNode` now carries it.

use apg_core::item_id::ItemId;
use fxhash::FxHashMap;

use crate::node::NodeHandle;

#[derive(Default)]
pub struct BaseDerivedRegistry {
    map: FxHashMap<ItemId, NodeHandle>,
}

impl BaseDerivedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the derived-side object that now carries `base_identity`.
    /// Re-registering the same id overwrites the previous entry — relinking
    /// after a base-change always supersedes whatever was there.
    pub fn register(&mut self, base_identity: ItemId, derived_object: NodeHandle) {
        self.map.insert(base_identity, derived_object);
    }

    pub fn resolve(&self, base_identity: ItemId) -> Option<NodeHandle> {
        self.map.get(&base_identity).copied()
    }

    /// Called by `clear_all_base_links` before relinking.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
