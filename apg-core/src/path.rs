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

//! Root-relative paths into an asset graph, used as the key of the override
//! and object-reference metadata blobs.

use crate::item_id::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single step of a [`NodePath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStep {
    Member(String),
    Index(usize),
    ItemId(ItemId),
}

impl Display for PathStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStep::Member(name) => write!(f, ".{name}"),
            PathStep::Index(i) => write!(f, "[{i}]"),
            PathStep::ItemId(id) => write!(f, "{{{id}}}"),
        }
    }
}

/// An ordered list of [`PathStep`]s rooted at the asset's root node.
///
/// `NodePath` is used both as a navigation program (see `apg_graph::resolve`)
/// and as a map key (see `apg_graph::metadata`) — it derives `Hash`/`Eq` so
/// it can back an `FxHashMap` directly, without a string-encoding round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(Vec<PathStep>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn push_member(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Member(name.into()));
        self
    }

    pub fn push_index(mut self, index: usize) -> Self {
        self.0.push(PathStep::Index(index));
        self
    }

    pub fn push_item_id(mut self, id: ItemId) -> Self {
        self.0.push(PathStep::ItemId(id));
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A path ending with an `Index`/`ItemId` step addresses an item or key;
    /// a path ending with a `Member` step (or the empty/root path) addresses
    /// content.
    pub fn ends_on_index(&self) -> bool {
        matches!(
            self.0.last(),
            Some(PathStep::Index(_)) | Some(PathStep::ItemId(_))
        )
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for step in &self.0 {
            Display::fmt(step, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_is_empty_and_not_index_terminated() {
        let p = NodePath::root();
        assert!(p.is_root());
        assert!(!p.ends_on_index());
    }

    #[test]
    fn member_terminated_path_is_content() {
        let p = NodePath::root().push_member("color");
        assert!(!p.ends_on_index());
    }

    #[test]
    fn index_terminated_path_is_item() {
        let p = NodePath::root().push_member("items").push_index(3);
        assert!(p.ends_on_index());

        let p2 = NodePath::root()
            .push_member("items")
            .push_item_id(ItemId::new());
        assert!(p2.ends_on_index());
    }
}
