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

//! Centralized override state.
//!
//! Kept out of the node structs themselves and indexed by handle instead, so
//! `reset_override`/`clear_all_overrides`/`restore_overrides` can act on
//! override state as a value, independent of the node arena.

use apg_core::item_id::ItemId;
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::listener::ItemChangeKind;
use crate::node::NodeHandle;

/// Only `Base`/`New` are reachable today; `Sealed` is
/// reserved for a future "can never be reconciled, even manually" bit.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum OverrideType {
    Base,
    New,
    Sealed,
}

impl Default for OverrideType {
    fn default() -> Self {
        OverrideType::Base
    }
}

/// A snapshot of one node's override state, as produced by
/// `OverrideStore::clear_all` and consumed by `OverrideStore::restore`
/// to restore exactly.
#[derive(Clone, Debug)]
pub struct NodeOverride {
    pub node: NodeHandle,
    pub content: OverrideType,
    pub item_overrides: FxHashSet<ItemId>,
    pub key_overrides: FxHashSet<ItemId>,
    pub deleted_items: FxHashSet<ItemId>,
}

/// Component E. Owns every override bit in the graph, keyed by node handle
/// (content override) or `(node handle, ItemId)` (item/key override,
/// deletion).
#[derive(Default)]
pub struct OverrideStore {
    content: FxHashMap<NodeHandle, OverrideType>,
    item_overrides: FxHashMap<NodeHandle, FxHashSet<ItemId>>,
    key_overrides: FxHashMap<NodeHandle, FxHashSet<ItemId>>,
    deleted_items: FxHashMap<NodeHandle, FxHashSet<ItemId>>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_override(&self, node: NodeHandle) -> OverrideType {
        self.content.get(&node).copied().unwrap_or_default()
    }

    /// I1: a node with `can_override == false` can never carry anything but
    /// `Base`. Enforced here rather than trusted at every call site.
    pub fn set_content_override(&mut self, node: NodeHandle, value: OverrideType, can_override: bool) {
        if !can_override {
            self.content.remove(&node);
            return;
        }
        if value == OverrideType::Base {
            self.content.remove(&node);
        } else {
            self.content.insert(node, value);
        }
    }

    pub fn is_item_overridden(&self, node: NodeHandle, id: ItemId) -> bool {
        self.item_overrides.get(&node).is_some_and(|s| s.contains(&id))
    }

    pub fn is_key_overridden(&self, node: NodeHandle, id: ItemId) -> bool {
        self.key_overrides.get(&node).is_some_and(|s| s.contains(&id))
    }

    pub fn is_deleted(&self, node: NodeHandle, id: ItemId) -> bool {
        self.deleted_items.get(&node).is_some_and(|s| s.contains(&id))
    }

    pub fn deleted_items(&self, node: NodeHandle) -> impl Iterator<Item = ItemId> + '_ {
        self.deleted_items
            .get(&node)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Stamps a member's content override in response to a `Changed`
    /// event. Returns `(previous, new)` for the derived `ContentChanged`
    /// event. `new` is `New` unless the write originated from a
    /// base-reconciliation pass (`reconciling == true`), in which case the
    /// write is attributed to the base and the override is reset.
    pub fn on_member_changed(
        &mut self,
        node: NodeHandle,
        can_override: bool,
        reconciling: bool,
    ) -> (OverrideType, OverrideType) {
        let prev = self.content_override(node);
        let new = if reconciling { OverrideType::Base } else { OverrideType::New };
        self.set_content_override(node, new, can_override);
        (prev, self.content_override(node))
    }

    /// Stamps an identifiable item/entry's override in response to an
    /// `ItemChanged` event. `has_base` reflects whether the owning node is
    /// currently linked to a base item (a removal only becomes an
    /// overriding deletion when there is something to diverge from).
    pub fn on_item_changed(
        &mut self,
        node: NodeHandle,
        item_id: ItemId,
        kind: ItemChangeKind,
        has_base: bool,
        reconciling: bool,
    ) -> (OverrideType, OverrideType) {
        let prev = self.item_override_type(node, item_id);
        match kind {
            ItemChangeKind::Add | ItemChangeKind::Update => {
                if !reconciling {
                    self.item_overrides.entry(node).or_default().insert(item_id);
                } else {
                    self.unmark_item_override(node, item_id);
                }
            }
            ItemChangeKind::Remove => {
                self.unmark_item_override(node, item_id);
                if has_base && !reconciling {
                    self.deleted_items.entry(node).or_default().insert(item_id);
                } else {
                    self.deleted_items.entry(node).or_default().remove(&item_id);
                }
            }
        }
        let new = self.item_override_type(node, item_id);
        (prev, new)
    }

    fn item_override_type(&self, node: NodeHandle, item_id: ItemId) -> OverrideType {
        if self.is_item_overridden(node, item_id) {
            OverrideType::New
        } else {
            OverrideType::Base
        }
    }

    fn unmark_item_override(&mut self, node: NodeHandle, item_id: ItemId) {
        if let Some(set) = self.item_overrides.get_mut(&node) {
            set.remove(&item_id);
        }
    }

    /// Directly sets an item's override bit, independent of the
    /// add/update/remove event path `on_item_changed` stamps from. Used by
    /// metadata load, which is restoring a previously-computed override
    /// rather than reacting to a live mutation.
    pub fn set_item_override(&mut self, node: NodeHandle, item_id: ItemId, overridden: bool) {
        let set = self.item_overrides.entry(node).or_default();
        if overridden {
            set.insert(item_id);
        } else {
            set.remove(&item_id);
        }
    }

    /// Dictionary move: flips the key override on without touching
    /// the item override (the two are independent dimensions for
    /// dictionaries).
    pub fn set_key_override(&mut self, node: NodeHandle, item_id: ItemId, overridden: bool) {
        let set = self.key_overrides.entry(node).or_default();
        if overridden {
            set.insert(item_id);
        } else {
            set.remove(&item_id);
        }
    }

    /// Unmarks a deletion whose basis no longer exists. No-op
    /// if `id` was not marked deleted.
    pub fn clear_deleted(&mut self, node: NodeHandle, item_id: ItemId) {
        if let Some(set) = self.deleted_items.get_mut(&node) {
            set.remove(&item_id);
        }
    }

    /// Drops every override bit rooted at `node` (used by `reset_override`
    /// before reconciling, and, for the graph root, as the basis of
    /// `clear_all_overrides`).
    pub fn clear(&mut self, node: NodeHandle) -> NodeOverride {
        NodeOverride {
            node,
            content: self.content.remove(&node).unwrap_or_default(),
            item_overrides: self.item_overrides.remove(&node).unwrap_or_default(),
            key_overrides: self.key_overrides.remove(&node).unwrap_or_default(),
            deleted_items: self.deleted_items.remove(&node).unwrap_or_default(),
        }
    }

    /// `clear_all_overrides`: drains every node's override state,
    /// returning a snapshot list suitable for `restore`.
    pub fn clear_all(&mut self) -> Vec<NodeOverride> {
        let nodes: FxHashSet<NodeHandle> = self
            .content
            .keys()
            .chain(self.item_overrides.keys())
            .chain(self.key_overrides.keys())
            .chain(self.deleted_items.keys())
            .copied()
            .collect();
        nodes.into_iter().map(|n| self.clear(n)).collect()
    }

    /// `restore_overrides`: the inverse of `clear_all`. Calling this
    /// with the list `clear_all` just returned reproduces the prior state
    /// exactly.
    pub fn restore(&mut self, snapshot: Vec<NodeOverride>) {
        for entry in snapshot {
            if entry.content != OverrideType::Base {
                self.content.insert(entry.node, entry.content);
            }
            if !entry.item_overrides.is_empty() {
                self.item_overrides.insert(entry.node, entry.item_overrides);
            }
            if !entry.key_overrides.is_empty() {
                self.key_overrides.insert(entry.node, entry.key_overrides);
            }
            if !entry.deleted_items.is_empty() {
                self.deleted_items.insert(entry.node, entry.deleted_items);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{NodeData, NodeSlot, ObjectNode};
    use apg_core::pool::Pool;

    fn fake_node() -> NodeHandle {
        let mut pool: Pool<NodeSlot> = Pool::new();
        pool.spawn(NodeSlot::new(NodeData::Object(ObjectNode {
            owner: None,
            identity: None,
            children: Vec::new(),
        })))
    }

    #[test]
    fn non_overridable_node_stays_base() {
        let mut store = OverrideStore::new();
        let node = fake_node();
        store.set_content_override(node, OverrideType::New, false);
        assert_eq!(store.content_override(node), OverrideType::Base);
    }

    #[test]
    fn member_changed_marks_new_unless_reconciling() {
        let mut store = OverrideStore::new();
        let node = fake_node();

        let (prev, new) = store.on_member_changed(node, true, false);
        assert_eq!(prev, OverrideType::Base);
        assert_eq!(new, OverrideType::New);

        let (prev2, new2) = store.on_member_changed(node, true, true);
        assert_eq!(prev2, OverrideType::New);
        assert_eq!(new2, OverrideType::Base);
    }

    #[test]
    fn removal_without_base_does_not_mark_deleted() {
        let mut store = OverrideStore::new();
        let node = fake_node();
        let id = ItemId::new();
        store.on_item_changed(node, id, ItemChangeKind::Remove, false, false);
        assert!(!store.is_deleted(node, id));
    }

    #[test]
    fn removal_with_base_marks_deleted_unless_reconciling() {
        let mut store = OverrideStore::new();
        let node = fake_node();
        let id = ItemId::new();
        store.on_item_changed(node, id, ItemChangeKind::Remove, true, false);
        assert!(store.is_deleted(node, id));

        store.clear_deleted(node, id);
        store.on_item_changed(node, id, ItemChangeKind::Remove, true, true);
        assert!(!store.is_deleted(node, id));
    }

    #[test]
    fn clear_all_then_restore_round_trips() {
        let mut store = OverrideStore::new();
        let node = fake_node();
        let id = ItemId::new();
        store.set_content_override(node, OverrideType::New, true);
        store.on_item_changed(node, id, ItemChangeKind::Add, false, false);

        let snapshot = store.clear_all();
        assert_eq!(store.content_override(node), OverrideType::Base);
        assert!(!store.is_item_overridden(node, id));

        store.restore(snapshot);
        assert_eq!(store.content_override(node), OverrideType::New);
        assert!(store.is_item_overridden(node, id));
    }
}
