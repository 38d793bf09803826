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

//! `AssetGraph`: ties the node arena (B), the change listener (C) and the
//! override store (E) into one owning type with the mutation API named in
//! the mutation API (`update`/`add`/`remove`/`restore`).
//!
//! The two re-entrancy guards the source kept separate — `updating_from_base`
//! and `resetting_override` — are merged here into a single `reconciling`
//! flag. Both existed only to suppress local-override stamping while a
//! base-driven write was in flight; nothing distinguishes a
//! state where one is set but not the other, so one flag covers both without
//! losing any behavior (documented in `DESIGN.md`).

use apg_core::error::ApgError;
use apg_core::item_id::{ItemId, ItemIdGenerator};
use apg_core::pool::Pool;
use apg_core::value::PrimitiveValue;

use crate::linker::{self, FindTarget, IdentityFindTarget};
use crate::listener::{ChangeBroadcaster, ChangeEvent, ItemChangeKind};
use crate::node::{
    CollectionItem, CollectionNode, DictionaryEntry, DictionaryNode, IndexedObject, ItemContent,
    MemberNode, NodeData, NodeHandle, NodeSlot, ObjectNode,
};
use crate::overrides::{NodeOverride, OverrideStore, OverrideType};
use crate::registry::BaseDerivedRegistry;

/// One asset's node graph, owned exclusively by one [`crate::container::Container`]
/// entry.
pub struct AssetGraph {
    pub nodes: Pool<NodeSlot>,
    pub root: NodeHandle,
    pub overrides: OverrideStore,
    pub changes: ChangeBroadcaster,
    pub registry: BaseDerivedRegistry,
    pub ids: ItemIdGenerator,
    /// Non-owning handle into the base graph's own arena; `None` for a
    /// root (non-derived) asset.
    pub base_root: Option<NodeHandle>,
    /// Token for this graph's subscription to the base graph's broadcaster,
    /// released in `refresh_base`/teardown.
    base_subscription: Option<crate::listener::SubscriptionToken>,
    /// Merged `updating_from_base` / `resetting_override` guard. `true` for
    /// the whole duration of a base-driven propagation or reconciliation
    /// pass; suppresses local-override stamping and re-entrant propagation.
    reconciling: bool,
}

impl AssetGraph {
    /// Builds an empty asset graph around a bare
    /// root object. Populating it from an asset tree is
    /// `crate::build::build_from_tree`.
    pub fn new() -> Self {
        let mut nodes = Pool::new();
        let root = nodes.spawn(NodeSlot::new(NodeData::Object(ObjectNode {
            owner: None,
            identity: None,
            children: Vec::new(),
        })));
        Self {
            nodes,
            root,
            overrides: OverrideStore::new(),
            changes: ChangeBroadcaster::new(),
            registry: BaseDerivedRegistry::new(),
            ids: ItemIdGenerator::new(),
            base_root: None,
            base_subscription: None,
            reconciling: false,
        }
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling
    }

    /// Looks up a named child of an object.
    pub fn child(&self, object: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.nodes.try_borrow(object)?.data.as_object()?.child(name)
    }

    /// The structural child an indexed
    /// object's item points to, for reference-valued items.
    pub fn indexed_target(&self, node: NodeHandle, index: usize) -> Option<NodeHandle> {
        match &self.nodes.try_borrow(node)?.data {
            NodeData::Collection(c) => {
                let item = c.items.get(index)?;
                if item.is_reference {
                    item.target
                } else {
                    None
                }
            }
            NodeData::Dictionary(d) => {
                let entry = d.entries.get(index)?;
                if entry.is_reference {
                    entry.target
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// The primitive value at a member, or at an
    /// item/entry of an indexed object.
    pub fn retrieve(&self, node: NodeHandle, index: Option<usize>) -> Option<PrimitiveValue> {
        match (&self.nodes.try_borrow(node)?.data, index) {
            (NodeData::Member(m), None) => m.value.clone(),
            (NodeData::Collection(c), Some(i)) => c.items.get(i)?.value.clone(),
            (NodeData::Dictionary(d), Some(i)) => d.entries.get(i)?.value.clone(),
            _ => None,
        }
    }

    /// Overwrites a member's value or an
    /// item/entry's value, firing `Changing`/`Changed` and stamping the
    /// override.
    pub fn update_member(&mut self, member: NodeHandle, new_value: PrimitiveValue) {
        let old_value = self
            .nodes
            .try_borrow(member)
            .and_then(|s| s.data.as_member())
            .and_then(|m| m.value.clone());

        self.changes.broadcast(&ChangeEvent::Changing {
            member,
            old_value: old_value.clone(),
        });

        if let Some(m) = self.nodes.try_borrow_mut(member).and_then(|s| s.data.as_member_mut()) {
            m.value = Some(new_value.clone());
        }

        self.changes.broadcast(&ChangeEvent::Changed {
            member,
            old_value,
            new_value: Some(new_value),
        });

        let can_override = self
            .nodes
            .try_borrow(member)
            .and_then(|s| s.data.as_member())
            .map(|m| m.can_override)
            .unwrap_or(false);
        let (prev, new) = self.overrides.on_member_changed(member, can_override, self.reconciling);
        if prev != new {
            self.changes.broadcast(&ChangeEvent::ContentChanged {
                member,
                prev_override: prev,
                new_override: new,
            });
        }
    }

    /// `update_complex(target)` — the structural-member counterpart of
    /// `update_member`, used when a member's owned subtree is wholesale
    /// replaced during reconciliation rather than its scalar value.
    pub fn update_member_target(&mut self, member: NodeHandle, new_target: NodeHandle) {
        self.changes.broadcast(&ChangeEvent::Changing { member, old_value: None });
        if let Some(m) = self.nodes.try_borrow_mut(member).and_then(|s| s.data.as_member_mut()) {
            m.target = Some(new_target);
        }
        self.changes.broadcast(&ChangeEvent::Changed {
            member,
            old_value: None,
            new_value: None,
        });
        let can_override = self
            .nodes
            .try_borrow(member)
            .and_then(|s| s.data.as_member())
            .map(|m| m.can_override)
            .unwrap_or(false);
        let (prev, new) = self.overrides.on_member_changed(member, can_override, self.reconciling);
        if prev != new {
            self.changes.broadcast(&ChangeEvent::ContentChanged {
                member,
                prev_override: prev,
                new_override: new,
            });
        }
    }

    /// Appends at the end of a collection and
    /// assigns a fresh `ItemId` if the collection is identifiable.
    pub fn add_collection_item(&mut self, node: NodeHandle, value: PrimitiveValue) -> Option<ItemId> {
        let id = if self.is_identifiable_collection(node) { self.ids.generate() } else { ItemId::EMPTY };
        self.insert_collection_item(node, self.collection_len(node)?, ItemContent::Value(value), id)
    }

    /// Identical to `add`, but the `ItemId` is caller-chosen and the content
    /// can be structural or a reference, not just a primitive value (used by
    /// the reconciler to reinsert a base item — possibly a deep-cloned
    /// sub-object — with its original id preserved).
    pub fn restore_collection_item(
        &mut self,
        node: NodeHandle,
        index: usize,
        content: ItemContent,
        item_id: ItemId,
    ) -> Option<ItemId> {
        self.insert_collection_item(node, index, content, item_id)
    }

    fn insert_collection_item(
        &mut self,
        node: NodeHandle,
        index: usize,
        content: ItemContent,
        item_id: ItemId,
    ) -> Option<ItemId> {
        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Add,
            index,
            old_value: None,
        });

        let broadcast_value = content.primitive();
        {
            let c = self.nodes.try_borrow_mut(node)?.data.as_collection_mut()?;
            let at = index.min(c.items.len());
            let (value, target, is_reference) = content.into_parts();
            c.items.insert(at, CollectionItem { id: item_id, value, target, is_reference });
            c.reindex();
        }

        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Add,
            index,
            new_value: broadcast_value,
        });

        if !item_id.is_empty() {
            let has_base = self.nodes.try_borrow(node)?.base_link.is_some();
            let (prev, new) = self
                .overrides
                .on_item_changed(node, item_id, ItemChangeKind::Add, has_base, self.reconciling);
            if prev != new {
                self.changes.broadcast(&ChangeEvent::ItemContentChanged {
                    node,
                    item_id,
                    prev_override: prev,
                    new_override: new,
                });
            }
        }
        Some(item_id)
    }

    /// Removes an item from a collection by index.
    pub fn remove_collection_item(&mut self, node: NodeHandle, index: usize) -> Option<PrimitiveValue> {
        let (old_value, item_id) = {
            let c = self.nodes.try_borrow(node)?.data.as_collection()?;
            let item = c.items.get(index)?;
            (item.value.clone(), item.id)
        };

        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Remove,
            index,
            old_value: old_value.clone(),
        });

        {
            let c = self.nodes.try_borrow_mut(node)?.data.as_collection_mut()?;
            c.items.remove(index);
            c.reindex();
        }

        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Remove,
            index,
            new_value: None,
        });

        if !item_id.is_empty() {
            let has_base = self.nodes.try_borrow(node)?.base_link.is_some();
            let (prev, new) = self
                .overrides
                .on_item_changed(node, item_id, ItemChangeKind::Remove, has_base, self.reconciling);
            if prev != new {
                self.changes.broadcast(&ChangeEvent::ItemContentChanged {
                    node,
                    item_id,
                    prev_override: prev,
                    new_override: new,
                });
            }
        }
        old_value
    }

    /// In-place value update of an existing collection item by index (used
    /// by reconciliation pass 2's "update in place").
    pub fn update_collection_item(&mut self, node: NodeHandle, index: usize, new_value: PrimitiveValue) {
        let (old_value, item_id) = {
            let Some(c) = self.nodes.try_borrow(node).and_then(|s| s.data.as_collection()) else {
                return;
            };
            let Some(item) = c.items.get(index) else { return };
            (item.value.clone(), item.id)
        };

        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Update,
            index,
            old_value,
        });

        if let Some(c) = self.nodes.try_borrow_mut(node).and_then(|s| s.data.as_collection_mut()) {
            if let Some(item) = c.items.get_mut(index) {
                item.value = Some(new_value.clone());
            }
        }

        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Update,
            index,
            new_value: Some(new_value),
        });

        if !item_id.is_empty() {
            let has_base = self.nodes.try_borrow(node).is_some_and(|s| s.base_link.is_some());
            let (prev, new) = self
                .overrides
                .on_item_changed(node, item_id, ItemChangeKind::Update, has_base, self.reconciling);
            if prev != new {
                self.changes.broadcast(&ChangeEvent::ItemContentChanged {
                    node,
                    item_id,
                    prev_override: prev,
                    new_override: new,
                });
            }
        }
    }

    /// Dictionary counterparts of the collection item operations above.
    pub fn insert_dictionary_entry(
        &mut self,
        node: NodeHandle,
        key: apg_core::value::DictKey,
        content: ItemContent,
        item_id: ItemId,
    ) -> Option<ItemId> {
        let index = self.nodes.try_borrow(node)?.data.as_dictionary()?.entries.len();
        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Add,
            index,
            old_value: None,
        });
        let broadcast_value = content.primitive();
        {
            let d = self.nodes.try_borrow_mut(node)?.data.as_dictionary_mut()?;
            let (value, target, is_reference) = content.into_parts();
            d.entries.push(DictionaryEntry { id: item_id, key, value, target, is_reference });
            d.reindex();
        }
        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Add,
            index,
            new_value: broadcast_value,
        });
        if !item_id.is_empty() {
            let has_base = self.nodes.try_borrow(node)?.base_link.is_some();
            let (prev, new) = self
                .overrides
                .on_item_changed(node, item_id, ItemChangeKind::Add, has_base, self.reconciling);
            if prev != new {
                self.changes.broadcast(&ChangeEvent::ItemContentChanged {
                    node,
                    item_id,
                    prev_override: prev,
                    new_override: new,
                });
            }
        }
        Some(item_id)
    }

    pub fn remove_dictionary_entry(&mut self, node: NodeHandle, index: usize) -> Option<PrimitiveValue> {
        let (old_value, item_id) = {
            let d = self.nodes.try_borrow(node)?.data.as_dictionary()?;
            let e = d.entries.get(index)?;
            (e.value.clone(), e.id)
        };
        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Remove,
            index,
            old_value: old_value.clone(),
        });
        {
            let d = self.nodes.try_borrow_mut(node)?.data.as_dictionary_mut()?;
            d.entries.remove(index);
            d.reindex();
        }
        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Remove,
            index,
            new_value: None,
        });
        if !item_id.is_empty() {
            let has_base = self.nodes.try_borrow(node)?.base_link.is_some();
            let (prev, new) = self
                .overrides
                .on_item_changed(node, item_id, ItemChangeKind::Remove, has_base, self.reconciling);
            if prev != new {
                self.changes.broadcast(&ChangeEvent::ItemContentChanged {
                    node,
                    item_id,
                    prev_override: prev,
                    new_override: new,
                });
            }
        }
        old_value
    }

    /// Dictionary move: removes the entry at its old key and
    /// reinserts it at `new_key`, preserving its `ItemId`, and flips the key
    /// override bit on.
    pub fn move_dictionary_entry_key(
        &mut self,
        node: NodeHandle,
        old_index: usize,
        new_key: apg_core::value::DictKey,
    ) {
        let Some((item_id, value, target, is_reference)) = self
            .nodes
            .try_borrow(node)
            .and_then(|s| s.data.as_dictionary())
            .and_then(|d| d.entries.get(old_index))
            .map(|e| (e.id, e.value.clone(), e.target, e.is_reference))
        else {
            return;
        };
        self.remove_dictionary_entry(node, old_index);
        let new_index = self
            .nodes
            .try_borrow(node)
            .and_then(|s| s.data.as_dictionary())
            .map(|d| d.entries.len())
            .unwrap_or(0);
        self.changes.broadcast(&ChangeEvent::ItemChanging {
            node,
            kind: ItemChangeKind::Add,
            index: new_index,
            old_value: None,
        });
        if let Some(d) = self.nodes.try_borrow_mut(node).and_then(|s| s.data.as_dictionary_mut()) {
            d.entries.push(DictionaryEntry {
                id: item_id,
                key: new_key,
                value: value.clone(),
                target,
                is_reference,
            });
            d.reindex();
        }
        self.changes.broadcast(&ChangeEvent::ItemChanged {
            node,
            kind: ItemChangeKind::Add,
            index: new_index,
            new_value: value,
        });
        self.overrides.set_key_override(node, item_id, !self.reconciling);
    }

    fn is_identifiable_collection(&self, node: NodeHandle) -> bool {
        self.nodes
            .try_borrow(node)
            .and_then(|s| s.data.as_collection())
            .map(|c| c.identifiable)
            .unwrap_or(false)
    }

    fn collection_len(&self, node: NodeHandle) -> Option<usize> {
        Some(self.nodes.try_borrow(node)?.data.as_collection()?.items.len())
    }

    /// Clears override bits on `node`
    /// (and, for an object, its descendants) then reconciles against
    /// `base_nodes` (the base graph's arena — owned by a sibling
    /// `AssetGraph`, so the caller, usually `crate::container`, passes it in
    /// rather than this graph holding a reference to it).
    pub fn reset_override(&mut self, base_nodes: Option<&Pool<NodeSlot>>, node: NodeHandle) {
        self.clear_overrides_recursive(node);
        crate::reconcile::reconcile_with_base(self, base_nodes, Some(node), &crate::reconcile::AlwaysUpdate);
    }

    fn clear_overrides_recursive(&mut self, node: NodeHandle) {
        self.overrides.clear(node);
        let Some(slot) = self.nodes.try_borrow(node) else { return };
        match &slot.data {
            NodeData::Object(o) => {
                let children: Vec<NodeHandle> = o.children.iter().map(|(_, h)| *h).collect();
                for child in children {
                    self.clear_overrides_recursive(child);
                }
            }
            NodeData::Member(m) => {
                if let Some(t) = m.target {
                    self.clear_overrides_recursive(t);
                }
            }
            NodeData::Collection(c) => {
                for item in &c.items {
                    if !item.id.is_empty() {
                        self.overrides.clear_deleted(node, item.id);
                    }
                    if let Some(t) = item.target {
                        if !item.is_reference {
                            self.clear_overrides_recursive(t);
                        }
                    }
                }
            }
            NodeData::Dictionary(d) => {
                for entry in &d.entries {
                    if let Some(t) = entry.target {
                        if !entry.is_reference {
                            self.clear_overrides_recursive(t);
                        }
                    }
                }
            }
        }
    }

    /// Drains every override across the whole graph, returning a snapshot.
    pub fn clear_all_overrides(&mut self) -> Vec<NodeOverride> {
        self.overrides.clear_all()
    }

    /// The inverse of `clear_all_overrides`.
    pub fn restore_overrides(&mut self, snapshot: Vec<NodeOverride>) {
        self.overrides.restore(snapshot);
    }

    /// Rebinds to a different
    /// base graph (or none), clearing any previous linkage first. The old
    /// base's broadcaster is not reachable from here — call
    /// `detach_from_base` first, while it still is, to unsubscribe cleanly.
    /// Subscribing to the *new* base's broadcaster is the caller's job too
    /// (usually `crate::container`, which holds both graphs at once and can
    /// store the returned token back onto this graph via `set_subscription`).
    #[must_use]
    pub fn refresh_base(&mut self, base_nodes: Option<&Pool<NodeSlot>>, base_root: Option<NodeHandle>) -> Result<(), ApgError> {
        linker::clear_all_base_links(&mut self.nodes, self.root);
        self.registry.clear();
        self.base_subscription = None;
        self.base_root = base_root;
        if let (Some(nodes), Some(root)) = (base_nodes, base_root) {
            linker::link_to_base(&mut self.nodes, self.root, nodes, root, &mut self.registry, &IdentityFindTarget)
        } else {
            Ok(())
        }
    }

    /// Call before dropping or rebinding the base graph while it is still
    /// reachable, to release this graph's subscription deterministically
    /// while the old base is still reachable.
    pub fn detach_from_base(&mut self, base_broadcaster: &mut ChangeBroadcaster) {
        if let Some(token) = self.base_subscription.take() {
            base_broadcaster.unsubscribe(token);
        }
    }

    /// Records the subscription token obtained after subscribing to the new
    /// base's broadcaster, so a later `detach_from_base` can release it.
    pub fn set_subscription(&mut self, token: crate::listener::SubscriptionToken) {
        self.base_subscription = Some(token);
    }

    pub(crate) fn set_reconciling(&mut self, value: bool) {
        self.reconciling = value;
    }
}

impl Default for AssetGraph {
    fn default() -> Self {
        Self::new()
    }
}
