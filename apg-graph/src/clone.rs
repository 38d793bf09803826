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

//! Deep-clone with identifier remapping.
//!
//! The general-purpose cloner is out of scope; the reconciler only needs
//! this narrower operation when inserting a base item/value that has never
//! existed on the derived side: every identifiable sub-object gets a fresh
//! `ItemId` so it can never collide with something the user later adds, and
//! the old→new mapping is returned so the base→derived registry (F) can
//! re-resolve any object reference that pointed inside the cloned subtree.

use apg_core::item_id::{ItemId, ItemIdGenerator};
use apg_core::pool::Pool;
use fxhash::FxHashMap;

use crate::node::{
    CollectionItem, CollectionNode, DictionaryEntry, DictionaryNode, MemberNode, NodeData,
    NodeHandle, NodeSlot, ObjectNode,
};

/// Old→new `ItemId` mapping produced by a clone, keyed by the original id.
pub type IdRemap = FxHashMap<ItemId, ItemId>;

/// Clones the subtree rooted at `source` (read from `src_nodes`) into
/// `dst_nodes`, returning the handle of the clone's root and the id remap
/// accumulated along the way. `source`'s own owner links are not carried
/// over — the caller re-parents the clone into its new position.
pub fn clone_subtree(
    src_nodes: &Pool<NodeSlot>,
    source: NodeHandle,
    dst_nodes: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
) -> (NodeHandle, IdRemap) {
    let mut remap = IdRemap::default();
    let root = clone_node(src_nodes, source, dst_nodes, ids, &mut remap);
    (root, remap)
}

fn clone_node(
    src: &Pool<NodeSlot>,
    handle: NodeHandle,
    dst: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
    remap: &mut IdRemap,
) -> NodeHandle {
    match &src.borrow(handle).data {
        NodeData::Object(o) => clone_object(src, handle, o, dst, ids, remap),
        NodeData::Member(m) => clone_member(src, handle, m, dst, ids, remap),
        NodeData::Collection(c) => clone_collection(src, handle, c, dst, ids, remap),
        NodeData::Dictionary(d) => clone_dictionary(src, handle, d, dst, ids, remap),
    }
}

fn fresh_id(old: ItemId, ids: &ItemIdGenerator, remap: &mut IdRemap) -> ItemId {
    if old.is_empty() {
        return old;
    }
    *remap.entry(old).or_insert_with(|| ids.generate())
}

fn clone_object(
    src: &Pool<NodeSlot>,
    _handle: NodeHandle,
    o: &ObjectNode,
    dst: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
    remap: &mut IdRemap,
) -> NodeHandle {
    let identity = o.identity.map(|id| fresh_id(id, ids, remap));
    let clone_handle = dst.spawn(NodeSlot::new(NodeData::Object(ObjectNode {
        owner: None,
        identity,
        children: Vec::new(),
    })));

    let children: Vec<(String, NodeHandle)> = o
        .children
        .iter()
        .map(|(name, child)| {
            let cloned_child = clone_node(src, *child, dst, ids, remap);
            if let NodeData::Member(m) = &mut dst.borrow_mut(cloned_child).data {
                m.owner = clone_handle;
            }
            (name.clone(), cloned_child)
        })
        .collect();

    if let NodeData::Object(clone) = &mut dst.borrow_mut(clone_handle).data {
        clone.children = children;
    }
    clone_handle
}

fn clone_member(
    src: &Pool<NodeSlot>,
    _handle: NodeHandle,
    m: &MemberNode,
    dst: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
    remap: &mut IdRemap,
) -> NodeHandle {
    let clone_handle = dst.spawn(NodeSlot::new(NodeData::Member(MemberNode {
        name: m.name.clone(),
        declared_type: m.declared_type,
        owner: NodeHandle::NONE,
        value: m.value.clone(),
        target: None,
        is_reference: m.is_reference,
        is_object_reference: m.is_object_reference,
        object_reference_id: m.object_reference_id,
        can_override: m.can_override,
    })));

    // A structural (non-reference) complex value is owned and must be
    // cloned too; a reference member's target is re-resolved later by the
    // caller via `remap`/the base→derived registry rather than cloned here,
    // since it may point outside this subtree.
    if !m.is_reference {
        if let Some(target) = m.target {
            let cloned_target = clone_node(src, target, dst, ids, remap);
            if let NodeData::Member(clone) = &mut dst.borrow_mut(clone_handle).data {
                clone.target = Some(cloned_target);
            }
        }
    }
    if let Some(old_ref_id) = m.object_reference_id {
        let new_ref_id = fresh_id(old_ref_id, ids, remap);
        if let NodeData::Member(clone) = &mut dst.borrow_mut(clone_handle).data {
            clone.object_reference_id = Some(new_ref_id);
        }
    }
    clone_handle
}

fn clone_collection(
    src: &Pool<NodeSlot>,
    _handle: NodeHandle,
    c: &CollectionNode,
    dst: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
    remap: &mut IdRemap,
) -> NodeHandle {
    let clone_handle = dst.spawn(NodeSlot::new(NodeData::Collection(CollectionNode::new(
        NodeHandle::NONE,
        c.identifiable,
    ))));

    let items: Vec<CollectionItem> = c
        .items
        .iter()
        .map(|item| {
            let new_id = fresh_id(item.id, ids, remap);
            let target = if !item.is_reference {
                item.target.map(|t| {
                    let cloned = clone_node(src, t, dst, ids, remap);
                    cloned
                })
            } else {
                None
            };
            CollectionItem {
                id: new_id,
                value: item.value.clone(),
                target,
                is_reference: item.is_reference,
            }
        })
        .collect();

    if let NodeData::Collection(clone) = &mut dst.borrow_mut(clone_handle).data {
        clone.owner = clone_handle;
        clone.items = items;
        clone.reindex();
    }
    clone_handle
}

fn clone_dictionary(
    src: &Pool<NodeSlot>,
    _handle: NodeHandle,
    d: &DictionaryNode,
    dst: &mut Pool<NodeSlot>,
    ids: &ItemIdGenerator,
    remap: &mut IdRemap,
) -> NodeHandle {
    let clone_handle = dst.spawn(NodeSlot::new(NodeData::Dictionary(DictionaryNode::new(
        NodeHandle::NONE,
        d.identifiable,
    ))));

    let entries: Vec<DictionaryEntry> = d
        .entries
        .iter()
        .map(|entry| {
            let new_id = fresh_id(entry.id, ids, remap);
            let target = if !entry.is_reference {
                entry.target.map(|t| clone_node(src, t, dst, ids, remap))
            } else {
                None
            };
            DictionaryEntry {
                id: new_id,
                key: entry.key.clone(),
                value: entry.value.clone(),
                target,
                is_reference: entry.is_reference,
            }
        })
        .collect();

    if let NodeData::Dictionary(clone) = &mut dst.borrow_mut(clone_handle).data {
        clone.owner = clone_handle;
        clone.entries = entries;
        clone.reindex();
    }
    clone_handle
}
