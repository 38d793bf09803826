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

//! Builds an [`crate::graph::AssetGraph`] from a loaded asset tree. Must
//! tolerate cycles among identifiable objects reached through references.
//!
//! [`TreeValue`] is the input shape a loader hands to [`build_from_tree`]: a
//! plain description of a reflected asset value — owned structural children,
//! primitive leaves, and by-id pointers to other identifiable objects in the
//! same tree. It plays the role `dyn Reflect` plays in the source: the thing
//! the graph is built *from*, not a type the graph itself needs to know.
//!
//! Building is two passes because a pointer may target an object not yet
//! built (forward reference) or, through a cycle, one that never finishes
//! building before the pointer is reached. Pass 1 builds every owned node
//! and records `identity → NodeHandle` as each identifiable object is
//! created; pass 2 resolves every recorded pointer against that map.

use apg_core::item_id::ItemId;
use apg_core::log::Log;
use apg_core::pool::Pool;
use apg_core::value::{DictKey, PrimitiveValue};
use fxhash::FxHashMap;

use crate::node::{
    CollectionItem, CollectionNode, DictionaryEntry, DictionaryNode, MemberNode, NodeData,
    NodeHandle, NodeSlot, ObjectNode,
};

/// A structural value: either a reflected object with named fields, or a
/// bare collection/dictionary (used for the asset root when it is itself a
/// list, and for nested container fields).
pub enum TreeValue {
    Object(TreeObject),
    Collection(Vec<TreeItem>),
    Dictionary(Vec<(DictKey, TreeItem)>),
}

pub struct TreeObject {
    /// Set iff this object is itself addressable by object reference.
    pub identity: Option<ItemId>,
    pub fields: Vec<TreeField>,
}

pub struct TreeField {
    pub name: String,
    pub declared_type: &'static str,
    pub can_override: bool,
    pub content: TreeFieldContent,
}

pub enum TreeFieldContent {
    Value(PrimitiveValue),
    /// Structural containment: the field owns a nested object/collection/dictionary.
    Owned(TreeValue),
    /// A non-owning pointer elsewhere in the graph (`is_reference`, not an
    /// object reference — e.g. a scene-graph child slot).
    Pointer(Box<TreeValue>),
    /// A by-id pointer to another identifiable object in the same tree
    /// (`is_object_reference`).
    ObjectReference(ItemId),
}

pub struct TreeItem {
    /// `ItemId::EMPTY` if the owning collection/dictionary is not identifiable.
    pub id: ItemId,
    pub content: TreeItemContent,
}

pub enum TreeItemContent {
    Value(PrimitiveValue),
    Owned(TreeValue),
    ObjectReference(ItemId),
}

/// A pending object-reference write, resolved in pass 2 once every
/// identifiable object has been built.
struct PendingReference {
    member: NodeHandle,
    target_identity: ItemId,
}

/// Builds a fresh arena and root handle from `root`, along with the
/// identity→node map assembled while building it (callers that need to
/// re-wire saved metadata, e.g. `crate::metadata::apply_metadata`, pass this
/// straight through rather than re-walking the graph for it). Dangling
/// object references (an id with no matching identity anywhere in the tree)
/// are logged and left unresolved rather than treated as fatal —
/// `PathUnreachable`-style failures are always recovered locally.
pub fn build_from_tree(root: TreeValue) -> (Pool<NodeSlot>, NodeHandle, FxHashMap<ItemId, NodeHandle>) {
    let mut nodes = Pool::new();
    let mut identities: FxHashMap<ItemId, NodeHandle> = FxHashMap::default();
    let mut pending = Vec::new();

    let root_handle = build_value(&mut nodes, None, root, &mut identities, &mut pending);

    for p in pending {
        match identities.get(&p.target_identity) {
            Some(&target) => {
                if let NodeData::Member(m) = &mut nodes.borrow_mut(p.member).data {
                    m.target = Some(target);
                }
            }
            None => Log::warn(format!(
                "dangling object reference to {} while building asset graph",
                p.target_identity
            )),
        }
    }

    (nodes, root_handle, identities)
}

fn build_value(
    nodes: &mut Pool<NodeSlot>,
    owner: Option<NodeHandle>,
    value: TreeValue,
    identities: &mut FxHashMap<ItemId, NodeHandle>,
    pending: &mut Vec<PendingReference>,
) -> NodeHandle {
    match value {
        TreeValue::Object(o) => build_object(nodes, owner, o, identities, pending),
        TreeValue::Collection(items) => build_collection(nodes, owner, items, identities, pending),
        TreeValue::Dictionary(entries) => build_dictionary(nodes, owner, entries, identities, pending),
    }
}

fn build_object(
    nodes: &mut Pool<NodeSlot>,
    owner: Option<NodeHandle>,
    o: TreeObject,
    identities: &mut FxHashMap<ItemId, NodeHandle>,
    pending: &mut Vec<PendingReference>,
) -> NodeHandle {
    let handle = nodes.spawn(NodeSlot::new(NodeData::Object(ObjectNode {
        owner,
        identity: o.identity,
        children: Vec::new(),
    })));
    if let Some(id) = o.identity {
        identities.insert(id, handle);
    }

    let mut children = Vec::with_capacity(o.fields.len());
    for field in o.fields {
        let member = build_member(nodes, handle, field, identities, pending);
        let name = nodes
            .try_borrow(member)
            .and_then(|s| s.data.as_member())
            .map(|m| m.name.clone())
            .unwrap_or_default();
        children.push((name, member));
    }
    if let NodeData::Object(obj) = &mut nodes.borrow_mut(handle).data {
        obj.children = children;
    }
    handle
}

fn build_member(
    nodes: &mut Pool<NodeSlot>,
    owner: NodeHandle,
    field: TreeField,
    identities: &mut FxHashMap<ItemId, NodeHandle>,
    pending: &mut Vec<PendingReference>,
) -> NodeHandle {
    let handle = nodes.spawn(NodeSlot::new(NodeData::Member(MemberNode {
        name: field.name,
        declared_type: field.declared_type,
        owner,
        value: None,
        target: None,
        is_reference: false,
        is_object_reference: false,
        object_reference_id: None,
        can_override: field.can_override,
    })));

    match field.content {
        TreeFieldContent::Value(v) => {
            if let NodeData::Member(m) = &mut nodes.borrow_mut(handle).data {
                m.value = Some(v);
            }
        }
        TreeFieldContent::Owned(value) => {
            let child = build_value(nodes, Some(handle), value, identities, pending);
            if let NodeData::Member(m) = &mut nodes.borrow_mut(handle).data {
                m.target = Some(child);
            }
        }
        TreeFieldContent::Pointer(value) => {
            let child = build_value(nodes, None, *value, identities, pending);
            if let NodeData::Member(m) = &mut nodes.borrow_mut(handle).data {
                m.is_reference = true;
                m.target = Some(child);
            }
        }
        TreeFieldContent::ObjectReference(target_identity) => {
            if let NodeData::Member(m) = &mut nodes.borrow_mut(handle).data {
                m.is_reference = true;
                m.is_object_reference = true;
                m.object_reference_id = Some(target_identity);
            }
            pending.push(PendingReference { member: handle, target_identity });
        }
    }
    handle
}

fn build_collection(
    nodes: &mut Pool<NodeSlot>,
    owner: Option<NodeHandle>,
    items: Vec<TreeItem>,
    identities: &mut FxHashMap<ItemId, NodeHandle>,
    pending: &mut Vec<PendingReference>,
) -> NodeHandle {
    let identifiable = items.iter().any(|i| !i.id.is_empty());
    let handle = nodes.spawn(NodeSlot::new(NodeData::Collection(CollectionNode::new(
        owner.unwrap_or(NodeHandle::NONE),
        identifiable,
    ))));

    let built: Vec<CollectionItem> = items
        .into_iter()
        .map(|item| match item.content {
            TreeItemContent::Value(v) => CollectionItem {
                id: item.id,
                value: Some(v),
                target: None,
                is_reference: false,
            },
            TreeItemContent::Owned(value) => {
                let target = build_value(nodes, Some(handle), value, identities, pending);
                CollectionItem {
                    id: item.id,
                    value: None,
                    target: Some(target),
                    is_reference: false,
                }
            }
            TreeItemContent::ObjectReference(target_identity) => {
                // An item-level object reference is resolved the same way as
                // a member's (`crate::reconcile::should_reconcile_member`
                // generalizes to items via the registry too), but pass 2
                // here only wires member targets; item-level references are
                // wired by the caller once the identity map is complete,
                // via `identities.get(&target_identity)`.
                let target = identities.get(&target_identity).copied();
                CollectionItem {
                    id: item.id,
                    value: None,
                    target,
                    is_reference: true,
                }
            }
        })
        .collect();

    if let NodeData::Collection(c) = &mut nodes.borrow_mut(handle).data {
        c.owner = handle;
        c.items = built;
        c.reindex();
    }
    handle
}

fn build_dictionary(
    nodes: &mut Pool<NodeSlot>,
    owner: Option<NodeHandle>,
    entries: Vec<(DictKey, TreeItem)>,
    identities: &mut FxHashMap<ItemId, NodeHandle>,
    pending: &mut Vec<PendingReference>,
) -> NodeHandle {
    let identifiable = entries.iter().any(|(_, i)| !i.id.is_empty());
    let handle = nodes.spawn(NodeSlot::new(NodeData::Dictionary(DictionaryNode::new(
        owner.unwrap_or(NodeHandle::NONE),
        identifiable,
    ))));

    let built: Vec<DictionaryEntry> = entries
        .into_iter()
        .map(|(key, item)| match item.content {
            TreeItemContent::Value(v) => DictionaryEntry {
                id: item.id,
                key,
                value: Some(v),
                target: None,
                is_reference: false,
            },
            TreeItemContent::Owned(value) => {
                let target = build_value(nodes, Some(handle), value, identities, pending);
                DictionaryEntry {
                    id: item.id,
                    key,
                    value: None,
                    target: Some(target),
                    is_reference: false,
                }
            }
            TreeItemContent::ObjectReference(target_identity) => {
                let target = identities.get(&target_identity).copied();
                DictionaryEntry {
                    id: item.id,
                    key,
                    value: None,
                    target,
                    is_reference: true,
                }
            }
        })
        .collect();

    if let NodeData::Dictionary(d) = &mut nodes.borrow_mut(handle).data {
        d.owner = handle;
        d.entries = built;
        d.reindex();
    }
    handle
}
