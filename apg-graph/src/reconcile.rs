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

//! The reconciler (component G): enforces "unoverridden ⇒
//! equal to base" across members, collections and dictionaries.
//!
//! A derived graph's base lives in a *different* arena, owned by a sibling
//! [`crate::graph::AssetGraph`]. Every function here that
//! touches the base side takes that arena as an explicit `&Pool<NodeSlot>`
//! parameter rather than assuming it shares `graph.nodes` — the same
//! two-arena shape `crate::linker` already uses.

use apg_core::item_id::ItemId;
use apg_core::log::Log;
use apg_core::pool::Pool;
use apg_core::value::PrimitiveValue;

use crate::clone::clone_subtree;
use crate::graph::AssetGraph;
use crate::linker::IdentityFindTarget;
use crate::listener::{ChangeEvent, ItemChangeKind};
use crate::node::{IndexedObject, ItemContent, NodeData, NodeHandle, NodeSlot};
use crate::overrides::OverrideType;

/// Reconciliation-time veto (`can_update`): lets an asset
/// subtype refuse an insert the base side would otherwise apply.
pub trait CanUpdate {
    fn can_update(&self, _node: NodeHandle, _kind: ItemChangeKind, _value: &PrimitiveValue) -> bool {
        true
    }
}

/// Default policy: never vetoes. `can_update` is invoked uniformly from
/// every insertion path below, not just some.
pub struct AlwaysUpdate;

impl CanUpdate for AlwaysUpdate {}

/// Reconciles from `node`, or the asset
/// root if `None`, recursively, against `base_nodes`. A graph with no base
/// (`base_nodes` is `None`) has nothing to reconcile against. The whole pass
/// runs with `reconciling` set, so every write it performs is attributed to
/// the base rather than stamped as a local override.
pub fn reconcile_with_base(
    graph: &mut AssetGraph,
    base_nodes: Option<&Pool<NodeSlot>>,
    node: Option<NodeHandle>,
    can_update: &dyn CanUpdate,
) {
    let Some(base_nodes) = base_nodes else { return };
    let start = node.unwrap_or(graph.root);
    graph.set_reconciling(true);
    reconcile_node(graph, base_nodes, start, can_update);
    graph.set_reconciling(false);
}

fn reconcile_node(graph: &mut AssetGraph, base_nodes: &Pool<NodeSlot>, node: NodeHandle, can_update: &dyn CanUpdate) {
    let Some(slot) = graph.nodes.try_borrow(node) else { return };
    match &slot.data {
        NodeData::Object(o) => {
            let children: Vec<NodeHandle> = o.children.iter().map(|(_, h)| *h).collect();
            for child in children {
                reconcile_member(graph, base_nodes, child, can_update);
            }
        }
        NodeData::Member(_) => reconcile_member(graph, base_nodes, node, can_update),
        NodeData::Collection(_) | NodeData::Dictionary(_) => {
            reconcile_indexed(graph, base_nodes, node, can_update)
        }
    }
}

/// Decides whether to overwrite, and if so whether by resolving a
/// base object reference or by deep-cloning the base value.
enum MemberDecision {
    Skip,
    ReplaceWithDerivedOf(NodeHandle),
    ReplaceWithBaseClone,
}

fn should_reconcile_member(
    graph: &AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    member: NodeHandle,
    base: NodeHandle,
) -> MemberDecision {
    let Some(base_m) = base_nodes.try_borrow(base).and_then(|s| s.data.as_member()) else {
        return MemberDecision::Skip;
    };
    let Some(derived_m) = graph.nodes.try_borrow(member).and_then(|s| s.data.as_member()) else {
        return MemberDecision::Skip;
    };

    if base_m.is_object_reference {
        let Some(base_id) = base_m.object_reference_id else {
            return MemberDecision::Skip;
        };
        let expected = graph.registry.resolve(base_id);
        return match expected {
            Some(expected) if derived_m.target != Some(expected) => MemberDecision::ReplaceWithDerivedOf(expected),
            _ => MemberDecision::Skip,
        };
    }

    let derived_is_complex = derived_m.target.is_some();
    let base_is_complex = base_m.target.is_some();
    if derived_is_complex || base_is_complex {
        return if derived_is_complex != base_is_complex {
            MemberDecision::ReplaceWithBaseClone
        } else {
            MemberDecision::Skip
        };
    }

    if derived_m.value != base_m.value {
        MemberDecision::ReplaceWithBaseClone
    } else {
        MemberDecision::Skip
    }
}

fn reconcile_member(graph: &mut AssetGraph, base_nodes: &Pool<NodeSlot>, member: NodeHandle, can_update: &dyn CanUpdate) {
    let Some(m) = graph.nodes.try_borrow(member).and_then(|s| s.data.as_member()) else {
        return;
    };
    if !m.can_override || graph.overrides.content_override(member) == OverrideType::New {
        return;
    }
    let Some(base) = graph.nodes.try_borrow(member).and_then(|s| s.base_link) else {
        return;
    };

    match should_reconcile_member(graph, base_nodes, member, base) {
        MemberDecision::Skip => {
            // Equal already (or no base); still recurse so nested
            // collections/dictionaries run their own item-level pass.
            let target = graph
                .nodes
                .try_borrow(member)
                .and_then(|s| s.data.as_member())
                .and_then(|m| if m.is_reference { None } else { m.target });
            if let Some(t) = target {
                reconcile_node(graph, base_nodes, t, can_update);
            }
        }
        MemberDecision::ReplaceWithDerivedOf(derived_target) => {
            graph.update_member_target(member, derived_target);
        }
        MemberDecision::ReplaceWithBaseClone => {
            let base_value = base_nodes.try_borrow(base).and_then(|s| s.data.as_member()).and_then(|m| m.value.clone());
            let base_target = base_nodes.try_borrow(base).and_then(|s| s.data.as_member()).and_then(|m| m.target);

            if let Some(value) = base_value {
                if can_update.can_update(member, ItemChangeKind::Update, &value) {
                    graph.update_member(member, value);
                }
            } else if let Some(base_target) = base_target {
                let (clone_root, _remap) = clone_subtree(base_nodes, base_target, &mut graph.nodes, &graph.ids);
                graph.update_member_target(member, clone_root);
                Log::verify(crate::linker::link_to_base(
                    &mut graph.nodes,
                    clone_root,
                    base_nodes,
                    base_target,
                    &mut graph.registry,
                    &IdentityFindTarget,
                ));
            }
        }
    }
}

fn reconcile_indexed(graph: &mut AssetGraph, base_nodes: &Pool<NodeSlot>, node: NodeHandle, can_update: &dyn CanUpdate) {
    let Some(base) = graph.nodes.try_borrow(node).and_then(|s| s.base_link) else {
        return;
    };
    let is_collection = graph.nodes.try_borrow(node).and_then(|s| s.data.as_collection()).is_some();
    if is_collection {
        reconcile_collection(graph, base_nodes, node, base, can_update);
    } else if graph.nodes.try_borrow(node).and_then(|s| s.data.as_dictionary()).is_some() {
        reconcile_dictionary(graph, base_nodes, node, base, can_update);
    }
}

/// Builds the content for a base-only item/entry pass 2 is about to insert,
/// when the base side has no primitive value (`target: Some`). A reference
/// item resolves to its derived counterpart via the registry, the same way
/// an object-reference member does; a structural item is deep-cloned into
/// `graph.nodes` with fresh identifiers (`clone::clone_subtree`) and base-
/// linked, just like a member's `ReplaceWithBaseClone`. Returns `None` if
/// there is nothing to insert yet — a reference whose target isn't
/// registered on the derived side will resolve on a later pass.
fn clone_base_item_content(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    target: Option<NodeHandle>,
    is_reference: bool,
) -> Option<ItemContent> {
    let base_target = target?;
    if is_reference {
        let identity = base_nodes.try_borrow(base_target).and_then(|s| s.data.as_object()).and_then(|o| o.identity)?;
        let derived_target = graph.registry.resolve(identity)?;
        return Some(ItemContent::Target { node: derived_target, is_reference: true });
    }
    let (clone_root, _remap) = clone_subtree(base_nodes, base_target, &mut graph.nodes, &graph.ids);
    Log::verify(crate::linker::link_to_base(
        &mut graph.nodes,
        clone_root,
        base_nodes,
        base_target,
        &mut graph.registry,
        &IdentityFindTarget,
    ));
    Some(ItemContent::Target { node: clone_root, is_reference: false })
}

fn reconcile_collection(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    node: NodeHandle,
    base: NodeHandle,
    can_update: &dyn CanUpdate,
) {
    let Some(derived) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_collection()) else {
        return;
    };
    if !derived.identifiable {
        return;
    }
    let Some(base_c) = base_nodes.try_borrow(base).and_then(|s| s.data.as_collection()) else {
        return;
    };

    // Pass 1: removals + deleted-set cleanup.
    let mut to_remove = Vec::new();
    for item in &derived.items {
        if graph.overrides.is_item_overridden(node, item.id) {
            continue;
        }
        if item.id.is_empty() || base_c.index_of(item.id).is_none() {
            to_remove.push(item.id);
        }
    }
    for id in graph.overrides.deleted_items(node).collect::<Vec<_>>() {
        if base_c.index_of(id).is_none() {
            graph.overrides.clear_deleted(node, id);
        }
    }

    // Pass 2: additions + in-place reconciliation, base order.
    let base_order: Vec<(ItemId, usize)> = base_c.items.iter().enumerate().map(|(i, it)| (it.id, i)).collect();
    let mut to_insert = Vec::new();
    for (id, base_index) in &base_order {
        if graph.overrides.is_deleted(node, *id) {
            continue;
        }
        let derived_index = graph.nodes.try_borrow(node).and_then(|s| s.data.as_collection()).and_then(|c| c.index_of(*id));
        match derived_index {
            None => to_insert.push((*id, *base_index)),
            Some(derived_index) => {
                if !graph.overrides.is_item_overridden(node, *id) {
                    reconcile_item_value(graph, base_nodes, node, base, derived_index, *base_index, can_update);
                }
            }
        }
    }

    for id in to_remove {
        let Some(idx) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_collection()).and_then(|c| c.index_of(id)) else {
            continue;
        };
        graph.remove_collection_item(node, idx);
    }

    for (id, base_index) in to_insert {
        let Some(base_item) = base_c.items.get(base_index) else { continue };
        let content = match base_item.value.clone() {
            Some(value) => {
                if !can_update.can_update(node, ItemChangeKind::Add, &value) {
                    graph.overrides.clear_deleted(node, id);
                    continue;
                }
                ItemContent::Value(value)
            }
            None => {
                let Some(content) = clone_base_item_content(graph, base_nodes, base_item.target, base_item.is_reference) else {
                    continue;
                };
                content
            }
        };
        let insert_at = insertion_index(graph, node, base_c, base_index);
        graph.restore_collection_item(node, insert_at, content, id);
    }

    // Recurse into structural (non-reference) items to reconcile nested
    // sub-objects after this level's own item set has settled.
    let targets: Vec<NodeHandle> = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_collection())
        .map(|c| c.items.iter().filter(|i| !i.is_reference).filter_map(|i| i.target).collect())
        .unwrap_or_default();
    for t in targets {
        reconcile_node(graph, base_nodes, t, can_update);
    }
}

/// Scans base indices `base_index-1, base_index-2, …, 0`; for the
/// first id that also exists in the derived node, insert at
/// `derived_position(id) + 1`. If none found, insert at 0.
fn insertion_index(graph: &AssetGraph, node: NodeHandle, base_c: &crate::node::CollectionNode, base_index: usize) -> usize {
    let Some(derived_c) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_collection()) else {
        return 0;
    };
    for i in (0..base_index).rev() {
        let candidate = base_c.items[i].id;
        if let Some(pos) = derived_c.index_of(candidate) {
            return pos + 1;
        }
    }
    0
}

fn reconcile_item_value(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    node: NodeHandle,
    base: NodeHandle,
    derived_index: usize,
    base_index: usize,
    can_update: &dyn CanUpdate,
) {
    let derived_value = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_collection())
        .and_then(|c| c.items.get(derived_index))
        .and_then(|i| i.value.clone());
    let base_value = base_nodes
        .try_borrow(base)
        .and_then(|s| s.data.as_collection())
        .and_then(|c| c.items.get(base_index))
        .and_then(|i| i.value.clone());

    if derived_value == base_value {
        return;
    }
    if let Some(value) = base_value {
        if can_update.can_update(node, ItemChangeKind::Update, &value) {
            graph.update_collection_item(node, derived_index, value);
        }
    }
}

fn reconcile_dictionary(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    node: NodeHandle,
    base: NodeHandle,
    can_update: &dyn CanUpdate,
) {
    let Some(derived) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_dictionary()) else {
        return;
    };
    if !derived.identifiable {
        return;
    }
    let Some(base_d) = base_nodes.try_borrow(base).and_then(|s| s.data.as_dictionary()) else {
        return;
    };

    let mut to_remove = Vec::new();
    for entry in &derived.entries {
        if graph.overrides.is_item_overridden(node, entry.id) {
            continue;
        }
        if entry.id.is_empty() || base_d.index_of(entry.id).is_none() {
            to_remove.push(entry.id);
        }
    }
    for id in graph.overrides.deleted_items(node).collect::<Vec<_>>() {
        if base_d.index_of(id).is_none() {
            graph.overrides.clear_deleted(node, id);
        }
    }

    let base_order: Vec<(ItemId, usize)> = base_d.entries.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
    let mut to_insert = Vec::new();
    for (id, base_index) in &base_order {
        if graph.overrides.is_deleted(node, *id) {
            continue;
        }
        let derived_index = graph.nodes.try_borrow(node).and_then(|s| s.data.as_dictionary()).and_then(|d| d.index_of(*id));
        match derived_index {
            None => {
                let base_entry_key = &base_d.entries[*base_index].key;
                let collides = graph
                    .nodes
                    .try_borrow(node)
                    .and_then(|s| s.data.as_dictionary())
                    .map(|d| d.index_of_key(base_entry_key).is_some())
                    .unwrap_or(false);
                to_insert.push((*id, *base_index, !collides));
            }
            Some(derived_index) => {
                if !graph.overrides.is_item_overridden(node, *id) {
                    reconcile_entry_value(graph, base_nodes, node, base, derived_index, *base_index, can_update);
                }
                if !graph.overrides.is_key_overridden(node, *id) {
                    reconcile_entry_key(graph, base_nodes, node, base, derived_index, *base_index);
                }
            }
        }
    }

    for id in to_remove {
        let Some(idx) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_dictionary()).and_then(|d| d.index_of(id)) else {
            continue;
        };
        graph.remove_dictionary_entry(node, idx);
    }

    for (id, base_index, should_insert) in to_insert {
        if !should_insert {
            // Key collision: records the id as deleted instead of
            // inserting (`ApgError::BaseLinkCollision`, recovered silently).
            graph.overrides.clear_deleted(node, id);
            continue;
        }
        let entry = base_d.entries.get(base_index).cloned();
        let Some(entry) = entry else { continue };
        let content = match entry.value.clone() {
            Some(value) => {
                if !can_update.can_update(node, ItemChangeKind::Add, &value) {
                    continue;
                }
                ItemContent::Value(value)
            }
            None => {
                let Some(content) = clone_base_item_content(graph, base_nodes, entry.target, entry.is_reference) else {
                    continue;
                };
                content
            }
        };
        graph.insert_dictionary_entry(node, entry.key, content, id);
    }

    let targets: Vec<NodeHandle> = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_dictionary())
        .map(|d| d.entries.iter().filter(|e| !e.is_reference).filter_map(|e| e.target).collect())
        .unwrap_or_default();
    for t in targets {
        reconcile_node(graph, base_nodes, t, can_update);
    }
}

fn reconcile_entry_value(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    node: NodeHandle,
    base: NodeHandle,
    derived_index: usize,
    base_index: usize,
    can_update: &dyn CanUpdate,
) {
    let derived_value = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_dictionary())
        .and_then(|d| d.entries.get(derived_index))
        .and_then(|e| e.value.clone());
    let base_value = base_nodes
        .try_borrow(base)
        .and_then(|s| s.data.as_dictionary())
        .and_then(|d| d.entries.get(base_index))
        .and_then(|e| e.value.clone());
    if derived_value == base_value {
        return;
    }
    if let Some(value) = base_value {
        if can_update.can_update(node, ItemChangeKind::Update, &value) {
            let id = graph
                .nodes
                .try_borrow(node)
                .and_then(|s| s.data.as_dictionary())
                .and_then(|d| d.entries.get(derived_index))
                .map(|e| e.id);
            if let Some(id) = id {
                update_dictionary_value(graph, node, derived_index, id, value);
            }
        }
    }
}

/// Dictionary-entry counterpart of `AssetGraph::update_collection_item`;
/// kept here rather than on `AssetGraph` since only the reconciler writes a
/// dictionary value in place (ordinary mutation always goes through
/// `insert_dictionary_entry`/`remove_dictionary_entry`).
fn update_dictionary_value(graph: &mut AssetGraph, node: NodeHandle, index: usize, item_id: ItemId, new_value: PrimitiveValue) {
    let old_value = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_dictionary())
        .and_then(|d| d.entries.get(index))
        .and_then(|e| e.value.clone());
    graph.changes.broadcast(&ChangeEvent::ItemChanging {
        node,
        kind: ItemChangeKind::Update,
        index,
        old_value,
    });
    if let Some(d) = graph.nodes.try_borrow_mut(node).and_then(|s| s.data.as_dictionary_mut()) {
        if let Some(e) = d.entries.get_mut(index) {
            e.value = Some(new_value.clone());
        }
    }
    graph.changes.broadcast(&ChangeEvent::ItemChanged {
        node,
        kind: ItemChangeKind::Update,
        index,
        new_value: Some(new_value),
    });
    let has_base = graph.nodes.try_borrow(node).is_some_and(|s| s.base_link.is_some());
    let (prev, new) = graph
        .overrides
        .on_item_changed(node, item_id, ItemChangeKind::Update, has_base, graph.is_reconciling());
    if prev != new {
        graph.changes.broadcast(&ChangeEvent::ItemContentChanged {
            node,
            item_id,
            prev_override: prev,
            new_override: new,
        });
    }
}

fn reconcile_entry_key(
    graph: &mut AssetGraph,
    base_nodes: &Pool<NodeSlot>,
    node: NodeHandle,
    base: NodeHandle,
    derived_index: usize,
    base_index: usize,
) {
    let derived_key = graph
        .nodes
        .try_borrow(node)
        .and_then(|s| s.data.as_dictionary())
        .and_then(|d| d.entries.get(derived_index))
        .map(|e| e.key.clone());
    let base_key = base_nodes
        .try_borrow(base)
        .and_then(|s| s.data.as_dictionary())
        .and_then(|d| d.entries.get(base_index))
        .map(|e| e.key.clone());
    if derived_key == base_key {
        return;
    }
    let Some(new_key) = base_key else { return };
    graph.move_dictionary_entry_key(node, derived_index, new_key);
}
