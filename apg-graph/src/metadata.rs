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

//! Override metadata serialization (component H): the
//! two keyed blobs that travel with a saved asset document so overrides and
//! object references survive a save/load round trip without needing to
//! serialize the node arena itself.

use apg_core::item_id::ItemId;
use apg_core::log::Log;
use apg_core::path::NodePath;
use fxhash::FxHashMap;
use uuid::Uuid;

use crate::graph::AssetGraph;
use crate::node::{IndexedObject, NodeData, NodeHandle};
use crate::overrides::OverrideType;
use crate::resolve::resolve;

/// Paths ending on a Member step carry a content override; paths ending on
/// an Index/ItemId step carry an item (or, for dictionaries, key) override.
pub type OverrideDictionary = FxHashMap<NodePath, OverrideType>;

/// Marks the field/item at a path as a pointer to the identifiable object
/// with that uuid.
pub type ObjectReferences = FxHashMap<NodePath, Uuid>;

/// Walks the whole graph once, producing both blobs.
pub fn prepare_for_save(graph: &AssetGraph) -> (OverrideDictionary, ObjectReferences) {
    let mut overrides = OverrideDictionary::default();
    let mut refs = ObjectReferences::default();
    walk_object(graph, graph.root, NodePath::root(), &mut overrides, &mut refs);
    (overrides, refs)
}

fn walk_object(
    graph: &AssetGraph,
    node: NodeHandle,
    path: NodePath,
    overrides: &mut OverrideDictionary,
    refs: &mut ObjectReferences,
) {
    let Some(slot) = graph.nodes.try_borrow(node) else { return };
    let NodeData::Object(o) = &slot.data else { return };
    for (name, member) in o.children.clone() {
        walk_member(graph, member, path.clone().push_member(name), overrides, refs);
    }
}

fn walk_member(
    graph: &AssetGraph,
    node: NodeHandle,
    path: NodePath,
    overrides: &mut OverrideDictionary,
    refs: &mut ObjectReferences,
) {
    let Some(m) = graph.nodes.try_borrow(node).and_then(|s| s.data.as_member()) else {
        return;
    };
    let content = graph.overrides.content_override(node);
    if content != OverrideType::Base {
        overrides.insert(path.clone(), content);
    }
    if m.is_object_reference {
        if let Some(id) = m.object_reference_id {
            refs.insert(path.clone(), id.as_uuid());
        }
        return;
    }
    // A plain (non-object) reference points at something not owned by this
    // member; its own path is reached from its real owner, so don't descend.
    if m.is_reference {
        return;
    }
    if let Some(target) = m.target {
        walk_value(graph, target, path, overrides, refs);
    }
}

fn walk_value(
    graph: &AssetGraph,
    node: NodeHandle,
    path: NodePath,
    overrides: &mut OverrideDictionary,
    refs: &mut ObjectReferences,
) {
    let Some(slot) = graph.nodes.try_borrow(node) else { return };
    match &slot.data {
        NodeData::Object(_) => walk_object(graph, node, path, overrides, refs),
        NodeData::Collection(c) => walk_collection(graph, node, c, path, overrides, refs),
        NodeData::Dictionary(d) => walk_dictionary(graph, node, d, path, overrides, refs),
        NodeData::Member(_) => {}
    }
}

fn item_path(path: &NodePath, c_identifiable: bool, index: usize, id: ItemId) -> NodePath {
    if c_identifiable && !id.is_empty() {
        path.clone().push_item_id(id)
    } else {
        path.clone().push_index(index)
    }
}

fn walk_collection(
    graph: &AssetGraph,
    node: NodeHandle,
    c: &crate::node::CollectionNode,
    path: NodePath,
    overrides: &mut OverrideDictionary,
    refs: &mut ObjectReferences,
) {
    for (i, item) in c.items.iter().enumerate() {
        let item_path = item_path(&path, c.is_identifiable(), i, item.id);
        if !item.id.is_empty() {
            if graph.overrides.is_item_overridden(node, item.id) {
                overrides.insert(item_path.clone(), OverrideType::New);
            }
        }
        if item.is_reference {
            match item.target.and_then(|t| graph.nodes.try_borrow(t)).and_then(|s| s.data.as_object()).and_then(|o| o.identity) {
                Some(identity) => {
                    refs.insert(item_path, identity.as_uuid());
                }
                None => Log::warn(format!("unresolved object reference item at {item_path}")),
            }
            continue;
        }
        if let Some(target) = item.target {
            walk_value(graph, target, item_path, overrides, refs);
        }
    }
}

fn walk_dictionary(
    graph: &AssetGraph,
    node: NodeHandle,
    d: &crate::node::DictionaryNode,
    path: NodePath,
    overrides: &mut OverrideDictionary,
    refs: &mut ObjectReferences,
) {
    for (i, entry) in d.entries.iter().enumerate() {
        let entry_path = item_path(&path, d.is_identifiable(), i, entry.id);
        if !entry.id.is_empty() {
            if graph.overrides.is_item_overridden(node, entry.id) {
                overrides.insert(entry_path.clone(), OverrideType::New);
            }
            if graph.overrides.is_key_overridden(node, entry.id) {
                overrides.insert(entry_path.clone(), OverrideType::New);
            }
        }
        if entry.is_reference {
            match entry.target.and_then(|t| graph.nodes.try_borrow(t)).and_then(|s| s.data.as_object()).and_then(|o| o.identity) {
                Some(identity) => {
                    refs.insert(entry_path, identity.as_uuid());
                }
                None => Log::warn(format!("unresolved object reference entry at {entry_path}")),
            }
            continue;
        }
        if let Some(target) = entry.target {
            walk_value(graph, target, entry_path, overrides, refs);
        }
    }
}

/// Applies a previously-saved blob pair back onto `graph`.
/// `identities` maps an object's identity to its node, used to re-wire each
/// `ObjectReferences` entry; pass the map `crate::build::build_from_tree`
/// returned alongside the graph it just built.
pub fn apply_metadata(
    graph: &mut AssetGraph,
    overrides: &OverrideDictionary,
    refs: &ObjectReferences,
    identities: &FxHashMap<ItemId, NodeHandle>,
) {
    for (path, ty) in overrides {
        let Some(resolved) = resolve(&graph.nodes, graph.root, path) else {
            Log::warn(format!("dropping override metadata at unreachable path {path}"));
            continue;
        };
        apply_override(graph, &resolved, *ty);
    }
    for (path, uuid) in refs {
        let Some(resolved) = resolve(&graph.nodes, graph.root, path) else {
            Log::warn(format!("dropping object reference metadata at unreachable path {path}"));
            continue;
        };
        let identity = ItemId::from_uuid(*uuid);
        apply_object_reference(graph, &resolved, identity, identities.get(&identity).copied());
    }
}

fn apply_override(graph: &mut AssetGraph, resolved: &crate::resolve::Resolved, ty: OverrideType) {
    if resolved.resolved_on_index {
        let Some(index) = resolved.index else { return };
        let id = match graph.nodes.try_borrow(resolved.node).map(|s| &s.data) {
            Some(NodeData::Collection(c)) => c.item_id_at(index),
            Some(NodeData::Dictionary(d)) => d.item_id_at(index),
            _ => return,
        };
        if id.is_empty() {
            return;
        }
        let overridden = ty != OverrideType::Base;
        graph.overrides.set_item_override(resolved.node, id, overridden);
    } else {
        let can_override = graph
            .nodes
            .try_borrow(resolved.node)
            .and_then(|s| s.data.as_member())
            .map(|m| m.can_override)
            .unwrap_or(false);
        graph.overrides.set_content_override(resolved.node, ty, can_override);
    }
}

fn apply_object_reference(
    graph: &mut AssetGraph,
    resolved: &crate::resolve::Resolved,
    identity: ItemId,
    target: Option<NodeHandle>,
) {
    if resolved.resolved_on_index {
        let Some(index) = resolved.index else { return };
        if let Some(slot) = graph.nodes.try_borrow_mut(resolved.node) {
            match &mut slot.data {
                NodeData::Collection(c) => {
                    if let Some(item) = c.items.get_mut(index) {
                        item.is_reference = true;
                        item.target = target;
                    }
                }
                NodeData::Dictionary(d) => {
                    if let Some(entry) = d.entries.get_mut(index) {
                        entry.is_reference = true;
                        entry.target = target;
                    }
                }
                _ => {}
            }
        }
        if target.is_none() {
            Log::warn(format!("object reference to {identity} left unresolved"));
        }
    } else if let Some(m) = graph.nodes.try_borrow_mut(resolved.node).and_then(|s| s.data.as_member_mut()) {
        m.is_reference = true;
        m.is_object_reference = true;
        m.object_reference_id = Some(identity);
        m.target = target;
        if target.is_none() {
            Log::warn(format!("object reference to {identity} left unresolved"));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use apg_core::value::PrimitiveValue;

    #[test]
    fn round_trips_a_member_override() {
        let mut graph = AssetGraph::new();
        let member = {
            let child = graph.nodes.spawn(crate::node::NodeSlot::new(NodeData::Member(crate::node::MemberNode {
                name: "color".into(),
                declared_type: "I64",
                owner: graph.root,
                value: Some(PrimitiveValue::I64(1)),
                target: None,
                is_reference: false,
                is_object_reference: false,
                object_reference_id: None,
                can_override: true,
            })));
            if let NodeData::Object(o) = &mut graph.nodes.borrow_mut(graph.root).data {
                o.set_child("color", child);
            }
            child
        };
        graph.update_member(member, PrimitiveValue::I64(2));

        let (overrides, refs) = prepare_for_save(&graph);
        assert!(refs.is_empty());
        let path = NodePath::root().push_member("color");
        assert_eq!(overrides.get(&path), Some(&OverrideType::New));

        let mut fresh = AssetGraph::new();
        let fresh_member = {
            let child = fresh.nodes.spawn(crate::node::NodeSlot::new(NodeData::Member(crate::node::MemberNode {
                name: "color".into(),
                declared_type: "I64",
                owner: fresh.root,
                value: Some(PrimitiveValue::I64(1)),
                target: None,
                is_reference: false,
                is_object_reference: false,
                object_reference_id: None,
                can_override: true,
            })));
            if let NodeData::Object(o) = &mut fresh.nodes.borrow_mut(fresh.root).data {
                o.set_child("color", child);
            }
            child
        };
        apply_metadata(&mut fresh, &overrides, &refs, &FxHashMap::default());
        assert_eq!(fresh.overrides.content_override(fresh_member), OverrideType::New);
    }
}
