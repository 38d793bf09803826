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

//! Path resolution. Every failure mode is fail-soft: an
//! unreachable path is `None`, never a panic or an error the caller must
//! propagate. Metadata load (H) relies on this to skip stale entries.

use apg_core::path::{NodePath, PathStep};
use apg_core::pool::Pool;

use crate::node::{IndexedObject, NodeData, NodeHandle, NodeSlot};

/// The result of walking a [`NodePath`] to its end.
pub struct Resolved {
    /// The node the path's last step landed on. For a member-terminated
    /// path this is the `MemberNode`; for an index-terminated path this is
    /// the `CollectionNode`/`DictionaryNode` the index selects into.
    pub node: NodeHandle,
    /// The index selected by the last step, if the path ends on one.
    pub index: Option<usize>,
    /// `true` iff the path ends on an `Index`/`ItemId` step. Mirrors
    /// `NodePath::ends_on_index` but computed from the actual walk, for
    /// callers that only have the `Resolved` value in hand.
    pub resolved_on_index: bool,
}

/// Walks `path` starting at `root`. Returns `None` on
/// any of the failure modes named there: a step through a non-existent
/// child, a kind mismatch, or an id absent from an id map.
pub fn resolve(nodes: &Pool<NodeSlot>, root: NodeHandle, path: &NodePath) -> Option<Resolved> {
    let mut current = root;
    let mut index: Option<usize> = None;
    let mut resolved_on_index = false;
    let steps = path.steps();

    for (i, step) in steps.iter().enumerate() {
        let is_last = i + 1 == steps.len();
        match step {
            PathStep::Member(name) => {
                let object = follow_to_object(nodes, current)?;
                let child = object.child(name)?;
                current = child;
                index = None;
                resolved_on_index = false;
            }
            PathStep::Index(i) => {
                let target = follow_to_indexed(nodes, current)?;
                if *i >= indexed_len(nodes, target)? {
                    return None;
                }
                index = Some(*i);
                resolved_on_index = true;
                current = target;
                if !is_last {
                    current = indexed_target_object(nodes, target, *i)?;
                }
            }
            PathStep::ItemId(id) => {
                let target = follow_to_indexed(nodes, current)?;
                let at = index_of(nodes, target, *id)?;
                index = Some(at);
                resolved_on_index = true;
                current = target;
                if !is_last {
                    current = indexed_target_object(nodes, target, at)?;
                }
            }
        }
    }

    Some(Resolved {
        node: current,
        index,
        resolved_on_index,
    })
}

/// If `handle` is a reference member, follows it to its target; otherwise
/// returns `handle` unchanged. Used before every `Member`/`Index` step: if
/// current is a reference, follow to its target before descending further.
fn follow(nodes: &Pool<NodeSlot>, handle: NodeHandle) -> Option<NodeHandle> {
    let slot = nodes.try_borrow(handle)?;
    match &slot.data {
        NodeData::Member(m) if m.is_complex() => m.target,
        _ => Some(handle),
    }
}

fn follow_to_object<'a>(
    nodes: &'a Pool<NodeSlot>,
    handle: NodeHandle,
) -> Option<&'a crate::node::ObjectNode> {
    let target = follow(nodes, handle)?;
    nodes.try_borrow(target)?.data.as_object()
}

fn follow_to_indexed(nodes: &Pool<NodeSlot>, handle: NodeHandle) -> Option<NodeHandle> {
    let target = follow(nodes, handle)?;
    let slot = nodes.try_borrow(target)?;
    if slot.data.is_indexed() {
        Some(target)
    } else {
        None
    }
}

fn indexed_len(nodes: &Pool<NodeSlot>, indexed: NodeHandle) -> Option<usize> {
    let slot = nodes.try_borrow(indexed)?;
    match &slot.data {
        NodeData::Collection(c) => Some(c.len()),
        NodeData::Dictionary(d) => Some(d.len()),
        _ => None,
    }
}

fn indexed_target_object(
    nodes: &Pool<NodeSlot>,
    indexed: NodeHandle,
    at: usize,
) -> Option<NodeHandle> {
    let slot = nodes.try_borrow(indexed)?;
    match &slot.data {
        NodeData::Collection(c) => {
            let item = c.items.get(at)?;
            if item.is_reference {
                item.target
            } else {
                Some(indexed)
            }
        }
        NodeData::Dictionary(d) => {
            let entry = d.entries.get(at)?;
            if entry.is_reference {
                entry.target
            } else {
                Some(indexed)
            }
        }
        _ => None,
    }
}

fn index_of(nodes: &Pool<NodeSlot>, indexed: NodeHandle, id: apg_core::item_id::ItemId) -> Option<usize> {
    let slot = nodes.try_borrow(indexed)?;
    match &slot.data {
        NodeData::Collection(c) => c.index_of(id),
        NodeData::Dictionary(d) => d.index_of(id),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{CollectionItem, CollectionNode, MemberNode, ObjectNode};
    use apg_core::item_id::ItemId;
    use apg_core::value::PrimitiveValue;

    /// root { name: "hi", items: [id_a, id_b] }
    fn build_fixture() -> (Pool<NodeSlot>, NodeHandle, ItemId, ItemId) {
        let mut nodes = Pool::new();
        let root = nodes.spawn(NodeSlot::new(NodeData::Object(ObjectNode {
            owner: None,
            identity: None,
            children: Vec::new(),
        })));

        let name_member = nodes.spawn(NodeSlot::new(NodeData::Member(MemberNode {
            name: "name".into(),
            declared_type: "String",
            owner: root,
            value: Some(PrimitiveValue::String("hi".into())),
            target: None,
            is_reference: false,
            is_object_reference: false,
            object_reference_id: None,
            can_override: true,
        })));

        let items_member = nodes.spawn(NodeSlot::new(NodeData::Member(MemberNode {
            name: "items".into(),
            declared_type: "Vec",
            owner: root,
            value: None,
            target: None,
            is_reference: true,
            is_object_reference: false,
            object_reference_id: None,
            can_override: true,
        })));
        let collection = nodes.spawn(NodeSlot::new(NodeData::Collection(CollectionNode::new(
            items_member,
            true,
        ))));
        if let NodeData::Member(m) = &mut nodes.borrow_mut(items_member).data {
            m.target = Some(collection);
        }

        let id_a = ItemId::new();
        let id_b = ItemId::new();
        if let NodeData::Collection(c) = &mut nodes.borrow_mut(collection).data {
            c.items.push(CollectionItem {
                id: id_a,
                value: Some(PrimitiveValue::I64(1)),
                target: None,
                is_reference: false,
            });
            c.items.push(CollectionItem {
                id: id_b,
                value: Some(PrimitiveValue::I64(2)),
                target: None,
                is_reference: false,
            });
            c.reindex();
        }

        if let NodeData::Object(o) = &mut nodes.borrow_mut(root).data {
            o.set_child("name", name_member);
            o.set_child("items", items_member);
        }

        (nodes, root, id_a, id_b)
    }

    #[test]
    fn resolves_member_by_name() {
        let (nodes, root, _, _) = build_fixture();
        let path = NodePath::root().push_member("name");
        let resolved = resolve(&nodes, root, &path).expect("resolves");
        assert!(!resolved.resolved_on_index);
        assert!(matches!(
            nodes.borrow(resolved.node).data.as_member().unwrap().value,
            Some(PrimitiveValue::String(_))
        ));
    }

    #[test]
    fn resolves_item_by_item_id() {
        let (nodes, root, id_a, id_b) = build_fixture();
        let path = NodePath::root().push_member("items").push_item_id(id_b);
        let resolved = resolve(&nodes, root, &path).expect("resolves");
        assert!(resolved.resolved_on_index);
        assert_eq!(resolved.index, Some(1));

        let path_a = NodePath::root().push_member("items").push_item_id(id_a);
        let resolved_a = resolve(&nodes, root, &path_a).expect("resolves");
        assert_eq!(resolved_a.index, Some(0));
    }

    #[test]
    fn unreachable_member_is_none() {
        let (nodes, root, _, _) = build_fixture();
        let path = NodePath::root().push_member("does_not_exist");
        assert!(resolve(&nodes, root, &path).is_none());
    }

    #[test]
    fn out_of_range_index_is_none() {
        let (nodes, root, _, _) = build_fixture();
        let path = NodePath::root().push_member("items").push_index(99);
        assert!(resolve(&nodes, root, &path).is_none());
    }

    #[test]
    fn unknown_item_id_is_none() {
        let (nodes, root, _, _) = build_fixture();
        let path = NodePath::root()
            .push_member("items")
            .push_item_id(ItemId::new());
        assert!(resolve(&nodes, root, &path).is_none());
    }
}
