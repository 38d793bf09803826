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

//! Base linker (component D).
//!
//! Walks the derived and base graphs in lockstep, matching members by name
//! and items by `ItemId`, and stores the base-side counterpart on every
//! matched derived node's `base_link`. Only structural (owned) edges are
//! walked — a reference member/item is linked itself but its target is not
//! descended into here, since the target belongs to whatever object it
//! structurally lives under and will be reached from there.
//!
//! A derived/base kind mismatch at any node means the two graphs no longer
//! share the shape linking assumes (document corruption, or the base was
//! swapped for one of a different asset type); that is fatal to the whole
//! pass, so it surfaces as `ApgError::KindMismatch` rather than being
//! logged and skipped like the non-fatal recoveries elsewhere in this crate.

use apg_core::error::ApgError;
use apg_core::path::NodePath;
use apg_core::pool::Pool;

use crate::node::{NodeData, NodeHandle, NodeSlot};
use crate::registry::BaseDerivedRegistry;

/// Composite-asset extension point: lets a sub-entity
/// redirect its base to something other than the structurally-corresponding
/// node, invoked "at every object-kind boundary".
pub trait FindTarget {
    fn find_target(&self, _source: NodeHandle, candidate_base: NodeHandle) -> NodeHandle {
        candidate_base
    }
}

/// The default policy: no redirection, used by non-composite assets.
pub struct IdentityFindTarget;

impl FindTarget for IdentityFindTarget {}

/// Recurses from `derived_root`/`base_root`, setting
/// `base_link` on every derived node it can match and registering base
/// object identities into `registry` as it goes. Aborts with
/// `ApgError::KindMismatch` at the first node whose derived/base kinds
/// disagree, leaving everything linked up to that point untouched.
#[must_use]
pub fn link_to_base(
    derived_nodes: &mut Pool<NodeSlot>,
    derived_root: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base_root: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
) -> Result<(), ApgError> {
    link_node(
        derived_nodes,
        derived_root,
        base_nodes,
        base_root,
        registry,
        find_target,
        NodePath::root(),
    )
}

fn link_node(
    derived_nodes: &mut Pool<NodeSlot>,
    derived: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
    path: NodePath,
) -> Result<(), ApgError> {
    let Some(base_slot) = base_nodes.try_borrow(base) else {
        return Ok(());
    };
    let Some(derived_slot) = derived_nodes.try_borrow(derived) else {
        return Ok(());
    };
    if derived_slot.kind_name() != base_slot.kind_name() {
        return Err(ApgError::KindMismatch {
            path,
            expected: base_slot.kind_name(),
            found: derived_slot.kind_name(),
        });
    }

    match &base_slot.data {
        NodeData::Object(_) => link_object(derived_nodes, derived, base_nodes, base, registry, find_target, path),
        NodeData::Member(_) => link_member(derived_nodes, derived, base_nodes, base, registry, find_target, path),
        NodeData::Collection(_) | NodeData::Dictionary(_) => {
            link_indexed(derived_nodes, derived, base_nodes, base, registry, find_target, path)
        }
    }
}

fn link_object(
    derived_nodes: &mut Pool<NodeSlot>,
    derived: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
    path: NodePath,
) -> Result<(), ApgError> {
    let base = find_target.find_target(derived, base);
    derived_nodes.borrow_mut(derived).base_link = Some(base);

    let identity = base_nodes.try_borrow(base).and_then(|s| s.data.as_object()).and_then(|o| o.identity);
    if let Some(identity) = identity {
        registry.register(identity, derived);
    }
    link_object_children(derived_nodes, derived, base_nodes, base, registry, find_target, path)
}

fn link_object_children(
    derived_nodes: &mut Pool<NodeSlot>,
    derived: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
    path: NodePath,
) -> Result<(), ApgError> {
    let Some(children) = derived_nodes
        .try_borrow(derived)
        .and_then(|s| s.data.as_object())
        .map(|o| o.children.clone())
    else {
        return Ok(());
    };
    let Some(base_object) = base_nodes.try_borrow(base).and_then(|s| s.data.as_object()) else {
        return Ok(());
    };
    for (name, derived_child) in children {
        if let Some(base_child) = base_object.child(&name) {
            link_node(
                derived_nodes,
                derived_child,
                base_nodes,
                base_child,
                registry,
                find_target,
                path.clone().push_member(name),
            )?;
        }
    }
    Ok(())
}

fn link_member(
    derived_nodes: &mut Pool<NodeSlot>,
    derived: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
    path: NodePath,
) -> Result<(), ApgError> {
    derived_nodes.borrow_mut(derived).base_link = Some(base);

    let derived_target = derived_nodes
        .try_borrow(derived)
        .and_then(|s| s.data.as_member())
        .and_then(|m| m.target);
    let base_target = base_nodes
        .try_borrow(base)
        .and_then(|s| s.data.as_member())
        .and_then(|m| m.target);

    if let (Some(dt), Some(bt)) = (derived_target, base_target) {
        link_node(derived_nodes, dt, base_nodes, bt, registry, find_target, path)?;
    }
    Ok(())
}

fn link_indexed(
    derived_nodes: &mut Pool<NodeSlot>,
    derived: NodeHandle,
    base_nodes: &Pool<NodeSlot>,
    base: NodeHandle,
    registry: &mut BaseDerivedRegistry,
    find_target: &dyn FindTarget,
    path: NodePath,
) -> Result<(), ApgError> {
    derived_nodes.borrow_mut(derived).base_link = Some(base);

    // Structural (non-reference) items are owned sub-objects; walk into the
    // ones whose ItemId also exists on the base side. Reference items point
    // elsewhere and are linked wherever their target is structurally owned.
    let pairs: Vec<(NodeHandle, NodeHandle, apg_core::item_id::ItemId)> = {
        let Some(derived_data) = derived_nodes.try_borrow(derived).map(|s| &s.data) else {
            return Ok(());
        };
        let Some(base_data) = base_nodes.try_borrow(base).map(|s| &s.data) else {
            return Ok(());
        };
        match (derived_data, base_data) {
            (NodeData::Collection(dc), NodeData::Collection(bc)) => dc
                .items
                .iter()
                .filter(|item| !item.is_reference && item.target.is_some() && !item.id.is_empty())
                .filter_map(|item| {
                    let base_index = bc.index_of(item.id)?;
                    let base_item = bc.items.get(base_index)?;
                    Some((item.target?, base_item.target?, item.id))
                })
                .collect(),
            (NodeData::Dictionary(dd), NodeData::Dictionary(bd)) => dd
                .entries
                .iter()
                .filter(|e| !e.is_reference && e.target.is_some() && !e.id.is_empty())
                .filter_map(|entry| {
                    let base_index = bd.index_of(entry.id)?;
                    let base_entry = bd.entries.get(base_index)?;
                    Some((entry.target?, base_entry.target?, entry.id))
                })
                .collect(),
            _ => Vec::new(),
        }
    };

    for (derived_item, base_item, id) in pairs {
        link_node(
            derived_nodes,
            derived_item,
            base_nodes,
            base_item,
            registry,
            find_target,
            path.clone().push_item_id(id),
        )?;
    }
    Ok(())
}

/// Unlinks every node reachable from `root`. Idempotent —
/// safe to call on a graph that was never linked, or twice in a row.
pub fn clear_all_base_links(nodes: &mut Pool<NodeSlot>, root: NodeHandle) {
    let mut stack = vec![root];
    let mut visited = std::collections::HashSet::new();
    while let Some(handle) = stack.pop() {
        if !visited.insert(handle) {
            continue;
        }
        let Some(slot) = nodes.try_borrow_mut(handle) else {
            continue;
        };
        slot.base_link = None;
        match &slot.data {
            NodeData::Object(o) => stack.extend(o.children.iter().map(|(_, h)| *h)),
            NodeData::Member(m) => {
                if let Some(t) = m.target {
                    stack.push(t);
                }
            }
            NodeData::Collection(c) => stack.extend(
                c.items
                    .iter()
                    .filter(|i| !i.is_reference)
                    .filter_map(|i| i.target),
            ),
            NodeData::Dictionary(d) => stack.extend(
                d.entries
                    .iter()
                    .filter(|e| !e.is_reference)
                    .filter_map(|e| e.target),
            ),
        }
    }
}
