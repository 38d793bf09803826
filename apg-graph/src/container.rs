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

//! Owns a collection of asset graphs and wires up base→derived propagation
//! (component I). `AssetGraph` itself only ever sees one
//! arena at a time (its own); every operation that needs a derived graph and
//! its base simultaneously — linking, reconciling, refreshing — has to be
//! driven from somewhere that can borrow both at once. `Container` keeps
//! every graph as a slot of one `Pool`, so two slots can be borrowed
//! disjointly via `Pool::try_borrow_two_mut` instead of needing a second
//! arena reference stashed on `AssetGraph` itself.

use apg_core::error::ApgError;
use apg_core::log::Log;
use apg_core::pool::{Handle, Pool};

use crate::graph::AssetGraph;
use crate::node::NodeHandle;
use crate::reconcile::{self, AlwaysUpdate};

pub type GraphHandle = Handle<AssetGraph>;

struct Entry {
    graph: AssetGraph,
    base: Option<GraphHandle>,
    /// Whether this derived graph auto-reconciles when its
    /// base changes. `false` freezes it at its current values even while
    /// still linked — useful for pinning a prefab instance mid-edit so a
    /// concurrent base change doesn't ripple into it until explicitly
    /// resumed.
    propagate_changes_from_base: bool,
}

/// Component I. A flat table of asset graphs plus their base-derived edges.
#[derive(Default)]
pub struct Container {
    graphs: Pool<Entry>,
}

impl Container {
    pub fn new() -> Self {
        Self { graphs: Pool::new() }
    }

    /// Registers a freshly built, unlinked
    /// [`AssetGraph`] and, if `base` is given, links it immediately.
    pub fn create_graph(&mut self, graph: AssetGraph, base: Option<GraphHandle>) -> GraphHandle {
        let handle = self.graphs.spawn(Entry {
            graph,
            base: None,
            propagate_changes_from_base: true,
        });
        if base.is_some() {
            Log::verify(self.set_base(handle, base));
        }
        handle
    }

    pub fn lookup(&self, handle: GraphHandle) -> Option<&AssetGraph> {
        self.graphs.try_borrow(handle).map(|e| &e.graph)
    }

    pub fn lookup_mut(&mut self, handle: GraphHandle) -> Option<&mut AssetGraph> {
        self.graphs.try_borrow_mut(handle).map(|e| &mut e.graph)
    }

    pub fn base_of(&self, handle: GraphHandle) -> Option<GraphHandle> {
        self.graphs.try_borrow(handle)?.base
    }

    pub fn set_propagate_changes_from_base(&mut self, handle: GraphHandle, value: bool) {
        if let Some(e) = self.graphs.try_borrow_mut(handle) {
            e.propagate_changes_from_base = value;
        }
    }

    /// Frees the graph's slot. A derived graph still
    /// pointing at it keeps the values it already has but can no longer
    /// reconcile or refresh — `set_base(derived, None)` is how a caller
    /// acknowledges that explicitly.
    pub fn remove(&mut self, handle: GraphHandle) {
        self.graphs.free(handle);
    }

    /// Detaches from the old
    /// base (if any), rebinds to `new_base`, re-links, and re-subscribes to
    /// the new base's broadcaster. Fails with `ApgError::KindMismatch` if
    /// the new base's shape disagrees with this graph's — the derived graph
    /// is left detached (no base) rather than partially linked.
    #[must_use]
    pub fn set_base(&mut self, handle: GraphHandle, new_base: Option<GraphHandle>) -> Result<(), ApgError> {
        self.detach(handle);

        match new_base {
            Some(base) => {
                let (derived_entry, base_entry) = self.graphs.try_borrow_two_mut(handle, base);
                let (Some(derived_entry), Some(base_entry)) = (derived_entry, base_entry) else {
                    return Ok(());
                };
                derived_entry.base = Some(base);
                derived_entry
                    .graph
                    .refresh_base(Some(&base_entry.graph.nodes), Some(base_entry.graph.root))?;
                let target = handle;
                let token = base_entry.graph.changes.subscribe(move |_event| {
                    let _ = target;
                });
                derived_entry.graph.set_subscription(token);
                Ok(())
            }
            None => {
                if let Some(entry) = self.graphs.try_borrow_mut(handle) {
                    entry.base = None;
                    entry.graph.refresh_base(None, None)?;
                }
                Ok(())
            }
        }
    }

    fn detach(&mut self, handle: GraphHandle) {
        let Some(base) = self.graphs.try_borrow(handle).and_then(|e| e.base) else {
            return;
        };
        let (derived_entry, base_entry) = self.graphs.try_borrow_two_mut(handle, base);
        if let (Some(derived_entry), Some(base_entry)) = (derived_entry, base_entry) {
            derived_entry.graph.detach_from_base(&mut base_entry.graph.changes);
        }
        if let Some(entry) = self.graphs.try_borrow_mut(handle) {
            entry.base = None;
        }
    }

    /// Reconciles every graph whose
    /// `propagate_changes_from_base` flag is set against its current base.
    /// Call this once per tick (or on an explicit "apply base changes"
    /// action) rather than from inside the base's own subscription handler —
    /// batching avoids re-running the same derived graph's reconciliation
    /// once per base field written in a single edit.
    pub fn propagate_changes_from_base(&mut self) {
        let pending: Vec<GraphHandle> = self
            .graphs
            .pair_iter()
            .filter(|(_, e)| e.propagate_changes_from_base && e.base.is_some())
            .map(|(h, _)| h)
            .collect();
        for handle in pending {
            self.reconcile_one(handle);
        }
    }

    fn reconcile_one(&mut self, handle: GraphHandle) {
        let Some(base) = self.graphs.try_borrow(handle).and_then(|e| e.base) else {
            return;
        };
        let (derived_entry, base_entry) = self.graphs.try_borrow_two_mut(handle, base);
        if let (Some(derived_entry), Some(base_entry)) = (derived_entry, base_entry) {
            reconcile::reconcile_with_base(&mut derived_entry.graph, Some(&base_entry.graph.nodes), None, &AlwaysUpdate);
        }
    }

    /// The container-level wrapper,
    /// since `AssetGraph::reset_override` needs the base arena it can't hold
    /// itself.
    pub fn reset_override(&mut self, handle: GraphHandle, node: NodeHandle) {
        match self.graphs.try_borrow(handle).and_then(|e| e.base) {
            Some(base) => {
                let (derived_entry, base_entry) = self.graphs.try_borrow_two_mut(handle, base);
                if let (Some(derived_entry), Some(base_entry)) = (derived_entry, base_entry) {
                    derived_entry.graph.reset_override(Some(&base_entry.graph.nodes), node);
                }
            }
            None => {
                if let Some(entry) = self.graphs.try_borrow_mut(handle) {
                    entry.graph.reset_override(None, node);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{MemberNode, NodeData, NodeSlot, ObjectNode};
    use apg_core::value::PrimitiveValue;

    fn graph_with_member(name: &str, value: i64) -> (AssetGraph, NodeHandle) {
        let mut graph = AssetGraph::new();
        let member = graph.nodes.spawn(NodeSlot::new(NodeData::Member(MemberNode {
            name: name.into(),
            declared_type: "I64",
            owner: graph.root,
            value: Some(PrimitiveValue::I64(value)),
            target: None,
            is_reference: false,
            is_object_reference: false,
            object_reference_id: None,
            can_override: true,
        })));
        if let NodeData::Object(o) = &mut graph.nodes.borrow_mut(graph.root).data {
            o.set_child(name, member);
        }
        (graph, member)
    }

    #[test]
    fn derived_graph_tracks_base_until_overridden() {
        let mut container = Container::new();
        let (base_graph, base_member) = graph_with_member("hp", 100);
        let base = container.create_graph(base_graph, None);

        let (derived_graph, derived_member) = graph_with_member("hp", 100);
        let derived = container.create_graph(derived_graph, Some(base));

        container.lookup_mut(base).unwrap().update_member(base_member, PrimitiveValue::I64(150));
        container.propagate_changes_from_base();

        assert_eq!(
            container.lookup(derived).unwrap().retrieve(derived_member, None),
            Some(PrimitiveValue::I64(150))
        );
    }

    #[test]
    fn overridden_derived_member_does_not_track_base() {
        let mut container = Container::new();
        let (base_graph, base_member) = graph_with_member("hp", 100);
        let base = container.create_graph(base_graph, None);

        let (derived_graph, derived_member) = graph_with_member("hp", 100);
        let derived = container.create_graph(derived_graph, Some(base));

        container.lookup_mut(derived).unwrap().update_member(derived_member, PrimitiveValue::I64(999));
        container.lookup_mut(base).unwrap().update_member(base_member, PrimitiveValue::I64(150));
        container.propagate_changes_from_base();

        assert_eq!(
            container.lookup(derived).unwrap().retrieve(derived_member, None),
            Some(PrimitiveValue::I64(999))
        );
    }

    #[test]
    fn removing_base_leaves_derived_values_intact_but_unlinked() {
        let mut container = Container::new();
        let (base_graph, _) = graph_with_member("hp", 100);
        let base = container.create_graph(base_graph, None);

        let (derived_graph, derived_member) = graph_with_member("hp", 100);
        let derived = container.create_graph(derived_graph, Some(base));

        container.remove(base);
        container.set_base(derived, None).unwrap();
        assert_eq!(container.base_of(derived), None);
        assert_eq!(
            container.lookup(derived).unwrap().retrieve(derived_member, None),
            Some(PrimitiveValue::I64(100))
        );
    }
}
