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

//! Shared fixture builders for the integration tests in this directory.
//! Everything here goes through `apg_graph::build::build_from_tree`, the same
//! entry point a real loader would use, rather than poking at node internals.

#![allow(dead_code)]

use apg_core::item_id::ItemId;
use apg_core::value::{DictKey, PrimitiveValue};
use apg_graph::build::{
    build_from_tree, TreeField, TreeFieldContent, TreeItem, TreeItemContent, TreeObject, TreeValue,
};
use apg_graph::container::{Container, GraphHandle};
use apg_graph::graph::AssetGraph;
use apg_graph::node::NodeHandle;
use fxhash::FxHashMap;

pub fn value_field(name: &str, value: PrimitiveValue) -> TreeField {
    TreeField {
        name: name.into(),
        declared_type: "Value",
        can_override: true,
        content: TreeFieldContent::Value(value),
    }
}

pub fn sealed_field(name: &str, value: PrimitiveValue) -> TreeField {
    TreeField {
        name: name.into(),
        declared_type: "Value",
        can_override: false,
        content: TreeFieldContent::Value(value),
    }
}

pub fn owned_field(name: &str, value: TreeValue) -> TreeField {
    TreeField {
        name: name.into(),
        declared_type: "Owned",
        can_override: true,
        content: TreeFieldContent::Owned(value),
    }
}

pub fn object_reference_field(name: &str, target: ItemId) -> TreeField {
    TreeField {
        name: name.into(),
        declared_type: "Ref",
        can_override: true,
        content: TreeFieldContent::ObjectReference(target),
    }
}

pub fn object(identity: Option<ItemId>, fields: Vec<TreeField>) -> TreeValue {
    TreeValue::Object(TreeObject { identity, fields })
}

pub fn item(id: ItemId, value: i64) -> TreeItem {
    TreeItem {
        id,
        content: TreeItemContent::Value(PrimitiveValue::I64(value)),
    }
}

pub fn collection(items: Vec<TreeItem>) -> TreeValue {
    TreeValue::Collection(items)
}

pub fn dict_entry(id: ItemId, key: DictKey, value: i64) -> (DictKey, TreeItem) {
    (
        key,
        TreeItem {
            id,
            content: TreeItemContent::Value(PrimitiveValue::I64(value)),
        },
    )
}

pub fn dictionary(entries: Vec<(DictKey, TreeItem)>) -> TreeValue {
    TreeValue::Dictionary(entries)
}

pub fn dictionary_node(graph: &AssetGraph, member_name: &str) -> NodeHandle {
    let m = member(graph, member_name);
    graph
        .nodes
        .borrow(m)
        .data
        .as_member()
        .and_then(|m| m.target)
        .expect("member owns a dictionary")
}

/// Builds a graph from a tree and hands back the identity map alongside it,
/// the way a loader would before passing both to `metadata::apply_metadata`.
pub fn graph_from_tree(tree: TreeValue) -> (AssetGraph, FxHashMap<ItemId, NodeHandle>) {
    let (nodes, root, identities) = build_from_tree(tree);
    let mut graph = AssetGraph::new();
    graph.nodes = nodes;
    graph.root = root;
    (graph, identities)
}

pub fn member(graph: &AssetGraph, name: &str) -> NodeHandle {
    graph.child(graph.root, name).expect("member exists")
}

pub fn collection_node(graph: &AssetGraph, member_name: &str) -> NodeHandle {
    let m = member(graph, member_name);
    graph
        .nodes
        .borrow(m)
        .data
        .as_member()
        .and_then(|m| m.target)
        .expect("member owns a collection")
}

/// Builds two independent graphs from `base_tree`/`derived_tree` and links
/// the second to the first through a fresh `Container`.
pub fn linked_container(
    base_tree: TreeValue,
    derived_tree: TreeValue,
) -> (Container, GraphHandle, GraphHandle) {
    let (base_graph, _) = graph_from_tree(base_tree);
    let (derived_graph, _) = graph_from_tree(derived_tree);

    let mut container = Container::new();
    let base = container.create_graph(base_graph, None);
    let derived = container.create_graph(derived_graph, Some(base));
    (container, base, derived)
}

pub fn i64_value(graph: &AssetGraph, node: NodeHandle) -> i64 {
    match graph.retrieve(node, None) {
        Some(PrimitiveValue::I64(v)) => v,
        other => panic!("expected I64 member value, got {other:?}"),
    }
}
