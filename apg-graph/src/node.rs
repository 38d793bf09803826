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

//! Tagged-variant node kinds over an asset value tree.
//!
//! Every node lives in one arena (`Pool<NodeSlot>`), addressed by
//! [`NodeHandle`]. Structural parent links own their children; a
//! reference-valued member or item only ever holds a non-owning handle, so
//! cyclic graphs of identifiable objects are representable without any
//! unsafe aliasing.

use apg_core::{
    item_id::ItemId,
    pool::Handle,
    value::{DictKey, PrimitiveValue},
};
use fxhash::FxHashMap;

pub type NodeHandle = Handle<NodeSlot>;

/// A node plus the one piece of state every kind shares: its link to the
/// corresponding node in the base graph, wired by the base linker (D).
pub struct NodeSlot {
    pub base_link: Option<NodeHandle>,
    pub data: NodeData,
}

impl NodeSlot {
    pub fn new(data: NodeData) -> Self {
        Self {
            base_link: None,
            data,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.data.kind_name()
    }
}

pub enum NodeData {
    Member(MemberNode),
    Object(ObjectNode),
    Collection(CollectionNode),
    Dictionary(DictionaryNode),
}

impl NodeData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeData::Member(_) => "Member",
            NodeData::Object(_) => "Object",
            NodeData::Collection(_) => "Collection",
            NodeData::Dictionary(_) => "Dictionary",
        }
    }

    pub fn as_member(&self) -> Option<&MemberNode> {
        match self {
            NodeData::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_member_mut(&mut self) -> Option<&mut MemberNode> {
        match self {
            NodeData::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            NodeData::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match self {
            NodeData::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionNode> {
        match self {
            NodeData::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut CollectionNode> {
        match self {
            NodeData::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&DictionaryNode> {
        match self {
            NodeData::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dictionary_mut(&mut self) -> Option<&mut DictionaryNode> {
        match self {
            NodeData::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// `true` for `Collection`/`Dictionary` — the kinds that implement
    /// [`IndexedObject`].
    pub fn is_indexed(&self) -> bool {
        matches!(self, NodeData::Collection(_) | NodeData::Dictionary(_))
    }
}

/// A named field of an owning object.
pub struct MemberNode {
    pub name: String,
    pub declared_type: &'static str,
    pub owner: NodeHandle,
    /// Set when the member holds a primitive/content-reference value.
    pub value: Option<PrimitiveValue>,
    /// Set when the member's value is complex: either an owned structural
    /// child (`is_reference == false`) or a non-owning pointer elsewhere in
    /// the graph (`is_reference == true`).
    pub target: Option<NodeHandle>,
    pub is_reference: bool,
    /// `true` if this is a pointer-by-id to another identifiable object
    /// inside the same asset, as opposed to structural containment.
    pub is_object_reference: bool,
    /// The id being pointed to, when `is_object_reference` is set. Kept
    /// alongside `target` because `target` is only resolvable once the
    /// pointee exists (see `crate::graph::AssetGraph::build`).
    pub object_reference_id: Option<ItemId>,
    pub can_override: bool,
}

impl MemberNode {
    /// A reference member must resolve to an `ObjectNode`.
    pub fn is_complex(&self) -> bool {
        self.target.is_some()
    }
}

/// A structural value with named children (sub-members). Doubles as the
/// addressable unit for object references when `identity` is set.
pub struct ObjectNode {
    /// The member or indexed slot that owns this object; `None` only for
    /// the graph's root object.
    pub owner: Option<NodeHandle>,
    pub identity: Option<ItemId>,
    /// Insertion-ordered so iteration/serialization is deterministic.
    pub children: Vec<(String, NodeHandle)>,
}

impl ObjectNode {
    pub fn child(&self, name: &str) -> Option<NodeHandle> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| *h)
    }

    pub fn set_child(&mut self, name: impl Into<String>, handle: NodeHandle) {
        let name = name.into();
        if let Some(slot) = self.children.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = handle;
        } else {
            self.children.push((name, handle));
        }
    }
}

/// Common contract of `CollectionNode`/`DictionaryNode`: ordered items that
/// may additionally be addressable by a stable [`ItemId`].
pub trait IndexedObject {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn is_identifiable(&self) -> bool;
    /// `ItemId::EMPTY` if not identifiable or `index` is out of bounds.
    fn item_id_at(&self, index: usize) -> ItemId;
    fn index_of(&self, id: ItemId) -> Option<usize>;
}

/// What a restored/inserted collection or dictionary item carries, mirroring
/// the value/target/is_reference split `CollectionItem`/`DictionaryEntry`
/// already store. Lets a caller (the reconciler, in particular) construct a
/// structural or reference item, not just a primitive one.
pub enum ItemContent {
    Value(PrimitiveValue),
    Target { node: NodeHandle, is_reference: bool },
}

impl ItemContent {
    /// The `Option<PrimitiveValue>` to broadcast/store alongside this
    /// content — `None` for anything structural.
    pub fn primitive(&self) -> Option<PrimitiveValue> {
        match self {
            ItemContent::Value(v) => Some(v.clone()),
            ItemContent::Target { .. } => None,
        }
    }

    pub fn into_parts(self) -> (Option<PrimitiveValue>, Option<NodeHandle>, bool) {
        match self {
            ItemContent::Value(v) => (Some(v), None, false),
            ItemContent::Target { node, is_reference } => (None, Some(node), is_reference),
        }
    }
}

/// One slot of a [`CollectionNode`].
#[derive(Clone)]
pub struct CollectionItem {
    pub id: ItemId,
    pub value: Option<PrimitiveValue>,
    pub target: Option<NodeHandle>,
    pub is_reference: bool,
}

/// Ordered sequence of items, each addressable by integer index and,
/// if identifiable, by stable [`ItemId`].
pub struct CollectionNode {
    pub owner: NodeHandle,
    pub identifiable: bool,
    pub items: Vec<CollectionItem>,
    pub id_map: FxHashMap<ItemId, usize>,
}

impl CollectionNode {
    pub fn new(owner: NodeHandle, identifiable: bool) -> Self {
        Self {
            owner,
            identifiable,
            items: Vec::new(),
            id_map: FxHashMap::default(),
        }
    }

    /// Rebuilds `id_map` from the current item order. Called after any
    /// mutation that shifts indices (insert/remove/move).
    pub fn reindex(&mut self) {
        self.id_map.clear();
        if !self.identifiable {
            return;
        }
        for (i, item) in self.items.iter().enumerate() {
            if !item.id.is_empty() {
                self.id_map.insert(item.id, i);
            }
        }
    }
}

impl IndexedObject for CollectionNode {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_identifiable(&self) -> bool {
        self.identifiable
    }

    fn item_id_at(&self, index: usize) -> ItemId {
        if !self.identifiable {
            return ItemId::EMPTY;
        }
        self.items.get(index).map_or(ItemId::EMPTY, |i| i.id)
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        if !self.identifiable {
            return None;
        }
        self.id_map.get(&id).copied()
    }
}

/// One entry of a [`DictionaryNode`].
#[derive(Clone)]
pub struct DictionaryEntry {
    pub id: ItemId,
    pub key: DictKey,
    pub value: Option<PrimitiveValue>,
    pub target: Option<NodeHandle>,
    pub is_reference: bool,
}

/// Unordered key→value mapping; if identifiable, each entry additionally has
/// a stable [`ItemId`] independent of its key. Entries are kept in insertion
/// order for deterministic iteration even though lookup is by key or id.
pub struct DictionaryNode {
    pub owner: NodeHandle,
    pub identifiable: bool,
    pub entries: Vec<DictionaryEntry>,
    pub id_map: FxHashMap<ItemId, usize>,
}

impl DictionaryNode {
    pub fn new(owner: NodeHandle, identifiable: bool) -> Self {
        Self {
            owner,
            identifiable,
            entries: Vec::new(),
            id_map: FxHashMap::default(),
        }
    }

    pub fn reindex(&mut self) {
        self.id_map.clear();
        if !self.identifiable {
            return;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.id.is_empty() {
                self.id_map.insert(entry.id, i);
            }
        }
    }

    pub fn index_of_key(&self, key: &DictKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }
}

impl IndexedObject for DictionaryNode {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_identifiable(&self) -> bool {
        self.identifiable
    }

    fn item_id_at(&self, index: usize) -> ItemId {
        if !self.identifiable {
            return ItemId::EMPTY;
        }
        self.entries.get(index).map_or(ItemId::EMPTY, |e| e.id)
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        if !self.identifiable {
            return None;
        }
        self.id_map.get(&id).copied()
    }
}
