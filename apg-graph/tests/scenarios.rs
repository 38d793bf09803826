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

//! End-to-end prefab scenarios: editing a base and watching the change land
//! (or not land) on a linked derived graph.

mod common;

use apg_core::item_id::ItemId;
use apg_core::value::{DictKey, PrimitiveValue};
use apg_graph::node::ItemContent;
use apg_graph::overrides::OverrideType;

use common::{
    collection, collection_node, dict_entry, dictionary, dictionary_node, i64_value, item, linked_container, member,
    object, object_reference_field, owned_field, value_field,
};

/// S1: a derived member nobody has touched tracks its base.
#[test]
fn unoverridden_member_follows_base_edit() {
    let base_tree = object(None, vec![value_field("hp", PrimitiveValue::I64(100))]);
    let derived_tree = object(None, vec![value_field("hp", PrimitiveValue::I64(100))]);
    let (mut container, base, derived) = linked_container(base_tree, derived_tree);

    {
        let graph = container.lookup_mut(base).unwrap();
        let hp = member(graph, "hp");
        graph.update_member(hp, PrimitiveValue::I64(250));
    }
    container.propagate_changes_from_base();

    let graph = container.lookup(derived).unwrap();
    let hp = member(graph, "hp");
    assert_eq!(i64_value(graph, hp), 250);
    assert_eq!(graph.overrides.content_override(hp), OverrideType::Base);
}

/// S2: once the derived side writes its own value, a later base edit no
/// longer propagates to it.
#[test]
fn overridden_member_ignores_later_base_edit() {
    let base_tree = object(None, vec![value_field("hp", PrimitiveValue::I64(100))]);
    let derived_tree = object(None, vec![value_field("hp", PrimitiveValue::I64(100))]);
    let (mut container, base, derived) = linked_container(base_tree, derived_tree);

    {
        let graph = container.lookup_mut(derived).unwrap();
        let hp = member(graph, "hp");
        graph.update_member(hp, PrimitiveValue::I64(5));
    }

    {
        let graph = container.lookup_mut(base).unwrap();
        let hp = member(graph, "hp");
        graph.update_member(hp, PrimitiveValue::I64(250));
    }
    container.propagate_changes_from_base();

    let graph = container.lookup(derived).unwrap();
    let hp = member(graph, "hp");
    assert_eq!(i64_value(graph, hp), 5);
    assert_eq!(graph.overrides.content_override(hp), OverrideType::New);
}

/// S3: removing an item from the base propagates as a removal on an
/// unoverridden derived collection.
#[test]
fn base_item_removal_propagates_to_unoverridden_derived_collection() {
    let a = ItemId::new();
    let b = ItemId::new();
    let base_tree = object(None, vec![owned_field("buffs", collection(vec![item(a, 1), item(b, 2)]))]);
    let derived_tree = object(None, vec![owned_field("buffs", collection(vec![item(a, 1), item(b, 2)]))]);
    let (mut container, base, derived) = linked_container(base_tree, derived_tree);

    {
        let graph = container.lookup_mut(base).unwrap();
        let buffs = collection_node(graph, "buffs");
        graph.remove_collection_item(buffs, 0);
    }
    container.propagate_changes_from_base();

    let graph = container.lookup(derived).unwrap();
    let buffs = collection_node(graph, "buffs");
    let c = graph.nodes.borrow(buffs).data.as_collection().unwrap();
    let ids: Vec<ItemId> = c.items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![b]);
}

/// S4: a locally-removed item stays deleted even while the base still has
/// it, and a separate base-only addition is still picked up in the same
/// reconciliation pass.
#[test]
fn local_removal_persists_while_unrelated_base_addition_is_picked_up() {
    let a = ItemId::new();
    let b = ItemId::new();
    let base_tree = object(None, vec![owned_field("buffs", collection(vec![item(a, 1)]))]);
    let derived_tree = object(None, vec![owned_field("buffs", collection(vec![item(a, 1)]))]);
    let (mut container, base, derived) = linked_container(base_tree, derived_tree);

    {
        let graph = container.lookup_mut(derived).unwrap();
        let buffs = collection_node(graph, "buffs");
        graph.remove_collection_item(buffs, 0);
    }
    {
        let graph = container.lookup_mut(base).unwrap();
        let buffs = collection_node(graph, "buffs");
        graph.restore_collection_item(buffs, 1, ItemContent::Value(PrimitiveValue::I64(2)), b);
    }
    container.propagate_changes_from_base();

    let graph = container.lookup(derived).unwrap();
    let buffs = collection_node(graph, "buffs");
    assert!(graph.overrides.is_deleted(buffs, a));
    let c = graph.nodes.borrow(buffs).data.as_collection().unwrap();
    let ids: Vec<ItemId> = c.items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![b]);
}

/// S5: renaming a dictionary entry's key on the base propagates to an
/// unoverridden derived entry, and the key override itself stays `Base`.
#[test]
fn base_dictionary_key_rename_propagates_without_marking_an_override() {
    let a = ItemId::new();
    let base_tree = object(
        None,
        vec![owned_field(
            "tags",
            dictionary(vec![dict_entry(a, DictKey::String("old".into()), 1)]),
        )],
    );
    let derived_tree = object(
        None,
        vec![owned_field(
            "tags",
            dictionary(vec![dict_entry(a, DictKey::String("old".into()), 1)]),
        )],
    );
    let (mut container, base, derived) = linked_container(base_tree, derived_tree);

    {
        let graph = container.lookup_mut(base).unwrap();
        let tags = dictionary_node(graph, "tags");
        graph.move_dictionary_entry_key(tags, 0, DictKey::String("new".into()));
    }
    container.propagate_changes_from_base();

    let graph = container.lookup(derived).unwrap();
    let tags = dictionary_node(graph, "tags");
    let d = graph.nodes.borrow(tags).data.as_dictionary().unwrap();
    assert_eq!(d.entries[0].key, DictKey::String("new".into()));
    assert!(!graph.overrides.is_key_overridden(tags, a));
}

/// S6: a base object-reference member is reconciled against the *derived*
/// counterpart of whatever it points to, never the base instance directly.
#[test]
fn object_reference_reconciles_to_the_derived_counterpart() {
    let weapon_id = ItemId::new();

    let base_tree = object(
        None,
        vec![
            owned_field("weapon", object(Some(weapon_id), vec![value_field("damage", PrimitiveValue::I64(10))])),
            object_reference_field("equipped", weapon_id),
        ],
    );
    // The derived weapon has no identity of its own — the registry keys off
    // the *base* object's identity, not the derived target's.
    let derived_tree = object(
        None,
        vec![
            owned_field("weapon", object(None, vec![value_field("damage", PrimitiveValue::I64(10))])),
            object_reference_field("equipped", weapon_id),
        ],
    );

    let (mut container, base, derived) = linked_container(base_tree, derived_tree);
    container.propagate_changes_from_base();
    let _ = base;

    let graph = container.lookup(derived).unwrap();
    let derived_weapon = graph
        .nodes
        .borrow(member(graph, "weapon"))
        .data
        .as_member()
        .unwrap()
        .target
        .unwrap();
    let equipped = graph.nodes.borrow(member(graph, "equipped")).data.as_member().unwrap();
    assert!(equipped.is_object_reference);
    assert_eq!(equipped.target, Some(derived_weapon));
}
