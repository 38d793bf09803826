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

//! The save/load round-trip law: `load(save(G))` reproduces `G`'s override
//! and object-reference state on a freshly built graph with the same shape.

mod common;

use apg_core::item_id::ItemId;
use apg_core::value::PrimitiveValue;
use apg_graph::metadata::{apply_metadata, prepare_for_save};
use apg_graph::overrides::OverrideType;

use common::{graph_from_tree, member, object, object_reference_field, owned_field, value_field};

#[test]
fn round_trip_reproduces_overrides_and_object_references_on_a_fresh_graph() {
    let weapon_id = ItemId::new();
    let tree = || {
        object(
            None,
            vec![
                value_field("color", PrimitiveValue::I64(1)),
                owned_field(
                    "weapon",
                    object(Some(weapon_id), vec![value_field("damage", PrimitiveValue::I64(10))]),
                ),
                object_reference_field("equipped", weapon_id),
            ],
        )
    };

    let (mut original, _) = graph_from_tree(tree());
    let color = member(&original, "color");
    original.update_member(color, PrimitiveValue::I64(42));

    let (overrides, refs) = prepare_for_save(&original);
    assert_eq!(overrides.len(), 1);
    assert_eq!(refs.len(), 1);

    let (mut fresh, fresh_identities) = graph_from_tree(tree());
    apply_metadata(&mut fresh, &overrides, &refs, &fresh_identities);

    let fresh_color = member(&fresh, "color");
    assert_eq!(fresh.overrides.content_override(fresh_color), OverrideType::New);

    let fresh_weapon = fresh
        .nodes
        .borrow(member(&fresh, "weapon"))
        .data
        .as_member()
        .unwrap()
        .target
        .unwrap();
    let fresh_equipped = fresh.nodes.borrow(member(&fresh, "equipped")).data.as_member().unwrap();
    assert!(fresh_equipped.is_object_reference);
    assert_eq!(fresh_equipped.target, Some(fresh_weapon));
}
