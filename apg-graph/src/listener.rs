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

//! Change event stream.
//!
//! Every event fires in program order with strict `Changing`-before-`Changed`
//! pairing, including for nested mutations triggered from inside another
//! event handler (depth-first). Subscribers are plain boxed closures rather
//! than channel senders: the override store (E) must react synchronously,
//! inside the same call stack as the mutation, so that a mutation and its
//! override stamp are never observably split across a poll boundary.

use apg_core::{item_id::ItemId, pool::Handle, pool::Pool, value::PrimitiveValue};

use crate::node::NodeHandle;
use crate::overrides::OverrideType;

/// The three kinds of item mutation an `IndexedObject` can undergo
/// (add, remove, or update an existing slot).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ItemChangeKind {
    Add,
    Remove,
    Update,
}

/// Low-level events, fired for every mutation reachable from the asset root.
pub enum ChangeEvent {
    /// Fired before a member's value is overwritten.
    Changing { member: NodeHandle, old_value: Option<PrimitiveValue> },
    /// Fired after a member's value is overwritten.
    Changed {
        member: NodeHandle,
        old_value: Option<PrimitiveValue>,
        new_value: Option<PrimitiveValue>,
    },
    /// Fired before an indexed object's item is added, removed or updated.
    ItemChanging {
        node: NodeHandle,
        kind: ItemChangeKind,
        index: usize,
        old_value: Option<PrimitiveValue>,
    },
    /// Fired after an indexed object's item is added, removed or updated.
    ItemChanged {
        node: NodeHandle,
        kind: ItemChangeKind,
        index: usize,
        new_value: Option<PrimitiveValue>,
    },
    /// Derived event: a member's override state moved as a
    /// consequence of a `Changed` event.
    ContentChanged {
        member: NodeHandle,
        prev_override: OverrideType,
        new_override: OverrideType,
    },
    /// Derived event: an item/key's override state moved as a
    /// consequence of an `ItemChanged` event.
    ItemContentChanged {
        node: NodeHandle,
        item_id: ItemId,
        prev_override: OverrideType,
        new_override: OverrideType,
    },
    /// Fired at the asset root once a base-driven reconciliation pass
    /// completes.
    BaseContentChanged,
}

/// Opaque handle returned by [`ChangeBroadcaster::subscribe`]; pass it back
/// to [`ChangeBroadcaster::unsubscribe`] to stop receiving events.
pub type SubscriptionToken = Handle<Box<dyn FnMut(&ChangeEvent)>>;

/// Synchronous pub/sub hub for [`ChangeEvent`]s.
///
/// Used for the one cross-graph edge the model has: the base linker (D)
/// subscribing a derived graph to its base graph's own event stream.
/// Intra-graph override stamping does not go through here — `AssetGraph`'s mutation
/// methods call the override store directly, inline, so stamping can never
/// observe a mutation out of order relative to its own event.
#[derive(Default)]
pub struct ChangeBroadcaster {
    subscribers: Pool<Box<dyn FnMut(&ChangeEvent)>>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Pool::new(),
        }
    }

    #[must_use]
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        self.subscribers.spawn(Box::new(handler))
    }

    /// No-op if `token` was already removed. Matches the base linker's need
    /// for `clear_all_base_links` to be idempotent.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) {
        self.subscribers.try_free(token);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.alive_count()
    }

    pub fn broadcast(&mut self, event: &ChangeEvent) {
        for handler in self.subscribers.iter_mut() {
            handler(event);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn broadcast_reaches_all_subscribers_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = ChangeBroadcaster::new();

        let log_a = log.clone();
        bus.subscribe(move |_| log_a.borrow_mut().push("a"));
        let log_b = log.clone();
        bus.subscribe(move |_| log_b.borrow_mut().push("b"));

        bus.broadcast(&ChangeEvent::BaseContentChanged);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = ChangeBroadcaster::new();
        let log_a = log.clone();
        let token = bus.subscribe(move |_| log_a.borrow_mut().push("a"));

        bus.unsubscribe(token);
        bus.unsubscribe(token); // idempotent, must not panic
        bus.broadcast(&ChangeEvent::BaseContentChanged);
        assert!(log.borrow().is_empty());
    }
}
