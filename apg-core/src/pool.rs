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

//! A generational arena - a contiguous growable array type which allows
//! removing from the middle without shifting and therefore without
//! invalidating other indices.
//!
//! This backs the node graph's arena (`apg_graph::node::NodeSlot`): nodes
//! never move once spawned, and stale handles left over from a removed
//! structural subtree are detected cheaply via the generation check instead
//! of being tracked down by hand.

use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

const INVALID_GENERATION: u32 = 0;

/// Non-owning reference to content in a [`Pool`]. Valid only if the
/// generation stored in the handle matches the generation of the record it
/// points to.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    type_marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub const NONE: Handle<T> = Handle {
        index: 0,
        generation: INVALID_GENERATION,
        type_marker: PhantomData,
    };

    #[inline(always)]
    pub fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            type_marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self.generation == INVALID_GENERATION
    }

    #[inline(always)]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline(always)]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Idx: {}; Gen: {}]", self.index, self.generation)
    }
}

impl<T> Display for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

struct PoolRecord<T> {
    generation: u32,
    payload: Option<T>,
}

/// Pool allows creating as many objects as needed in a contiguous memory
/// block. Freed slots are recycled; the generation counter stops a stale
/// handle from resolving to whatever was later spawned in the same slot.
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(index) = self.free_stack.pop() {
            let record = &mut self.records[index as usize];
            record.generation = record.generation.wrapping_add(1).max(1);
            record.payload = Some(payload);
            Handle::new(index, record.generation)
        } else {
            let index = self.records.len() as u32;
            self.records.push(PoolRecord {
                generation: 1,
                payload: Some(payload),
            });
            Handle::new(index, 1)
        }
    }

    /// Removes the object the handle points to, returning an owned value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid.
    pub fn free(&mut self, handle: Handle<T>) -> T {
        self.try_free(handle)
            .expect("attempt to free an invalid handle")
    }

    pub fn try_free(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        let payload = record.payload.take()?;
        self.free_stack.push(handle.index);
        Some(payload)
    }

    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        self.records
            .get(handle.index as usize)
            .is_some_and(|r| r.generation == handle.generation && r.payload.is_some())
    }

    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        let record = self.records.get(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        record.payload.as_ref()
    }

    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        record.payload.as_mut()
    }

    pub fn borrow(&self, handle: Handle<T>) -> &T {
        self.try_borrow(handle)
            .expect("attempt to borrow an invalid handle")
    }

    pub fn borrow_mut(&mut self, handle: Handle<T>) -> &mut T {
        self.try_borrow_mut(handle)
            .expect("attempt to borrow an invalid handle")
    }

    pub fn alive_count(&self) -> usize {
        self.records.iter().filter(|r| r.payload.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|r| r.payload.as_ref())
    }

    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|p| (Handle::new(i as u32, r.generation), p))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter_map(|r| r.payload.as_mut())
    }

    pub fn pair_iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.records.iter_mut().enumerate().filter_map(|(i, r)| {
            let generation = r.generation;
            r.payload
                .as_mut()
                .map(|p| (Handle::new(i as u32, generation), p))
        })
    }

    /// Borrows two distinct slots mutably at once. `None` for either handle
    /// if it is invalid; `None` for both if `a` and `b` name the same slot
    /// (that case is just `try_borrow_mut`, which doesn't need this).
    ///
    /// Used where one record needs to read another's state to update itself
    /// — the asset container reconciling a derived graph against its base
    /// is the motivating case, since both live in the same `Pool`.
    pub fn try_borrow_two_mut(&mut self, a: Handle<T>, b: Handle<T>) -> (Option<&mut T>, Option<&mut T>) {
        if a.index == b.index {
            return (None, None);
        }
        let (lo, hi, swapped) = if a.index < b.index { (a, b, false) } else { (b, a, true) };
        let (left, right) = self.records.split_at_mut(hi.index as usize);
        let lo_ref = left.get_mut(lo.index as usize).and_then(|r| {
            (r.generation == lo.generation).then(|| r.payload.as_mut()).flatten()
        });
        let hi_ref = right.first_mut().and_then(|r| {
            (r.generation == hi.generation).then(|| r.payload.as_mut()).flatten()
        });
        if swapped {
            (hi_ref, lo_ref)
        } else {
            (lo_ref, hi_ref)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spawn_and_borrow() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        let b = pool.spawn(2);
        assert_eq!(*pool.borrow(a), 1);
        assert_eq!(*pool.borrow(b), 2);
    }

    #[test]
    fn free_invalidates_stale_handle() {
        let mut pool = Pool::new();
        let a = pool.spawn("first");
        pool.free(a);
        assert!(pool.try_borrow(a).is_none());

        let b = pool.spawn("second");
        // Recycled the same slot, but `a` (old generation) must stay invalid.
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(pool.try_borrow(a).is_none());
        assert_eq!(*pool.borrow(b), "second");
    }

    #[test]
    fn none_handle_never_resolves() {
        let pool: Pool<i32> = Pool::new();
        assert!(pool.try_borrow(Handle::NONE).is_none());
        assert!(Handle::<i32>::NONE.is_none());
    }

    #[test]
    fn borrow_two_mut_gives_independent_references_regardless_of_order() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        let b = pool.spawn(2);

        {
            let (ra, rb) = pool.try_borrow_two_mut(a, b);
            *ra.unwrap() += 10;
            *rb.unwrap() += 20;
        }
        assert_eq!(*pool.borrow(a), 11);
        assert_eq!(*pool.borrow(b), 22);

        let (rb, ra) = pool.try_borrow_two_mut(b, a);
        assert_eq!(*rb.unwrap(), 22);
        assert_eq!(*ra.unwrap(), 11);
    }

    #[test]
    fn borrow_two_mut_rejects_the_same_handle_twice() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        let (ra, ra2) = pool.try_borrow_two_mut(a, a);
        assert!(ra.is_none());
        assert!(ra2.is_none());
    }
}
