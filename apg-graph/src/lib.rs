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

//! Asset property graph: prefab/base-derived inheritance over a navigable
//! node graph of members, objects, collections and dictionaries.
//!
//! A base asset is loaded into one [`graph::AssetGraph`]; a derived asset is
//! loaded into another and linked against the first by [`linker`], which
//! walks both graphs in lockstep and records the correspondence on every
//! matched node. From then on, every mutation through [`graph::AssetGraph`]'s
//! API stamps override state ([`overrides`]) and fires structured events
//! ([`listener`]); [`reconcile`] is what keeps an unoverridden derived value
//! equal to its base after the base itself changes. [`container`] owns a
//! collection of graphs and wires that propagation up; [`metadata`] is the
//! serializable side-channel (override bits, object-reference ids) that
//! travels with a saved asset so it can be reapplied on load via
//! [`resolve::resolve`].

pub mod build;
pub mod clone;
pub mod container;
pub mod graph;
pub mod linker;
pub mod listener;
pub mod metadata;
pub mod node;
pub mod overrides;
pub mod reconcile;
pub mod registry;
pub mod resolve;

pub use graph::AssetGraph;
pub use listener::{ChangeEvent, ItemChangeKind};
pub use node::{NodeHandle, NodeSlot};
pub use overrides::OverrideType;
