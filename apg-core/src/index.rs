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

//! A position selector into an indexed object (collection or dictionary).

use crate::value::DictKey;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Either an integer position in a collection or a key in a dictionary.
/// `Index::Empty` selects "no index", used when addressing member content.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Index {
    Empty,
    Integer(usize),
    Key(DictKey),
}

impl Index {
    pub const EMPTY: Index = Index::Empty;

    pub fn as_integer(&self) -> Option<usize> {
        match self {
            Index::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&DictKey> {
        match self {
            Index::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Index::Empty)
    }
}

impl Default for Index {
    fn default() -> Self {
        Index::Empty
    }
}

impl From<usize> for Index {
    fn from(i: usize) -> Self {
        Index::Integer(i)
    }
}

impl From<DictKey> for Index {
    fn from(k: DictKey) -> Self {
        Index::Key(k)
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Index::Empty => write!(f, "<empty>"),
            Index::Integer(i) => write!(f, "{i}"),
            Index::Key(k) => write!(f, "{k:?}"),
        }
    }
}
