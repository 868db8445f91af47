// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cache-key derivation from argument sequences.
//!
//! Wrappers accept any `Eq + Hash + Clone` key type, so structural keys (the
//! arguments themselves, or a field of them) need nothing from this module.
//! What this module adds is the *identity* keying scheme: a shared trie whose
//! root is a fixed singleton and whose edges are labelled with one
//! [`KeyAtom`] per argument. Walking the atoms of a call down the trie yields
//! a compact [`CallKey`] node id, with the consequences callers rely on:
//!
//! - Two calls with the same atom sequence share a key.
//! - Distinct allocations yield distinct keys even when their contents are
//!   structurally equal ([`KeyAtom::ident_of`]).
//! - Primitive atoms compare by their natural equality.
//!
//! Trie nodes are interned through [`understory_dirty::intern::Interner`], so
//! a `CallKey` is a small `Copy` value suitable as an [`LruCache`] key.
//!
//! [`LruCache`]: crate::LruCache

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use understory_dirty::InternId;
use understory_dirty::intern::Interner;

/// One argument position of a call, reduced to a hashable label.
///
/// Identity atoms capture *which allocation* was passed, not what it
/// contains: see [`KeyAtom::ident_of`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeyAtom {
    /// A boolean argument.
    Bool(bool),
    /// A signed integer argument.
    Int(i64),
    /// An unsigned integer argument.
    Uint(u64),
    /// A string argument, compared by contents.
    Str(Box<str>),
    /// A reference identity, compared by address.
    Ident(usize),
}

impl KeyAtom {
    /// Captures the identity of a shared allocation.
    ///
    /// Two clones of the same `Rc` produce equal atoms; two separately
    /// allocated `Rc`s produce distinct atoms even if their contents are
    /// equal. The atom is only meaningful while the allocation is alive: an
    /// address can be reused once every clone has been dropped.
    #[must_use]
    pub fn ident_of<T>(value: &Rc<T>) -> Self {
        Self::Ident(Rc::as_ptr(value) as usize)
    }
}

impl From<bool> for KeyAtom {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeyAtom {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for KeyAtom {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<&str> for KeyAtom {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for KeyAtom {
    fn from(value: String) -> Self {
        Self::Str(value.into_boxed_str())
    }
}

/// A trie node: either the shared root or an edge from a parent node.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
enum TrieNode {
    Root,
    Edge { parent: InternId, atom: KeyAtom },
}

/// A cache key produced by [`KeyTrie::key`].
///
/// Keys are plain interned node ids: cheap to copy, hash, and compare.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CallKey(InternId);

struct TrieInner {
    nodes: Interner<TrieNode>,
    root: InternId,
}

/// Shared trie mapping argument-atom sequences to [`CallKey`]s.
///
/// Handles are cheap clones of the same underlying trie; every wrapper keyed
/// through the same handle shares one key space. [`MemoGraph::key_trie`]
/// hands out the graph-wide instance.
///
/// [`MemoGraph::key_trie`]: crate::MemoGraph::key_trie
#[derive(Clone)]
pub struct KeyTrie {
    inner: Rc<RefCell<TrieInner>>,
}

impl core::fmt::Debug for KeyTrie {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyTrie")
            .field("nodes", &self.inner.borrow().nodes.len())
            .finish_non_exhaustive()
    }
}

impl Default for KeyTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTrie {
    /// Creates an empty trie holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Interner::new();
        let root = nodes.intern(TrieNode::Root);
        Self {
            inner: Rc::new(RefCell::new(TrieInner { nodes, root })),
        }
    }

    /// Walks `atoms` from the root and returns the node they land on.
    ///
    /// An empty sequence keys the root itself, so zero-argument calls share
    /// one key per trie.
    pub fn key<I>(&self, atoms: I) -> CallKey
    where
        I: IntoIterator<Item = KeyAtom>,
    {
        let mut inner = self.inner.borrow_mut();
        let mut node = inner.root;
        for atom in atoms {
            node = inner.nodes.intern(TrieNode::Edge { parent: node, atom });
        }
        CallKey(node)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn equal_atom_sequences_share_a_key() {
        let trie = KeyTrie::new();
        let a = trie.key(["x".into(), KeyAtom::Int(1)]);
        let b = trie.key(["x".into(), KeyAtom::Int(1)]);
        let c = trie.key(["x".into(), KeyAtom::Int(2)]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn prefixes_key_distinct_nodes() {
        let trie = KeyTrie::new();
        let short = trie.key([KeyAtom::Uint(7)]);
        let long = trie.key([KeyAtom::Uint(7), KeyAtom::Uint(7)]);
        let empty = trie.key([]);

        assert_ne!(short, long);
        assert_ne!(short, empty);
        assert_eq!(empty, trie.key([]));
    }

    #[test]
    fn identity_atoms_distinguish_equal_contents() {
        let a = Rc::new(std::string::String::from("same"));
        let b = Rc::new(std::string::String::from("same"));

        let trie = KeyTrie::new();
        let by_a = trie.key([KeyAtom::ident_of(&a)]);
        let by_b = trie.key([KeyAtom::ident_of(&b)]);
        let by_a_again = trie.key([KeyAtom::ident_of(&Rc::clone(&a))]);

        assert_ne!(by_a, by_b);
        assert_eq!(by_a, by_a_again);
    }

    #[test]
    fn trie_handles_share_one_key_space() {
        let trie = KeyTrie::new();
        let other = trie.clone();
        assert_eq!(trie.key([KeyAtom::Bool(true)]), other.key([true.into()]));
    }
}
