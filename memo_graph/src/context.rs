// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recomputation context stack.
//!
//! While an entry's work function runs, the entry sits on this stack; any
//! wrapped call made from inside the work function reads the top of the stack
//! to learn which entry it should register itself with. The stack therefore
//! represents one logical call chain.
//!
//! Callers snapshot [`ContextStack::current`] when a wrapped call begins and
//! report back to that snapshot when it ends, so an entry always reports to
//! the parent that actually invoked it rather than to whatever happens to be
//! on top of the stack afterwards.

use alloc::vec::Vec;

use crate::entry::EntryId;

/// Stack of entries whose work functions are currently executing.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    frames: Vec<EntryId>,
}

impl ContextStack {
    pub(crate) fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// The entry whose work function is currently executing, if any.
    pub(crate) fn current(&self) -> Option<EntryId> {
        self.frames.last().copied()
    }

    pub(crate) fn push(&mut self, entry: EntryId) {
        self.frames.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<EntryId> {
        self.frames.pop()
    }

    /// Number of entries currently recomputing.
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn current_tracks_top_of_stack() {
        let a = EntryId::new(0);
        let b = EntryId::new(1);

        let mut stack = ContextStack::new();
        assert_eq!(stack.current(), None);

        stack.push(a);
        stack.push(b);
        assert_eq!(stack.current(), Some(b));
        assert_eq!(stack.depth(), 2);

        assert_eq!(stack.pop(), Some(b));
        assert_eq!(stack.current(), Some(a));
        assert_eq!(stack.pop(), Some(a));
        assert_eq!(stack.pop(), None);
    }
}
