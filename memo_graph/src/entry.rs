// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entry identities and the dirty-tracked dependency graph.
//!
//! Each memoized (wrapper, key) pair is represented by one entry slot in an
//! arena, identified by a dense [`EntryId`]. Entries from every wrapper of a
//! graph live in the same arena, because dependency edges routinely cross
//! wrapper boundaries; the values themselves stay with their owning wrapper,
//! which stores outcomes keyed by [`EntryId`].
//!
//! ## Edges and dirtiness
//!
//! If entry P invoked entry C during P's most recent recomputation, C is in
//! `P.children` and P is in `C.parents`. Dirtiness flows upward only:
//! marking C dirty inserts C into `dirty_children` of every parent that
//! currently tracks C as clean, and continues upward from each parent that
//! was clean until now. An entry with a non-empty `dirty_children` set is
//! treated as dirty even when its own `dirty` flag is unset.
//!
//! Propagation never recurses through an entry whose work function is
//! currently executing: that entry is already producing a fresh value, and
//! following its back edges is how dependency cycles would otherwise turn
//! into unbounded traversals.
//!
//! ## Slot lifecycle
//!
//! A slot stays live while its entry is cached by a wrapper, referenced as a
//! child by some parent, or recomputing. Once none of those hold the slot is
//! released to a free list; releasing an entry detaches it from its own
//! children, which can cascade further releases. All traversals here use
//! explicit work stacks so that deep dependency chains never translate into
//! deep native recursion.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use hashbrown::HashSet;

/// Callback releasing an external subscription, run once on eviction.
pub(crate) type UnsubscribeFn = Box<dyn FnOnce()>;

/// Dense identity of one entry in the graph arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct EntryId(u32);

impl EntryId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// State of one memoized invocation, minus its value.
struct EntryNode {
    /// The entry's own value must be recomputed on next access.
    dirty: bool,
    /// True between context-stack push and pop of this entry.
    recomputing: bool,
    /// Entry is currently present in its wrapper's cache.
    cached: bool,
    /// Entries that observed this entry during their last recomputation.
    parents: HashSet<EntryId>,
    /// Entries this entry observed during its last recomputation.
    children: HashSet<EntryId>,
    /// Children known to be dirty. Non-empty means this entry is dirty too.
    dirty_children: HashSet<EntryId>,
    /// Live external dirty-source handle, taken exactly once on eviction.
    unsubscribe: Option<UnsubscribeFn>,
}

impl EntryNode {
    fn new(unsubscribe: Option<UnsubscribeFn>) -> Self {
        Self {
            // A fresh entry has never produced a value.
            dirty: true,
            recomputing: false,
            cached: true,
            parents: HashSet::new(),
            children: HashSet::new(),
            dirty_children: HashSet::new(),
            unsubscribe,
        }
    }
}

impl fmt::Debug for EntryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryNode")
            .field("dirty", &self.dirty)
            .field("recomputing", &self.recomputing)
            .field("cached", &self.cached)
            .field("parents", &self.parents.len())
            .field("children", &self.children.len())
            .field("dirty_children", &self.dirty_children.len())
            .finish_non_exhaustive()
    }
}

/// Reusable traversal buffers.
///
/// Taken with `mem::take` around each use so traversal can run while slots
/// are being mutated.
#[derive(Debug, Default)]
struct Scratch {
    stack: Vec<EntryId>,
    parents: Vec<EntryId>,
}

/// Arena of entry slots plus the dirty-propagation operations over them.
#[derive(Debug, Default)]
pub(crate) struct EntryGraph {
    slots: Vec<Option<EntryNode>>,
    free: Vec<EntryId>,
    scratch: Scratch,
}

impl EntryGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a cached, dirty entry and returns its identity.
    pub(crate) fn create(&mut self, unsubscribe: Option<UnsubscribeFn>) -> EntryId {
        let node = EntryNode::new(unsubscribe);
        match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(node);
                id
            }
            None => {
                let id = EntryId::new(
                    u32::try_from(self.slots.len()).expect("too many live entries for u32 ids"),
                );
                self.slots.push(Some(node));
                id
            }
        }
    }

    /// Entry has a trustworthy value: not dirty, no dirty children, and not
    /// mid-recomputation.
    pub(crate) fn is_clean(&self, id: EntryId) -> bool {
        match self.node(id) {
            Some(n) => !n.recomputing && !n.dirty && n.dirty_children.is_empty(),
            None => false,
        }
    }

    pub(crate) fn is_recomputing(&self, id: EntryId) -> bool {
        self.node(id).is_some_and(|n| n.recomputing)
    }

    pub(crate) fn is_cached(&self, id: EntryId) -> bool {
        self.node(id).is_some_and(|n| n.cached)
    }

    /// Starts a recomputation: the entry forgets its previous children and
    /// clears its dirty state, which a mid-run [`set_dirty`](Self::set_dirty)
    /// may re-establish so the finished result is immediately stale.
    pub(crate) fn begin_recompute(&mut self, id: EntryId) {
        self.forget_children(id);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.dirty = false;
        node.dirty_children.clear();
        node.recomputing = true;
    }

    /// Ends a recomputation. A `cycle` outcome restores the dirty flag so the
    /// entry is retried from scratch on its next access; any other outcome
    /// leaves the dirty flag exactly as the run left it.
    pub(crate) fn finish_recompute(&mut self, id: EntryId, cycle: bool) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.recomputing = false;
        if cycle {
            node.dirty = true;
        }
    }

    /// Marks `id` dirty and walks the parent edges with an explicit stack,
    /// inserting dirty-child marks. The walk continues upward only through
    /// parents that were clean until this moment and are not themselves
    /// recomputing.
    pub(crate) fn set_dirty(&mut self, id: EntryId) {
        if self.node(id).is_none() {
            return;
        }

        let mut stack = mem::take(&mut self.scratch.stack);
        let mut parent_buf = mem::take(&mut self.scratch.parents);
        stack.clear();

        if let Some(node) = self.node_mut(id) {
            node.dirty = true;
        }
        stack.push(id);

        while let Some(child) = stack.pop() {
            parent_buf.clear();
            if let Some(node) = self.node(child) {
                parent_buf.extend(node.parents.iter().copied());
            }

            for &parent in &parent_buf {
                let Some(node) = self.node_mut(parent) else {
                    continue;
                };
                // Only parents that still track the child as clean learn
                // about the change; the rest already know.
                if !node.children.contains(&child) {
                    continue;
                }
                let was_clean = !node.dirty && node.dirty_children.is_empty();
                if node.dirty_children.insert(child) && was_clean && !node.recomputing {
                    stack.push(parent);
                }
            }
        }

        self.scratch.stack = stack;
        self.scratch.parents = parent_buf;
    }

    /// Records that `child` finished cleanly while `parent` was the active
    /// frame: the parent tracks the child, the child gains the back edge.
    pub(crate) fn report_clean(&mut self, parent: EntryId, child: EntryId) {
        if self.node(child).is_none() {
            return;
        }
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        node.children.insert(child);
        node.dirty_children.remove(&child);
        if let Some(node) = self.node_mut(child) {
            node.parents.insert(parent);
        }
    }

    /// Entry was evicted from its wrapper's cache: it is no longer reachable
    /// through a key lookup, its parents must treat it as dirty, and its
    /// subscription handle (if any) is surrendered to the caller.
    pub(crate) fn evicted(&mut self, id: EntryId) -> Option<UnsubscribeFn> {
        let unsubscribe = match self.node_mut(id) {
            Some(node) => {
                node.cached = false;
                node.unsubscribe.take()
            }
            None => return None,
        };
        self.set_dirty(id);
        self.release_if_orphaned(id);
        unsubscribe
    }

    /// Frees the slot if nothing keeps the entry alive, cascading through
    /// children that become orphaned in turn.
    pub(crate) fn release_if_orphaned(&mut self, id: EntryId) {
        let mut queue = mem::take(&mut self.scratch.stack);
        queue.clear();
        queue.push(id);

        while let Some(id) = queue.pop() {
            let orphaned = match self.node(id) {
                Some(n) => !n.cached && !n.recomputing && n.parents.is_empty(),
                None => false,
            };
            if !orphaned {
                continue;
            }
            let Some(node) = self.slots.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            self.free.push(id);
            for child in node.children {
                if let Some(child_node) = self.node_mut(child) {
                    child_node.parents.remove(&id);
                }
                queue.push(child);
            }
        }

        self.scratch.stack = queue;
    }

    /// Drops all child edges of `id`, releasing children that end up with no
    /// remaining owner.
    fn forget_children(&mut self, id: EntryId) {
        let children = match self.node_mut(id) {
            Some(node) => {
                node.dirty_children.clear();
                mem::take(&mut node.children)
            }
            None => return,
        };
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parents.remove(&id);
            }
            self.release_if_orphaned(child);
        }
    }

    fn node(&self, id: EntryId) -> Option<&EntryNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: EntryId) -> Option<&mut EntryNode> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    #[cfg(test)]
    fn is_live(&self, id: EntryId) -> bool {
        self.node(id).is_some()
    }

    /// Number of occupied arena slots.
    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    /// Wires `child` under `parent` the way a finished recomputation would.
    fn adopt(graph: &mut EntryGraph, parent: EntryId, child: EntryId) {
        graph.report_clean(parent, child);
    }

    fn settle(graph: &mut EntryGraph, id: EntryId) {
        graph.begin_recompute(id);
        graph.finish_recompute(id, false);
    }

    #[test]
    fn fresh_entries_are_dirty_until_first_recompute() {
        let mut graph = EntryGraph::new();
        let e = graph.create(None);
        assert!(!graph.is_clean(e));

        settle(&mut graph, e);
        assert!(graph.is_clean(e));
    }

    #[test]
    fn dirty_propagates_to_clean_parents_only() {
        let mut graph = EntryGraph::new();
        let grandparent = graph.create(None);
        let parent = graph.create(None);
        let child = graph.create(None);
        for id in [grandparent, parent, child] {
            settle(&mut graph, id);
        }
        adopt(&mut graph, grandparent, parent);
        adopt(&mut graph, parent, child);

        graph.set_dirty(child);
        assert!(!graph.is_clean(child));
        assert!(!graph.is_clean(parent));
        assert!(!graph.is_clean(grandparent));

        // A second mark is absorbed: the parents already know.
        graph.set_dirty(child);
        assert!(!graph.is_clean(grandparent));
    }

    #[test]
    fn propagation_stops_at_recomputing_parents() {
        let mut graph = EntryGraph::new();
        let grandparent = graph.create(None);
        let parent = graph.create(None);
        let child = graph.create(None);
        for id in [grandparent, parent, child] {
            settle(&mut graph, id);
        }
        adopt(&mut graph, grandparent, parent);
        adopt(&mut graph, parent, child);

        graph.begin_recompute(parent);
        graph.set_dirty(child);

        // The recomputing parent records the dirty child but does not pass
        // the mark along; the grandparent still trusts its value.
        assert!(graph.is_clean(grandparent));

        graph.finish_recompute(parent, false);
        assert!(!graph.is_clean(parent));
    }

    #[test]
    fn report_clean_clears_the_dirty_child_mark_for_one_parent() {
        let mut graph = EntryGraph::new();
        let left = graph.create(None);
        let right = graph.create(None);
        let child = graph.create(None);
        for id in [left, right, child] {
            settle(&mut graph, id);
        }
        adopt(&mut graph, left, child);
        adopt(&mut graph, right, child);

        graph.set_dirty(child);
        settle(&mut graph, child);
        graph.report_clean(left, child);

        assert!(graph.is_clean(left));
        assert!(!graph.is_clean(right));
    }

    #[test]
    fn mid_run_dirty_survives_finish() {
        let mut graph = EntryGraph::new();
        let e = graph.create(None);
        settle(&mut graph, e);

        graph.begin_recompute(e);
        graph.set_dirty(e);
        graph.finish_recompute(e, false);

        // The freshly stored result is already out of date.
        assert!(!graph.is_clean(e));
    }

    #[test]
    fn cycle_outcome_leaves_the_entry_dirty() {
        let mut graph = EntryGraph::new();
        let e = graph.create(None);
        settle(&mut graph, e);

        graph.begin_recompute(e);
        assert!(graph.is_recomputing(e));
        graph.finish_recompute(e, true);

        assert!(!graph.is_recomputing(e));
        assert!(!graph.is_clean(e));
    }

    #[test]
    fn eviction_detaches_subscription_and_dirties_parents() {
        use alloc::rc::Rc;
        use core::cell::Cell;

        let unsubscribed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&unsubscribed);

        let mut graph = EntryGraph::new();
        let parent = graph.create(None);
        let child = graph.create(Some(Box::new(move || flag.set(true))));
        settle(&mut graph, parent);
        settle(&mut graph, child);
        adopt(&mut graph, parent, child);

        let unsubscribe = graph.evicted(child).expect("handle should be surrendered");
        unsubscribe();
        assert!(unsubscribed.get());
        assert!(!graph.is_clean(parent));

        // Still referenced by the parent, so the slot survives.
        assert!(graph.is_live(child));
    }

    #[test]
    fn releasing_cascades_through_orphaned_children() {
        let mut graph = EntryGraph::new();
        let top = graph.create(None);
        let mid = graph.create(None);
        let leaf = graph.create(None);
        for id in [top, mid, leaf] {
            settle(&mut graph, id);
        }
        adopt(&mut graph, top, mid);
        adopt(&mut graph, mid, leaf);

        // Evict the whole chain from its caches; only parent references keep
        // mid and leaf alive.
        graph.evicted(leaf);
        graph.evicted(mid);
        assert!(graph.is_live(mid));
        assert!(graph.is_live(leaf));

        graph.evicted(top);
        assert!(!graph.is_live(top));
        assert!(!graph.is_live(mid));
        assert!(!graph.is_live(leaf));
    }

    #[test]
    fn released_slots_are_reused() {
        let mut graph = EntryGraph::new();
        let a = graph.create(None);
        graph.evicted(a);
        assert!(!graph.is_live(a));

        let b = graph.create(None);
        assert_eq!(a, b);
    }
}
