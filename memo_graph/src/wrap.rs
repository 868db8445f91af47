// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The wrapping façade: [`MemoGraph`], [`Wrapped`] and friends.
//!
//! A [`MemoGraph`] owns the state every wrapper of one engine shares: the
//! entry arena, the recomputation context stack, the identity key trie, and
//! activity counters. Wrappers created from the same graph observe each
//! other's recomputations, which is how implicit dependency tracking works:
//! calling wrapper B from inside wrapper A's work function records B's entry
//! as a child of A's.
//!
//! ## Call pipeline
//!
//! Each [`Wrapped::call`] derives a cache key from the arguments, snapshots
//! the current parent frame, looks up (or creates) the entry for that key,
//! runs the recomputation protocol, and finally trims the wrapper's cache.
//! Eviction marks the evicted entry dirty and releases its subscription, so
//! parents of an evicted entry recompute instead of trusting a value that can
//! no longer be looked up.
//!
//! ## Re-entrancy and borrows
//!
//! Work functions routinely call back into wrappers of the same graph, so no
//! shared-state borrow is ever held across a user callback (work functions,
//! `subscribe`, unsubscribe handles). Unsubscribe handles surrendered during
//! cache cleaning are deferred and run once the cache borrow is released.
//!
//! A work function that panics unwinds past the engine's bookkeeping and
//! leaves its entry marked as recomputing; signal failures with `Err`
//! instead.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;
use core::mem;

use hashbrown::HashMap;

use crate::context::ContextStack;
use crate::entry::{EntryGraph, EntryId};
use crate::key::KeyTrie;
use crate::lru::LruCache;
use crate::report::{Counters, MemoStats};

/// Callback that releases an external subscription.
///
/// Returned by the `subscribe` option of [`WrapOptions`]; invoked exactly
/// once, when the subscribed entry is evicted from its wrapper's cache.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Outcome of a memoized call.
pub type MemoResult<T, E> = Result<T, MemoError<E>>;

/// Errors surfaced by a memoized call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoError<E> {
    /// The entry re-entered its own recomputation (direct or mutual
    /// recursion). Never cached: the entry keeps its pre-cycle state and a
    /// later [`Wrapped::dirty`] fully resets it.
    Cycle,
    /// The work function failed. Cached like a value and re-surfaced on
    /// every cached access until the key is dirtied.
    User(E),
}

impl<E: fmt::Display> fmt::Display for MemoError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => f.write_str("already recomputing"),
            Self::User(error) => write!(f, "{error}"),
        }
    }
}

impl<E> core::error::Error for MemoError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Cycle => None,
            Self::User(error) => Some(error),
        }
    }
}

/// Options applied to a wrapper at creation time.
///
/// Captured once per wrapper; later mutation is not possible, matching the
/// rule that a wrapper's behavior is fixed when it is built.
pub struct WrapOptions<A> {
    /// Bound on the wrapper's cache. `0` (the default) means unbounded.
    pub max: usize,
    /// External dirty source. Invoked once per created entry with the call
    /// arguments; the returned handle is kept on the entry and run when the
    /// entry is evicted.
    #[allow(clippy::type_complexity, reason = "spelled out, this is just a callback")]
    pub subscribe: Option<Box<dyn Fn(&A) -> Unsubscribe>>,
}

impl<A> Default for WrapOptions<A> {
    fn default() -> Self {
        Self {
            max: 0,
            subscribe: None,
        }
    }
}

impl<A> fmt::Debug for WrapOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapOptions")
            .field("max", &self.max)
            .field("has_subscribe", &self.subscribe.is_some())
            .finish_non_exhaustive()
    }
}

struct GraphShared {
    entries: RefCell<EntryGraph>,
    stack: RefCell<ContextStack>,
    trie: KeyTrie,
    counters: Counters,
    /// Unsubscribe handles surrendered during cache cleaning, run after the
    /// cache borrow is released.
    pending_unsubscribes: RefCell<Vec<Unsubscribe>>,
}

/// Shared memoization engine.
///
/// Cheap to clone; all clones refer to the same engine. See the
/// [crate docs](crate) for the overall shape.
#[derive(Clone)]
pub struct MemoGraph {
    shared: Rc<GraphShared>,
}

impl fmt::Debug for MemoGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoGraph")
            .field("stack_depth", &self.shared.stack.borrow().depth())
            .field("stats", &self.shared.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for MemoGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoGraph {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(GraphShared {
                entries: RefCell::new(EntryGraph::new()),
                stack: RefCell::new(ContextStack::new()),
                trie: KeyTrie::new(),
                counters: Counters::default(),
                pending_unsubscribes: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Wraps `work` with default options.
    ///
    /// `make_key` derives the cache key from the call arguments; calls whose
    /// keys compare equal share one memoized entry.
    pub fn wrap<A, K, T, E>(
        &self,
        make_key: impl Fn(&A) -> K + 'static,
        work: impl Fn(&A) -> MemoResult<T, E> + 'static,
    ) -> Wrapped<A, K, T, E>
    where
        A: 'static,
        K: Eq + Hash + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.wrap_with(make_key, work, WrapOptions::default())
    }

    /// Wraps `work` with explicit [`WrapOptions`].
    pub fn wrap_with<A, K, T, E>(
        &self,
        make_key: impl Fn(&A) -> K + 'static,
        work: impl Fn(&A) -> MemoResult<T, E> + 'static,
        options: WrapOptions<A>,
    ) -> Wrapped<A, K, T, E>
    where
        A: 'static,
        K: Eq + Hash + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
    {
        let values: ValueStore<T, E> = Rc::new(RefCell::new(HashMap::new()));
        let cache = {
            let graph = self.clone();
            let values = Rc::clone(&values);
            LruCache::with_dispose(options.max, move |id: EntryId, _key: &K| {
                values.borrow_mut().remove(&id);
                graph.note_evicted(id);
            })
        };
        Wrapped {
            shared: Rc::new(WrapShared {
                graph: self.clone(),
                make_key: Box::new(make_key),
                work: Box::new(work),
                subscribe: options.subscribe,
                cache: RefCell::new(cache),
                values,
            }),
        }
    }

    /// Wraps `work` as a disposable dependency tracker.
    ///
    /// A disposable wrapper never yields a value to its caller. Invoked with
    /// no active parent it is a no-op: the work function does not run and
    /// nothing is cached. Invoked from inside another wrapper's work function
    /// it caches and tracks normally, so [`Wrapped::dirty`] on one of its
    /// keys invalidates exactly the parents that depended on that key.
    pub fn wrap_disposable<A, K, E>(
        &self,
        make_key: impl Fn(&A) -> K + 'static,
        work: impl Fn(&A) -> MemoResult<(), E> + 'static,
        options: WrapOptions<A>,
    ) -> DisposableWrapped<A, K, E>
    where
        A: 'static,
        K: Eq + Hash + Clone + 'static,
        E: Clone + 'static,
    {
        DisposableWrapped {
            inner: self.wrap_with(make_key, work, options),
        }
    }

    /// The graph-wide identity key trie.
    ///
    /// All wrappers keyed through this handle share one key space; see
    /// [`KeyTrie`].
    #[must_use]
    pub fn key_trie(&self) -> KeyTrie {
        self.shared.trie.clone()
    }

    /// Snapshot of the engine's activity counters.
    #[must_use]
    pub fn stats(&self) -> MemoStats {
        self.shared.counters.snapshot()
    }

    fn current_parent(&self) -> Option<EntryId> {
        self.shared.stack.borrow().current()
    }

    fn create_entry(&self, unsubscribe: Option<Unsubscribe>) -> EntryId {
        self.shared.entries.borrow_mut().create(unsubscribe)
    }

    fn is_clean(&self, id: EntryId) -> bool {
        self.shared.entries.borrow().is_clean(id)
    }

    fn is_recomputing(&self, id: EntryId) -> bool {
        self.shared.entries.borrow().is_recomputing(id)
    }

    fn is_cached(&self, id: EntryId) -> bool {
        self.shared.entries.borrow().is_cached(id)
    }

    fn begin_recompute(&self, id: EntryId) {
        self.shared.entries.borrow_mut().begin_recompute(id);
        self.shared.stack.borrow_mut().push(id);
    }

    fn finish_recompute(&self, id: EntryId, cycle: bool) {
        self.shared.stack.borrow_mut().pop();
        self.shared.entries.borrow_mut().finish_recompute(id, cycle);
    }

    fn report_clean(&self, parent: Option<EntryId>, child: EntryId) {
        if let Some(parent) = parent {
            self.shared.entries.borrow_mut().report_clean(parent, child);
        }
    }

    fn set_dirty_entry(&self, id: EntryId) {
        self.shared.entries.borrow_mut().set_dirty(id);
    }

    fn counters(&self) -> &Counters {
        &self.shared.counters
    }

    fn release_if_orphaned(&self, id: EntryId) {
        self.shared.entries.borrow_mut().release_if_orphaned(id);
    }

    /// Cache-eviction hook: detach the entry and stage its unsubscribe
    /// handle. Runs with the evicting wrapper's cache borrowed, so the
    /// handle itself must wait.
    fn note_evicted(&self, id: EntryId) {
        self.shared.counters.record_eviction();
        let unsubscribe = self.shared.entries.borrow_mut().evicted(id);
        if let Some(unsubscribe) = unsubscribe {
            self.shared
                .pending_unsubscribes
                .borrow_mut()
                .push(unsubscribe);
        }
    }

    /// Runs staged unsubscribe handles outside of any borrow. The handles
    /// are user code and may trigger further evictions, hence the loop.
    fn run_pending_unsubscribes(&self) {
        loop {
            let pending = mem::take(&mut *self.shared.pending_unsubscribes.borrow_mut());
            if pending.is_empty() {
                return;
            }
            for unsubscribe in pending {
                unsubscribe();
            }
        }
    }
}

type ValueStore<T, E> = Rc<RefCell<HashMap<EntryId, Result<T, E>>>>;

struct WrapShared<A, K, T, E> {
    graph: MemoGraph,
    make_key: Box<dyn Fn(&A) -> K>,
    work: Box<dyn Fn(&A) -> MemoResult<T, E>>,
    #[allow(clippy::type_complexity, reason = "spelled out, this is just a callback")]
    subscribe: Option<Box<dyn Fn(&A) -> Unsubscribe>>,
    cache: RefCell<LruCache<K, EntryId>>,
    values: ValueStore<T, E>,
}

/// A memoized function.
///
/// Produced by [`MemoGraph::wrap`]. Clones are cheap handles onto the same
/// cache, which makes self-recursive wrappers expressible by capturing a
/// clone of the handle in the work function.
pub struct Wrapped<A, K, T, E> {
    shared: Rc<WrapShared<A, K, T, E>>,
}

impl<A, K, T, E> Clone for Wrapped<A, K, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<A, K, T, E> fmt::Debug for Wrapped<A, K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("cached_entries", &self.shared.cache.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<A, K, T, E> Wrapped<A, K, T, E>
where
    A: 'static,
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Memoized invocation.
    ///
    /// Returns the cached outcome when the entry for the derived key is
    /// clean; otherwise runs the work function, caches what it produced
    /// (value or error alike), and returns it. Either way the call registers
    /// itself as a child of the wrapped call currently recomputing, if any.
    pub fn call(&self, args: A) -> MemoResult<T, E> {
        let shared = &self.shared;
        let key = (shared.make_key)(&args);
        let parent = shared.graph.current_parent();

        let cached = shared.cache.borrow_mut().get(&key).copied();
        let id = match cached {
            Some(id) => id,
            None => {
                let unsubscribe = shared.subscribe.as_ref().map(|subscribe| subscribe(&args));
                let id = shared.graph.create_entry(unsubscribe);
                shared.cache.borrow_mut().set(key, id);
                id
            }
        };

        let outcome = self.recompute(id, parent, &args);

        shared.cache.borrow_mut().clean();
        shared.graph.run_pending_unsubscribes();

        outcome
    }

    /// Invalidates the entry for these arguments, if cached.
    ///
    /// The next call with an equal key re-executes the work function, and
    /// every wrapped call that depended on this entry re-executes on its own
    /// next access. Unknown keys are a silent no-op; repeated marks are
    /// absorbed.
    pub fn dirty(&self, args: &A) {
        let key = (self.shared.make_key)(args);
        let id = self.shared.cache.borrow().peek(&key).copied();
        if let Some(id) = id {
            self.shared.graph.set_dirty_entry(id);
        }
    }

    /// Returns whether an entry for these arguments is cached.
    ///
    /// Neither promotes the entry nor recomputes anything.
    #[must_use]
    pub fn has(&self, args: &A) -> bool {
        let key = (self.shared.make_key)(args);
        self.shared.cache.borrow().has(&key)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.cache.borrow().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.cache.borrow().is_empty()
    }

    /// The cached-or-recompute protocol for one entry.
    fn recompute(&self, id: EntryId, parent: Option<EntryId>, args: &A) -> MemoResult<T, E> {
        let shared = &self.shared;

        if shared.graph.is_clean(id)
            && let Some(outcome) = shared.values.borrow().get(&id).cloned()
        {
            shared.graph.counters().record_hit();
            shared.graph.report_clean(parent, id);
            return outcome.map_err(MemoError::User);
        }

        if shared.graph.is_recomputing(id) {
            shared.graph.counters().record_cycle();
            return Err(MemoError::Cycle);
        }

        shared.graph.begin_recompute(id);
        let result = (shared.work)(args);
        shared.graph.counters().record_execution();
        let cycle = matches!(result, Err(MemoError::Cycle));
        shared.graph.finish_recompute(id, cycle);

        let outcome: Result<T, E> = match result {
            Ok(value) => Ok(value),
            Err(MemoError::User(error)) => Err(error),
            // A propagated cycle error is surfaced but never cached; the
            // entry stays dirty and is retried from scratch next time. An
            // entry evicted while this run was in flight has no owner left
            // on this path either, so the orphan check cannot be skipped.
            Err(MemoError::Cycle) => {
                if !shared.graph.is_cached(id) {
                    shared.graph.release_if_orphaned(id);
                }
                return Err(MemoError::Cycle);
            }
        };

        // An entry evicted while it was recomputing can no longer be reached
        // through a key lookup, so there is no point storing its outcome.
        if shared.graph.is_cached(id) {
            shared.values.borrow_mut().insert(id, outcome.clone());
        }
        shared.graph.report_clean(parent, id);
        if !shared.graph.is_cached(id) {
            shared.graph.release_if_orphaned(id);
        }

        outcome.map_err(MemoError::User)
    }
}

/// A memoized dependency tracker that never yields a value.
///
/// Produced by [`MemoGraph::wrap_disposable`]; see there for semantics.
pub struct DisposableWrapped<A, K, E> {
    inner: Wrapped<A, K, (), E>,
}

impl<A, K, E> Clone for DisposableWrapped<A, K, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, K, E> fmt::Debug for DisposableWrapped<A, K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableWrapped")
            .field("cached_entries", &self.inner.shared.cache.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<A, K, E> DisposableWrapped<A, K, E>
where
    A: 'static,
    K: Eq + Hash + Clone + 'static,
    E: Clone + 'static,
{
    /// Invocation: a no-op outside of any recomputing parent, a tracked
    /// memoized call inside one.
    pub fn call(&self, args: A) -> MemoResult<(), E> {
        if self.inner.shared.graph.current_parent().is_none() {
            return Ok(());
        }
        self.inner.call(args)
    }

    /// See [`Wrapped::dirty`].
    pub fn dirty(&self, args: &A) {
        self.inner.dirty(args);
    }

    /// See [`Wrapped::has`].
    #[must_use]
    pub fn has(&self, args: &A) -> bool {
        self.inner.has(args)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
