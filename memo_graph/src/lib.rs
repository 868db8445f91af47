// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memo Graph: reactive memoization with a dirty-tracked dependency graph.
//!
//! This crate wraps computation functions so that their results are cached,
//! the dependencies *between* wrapped computations are discovered
//! automatically while they run, and invalidating one input re-executes
//! exactly the computations that transitively depended on it. Everything
//! else keeps returning its cached result.
//!
//! Three pieces cooperate:
//!
//! - **Entry graph**: every memoized (wrapper, key) pair is an entry with a
//!   dirty flag and parent/child edges. Marking an entry dirty pushes
//!   dirty-child marks up through the parents that trusted it.
//! - **Recomputation protocol**: a call either replays a clean cached
//!   outcome or re-runs the work function with its entry on the context
//!   stack, so nested wrapped calls register as children of the right
//!   parent. Re-entering an entry that is already recomputing fails with
//!   [`MemoError::Cycle`].
//! - **Bounded caches**: each wrapper holds its keys in an [`LruCache`]
//!   whose eviction hook marks the evicted entry dirty, so dependents of an
//!   evicted entry recompute instead of trusting a value that can no longer
//!   be looked up.
//!
//! ## Quick start
//!
//! ```rust
//! use core::convert::Infallible;
//! use memo_graph::{MemoGraph, MemoResult};
//!
//! let graph = MemoGraph::new();
//! let double = graph.wrap(
//!     |n: &u64| *n,
//!     |n: &u64| -> MemoResult<u64, Infallible> { Ok(n * 2) },
//! );
//!
//! assert_eq!(double.call(21), Ok(42));
//! // Served from cache; the closure does not run again.
//! assert_eq!(double.call(21), Ok(42));
//! assert_eq!(graph.stats().executed, 1);
//!
//! // Invalidation is per key.
//! double.dirty(&21);
//! assert_eq!(double.call(21), Ok(42));
//! assert_eq!(graph.stats().executed, 2);
//! ```
//!
//! ## Dependency tracking
//!
//! Wrappers created from one [`MemoGraph`] see each other's recomputations.
//! A wrapped call made while another wrapper's work function is running
//! becomes a child of that computation, and dirtying the child re-executes
//! the parent on its next access:
//!
//! ```rust
//! use core::cell::Cell;
//! use core::convert::Infallible;
//! use std::rc::Rc;
//! use memo_graph::{MemoGraph, MemoResult};
//!
//! let graph = MemoGraph::new();
//! let source = Rc::new(Cell::new(2_u64));
//!
//! let base = {
//!     let source = Rc::clone(&source);
//!     graph.wrap(
//!         |(): &()| (),
//!         move |(): &()| -> MemoResult<u64, Infallible> { Ok(source.get()) },
//!     )
//! };
//! let squared = {
//!     let base = base.clone();
//!     graph.wrap(
//!         |(): &()| (),
//!         move |(): &()| -> MemoResult<u64, Infallible> {
//!             let n = base.call(())?;
//!             Ok(n * n)
//!         },
//!     )
//! };
//!
//! assert_eq!(squared.call(()), Ok(4));
//!
//! // Changing the source alone is invisible until the base is dirtied.
//! source.set(3);
//! assert_eq!(squared.call(()), Ok(4));
//! base.dirty(&());
//! assert_eq!(squared.call(()), Ok(9));
//! ```
//!
//! ## Keys
//!
//! Cache keys are any `Eq + Hash + Clone` value derived from the call
//! arguments by the wrapper's key function. For reference-identity keying
//! (distinct allocations key distinct entries even when structurally equal)
//! use the graph's shared [`KeyTrie`] with [`KeyAtom::ident_of`].
//!
//! ## Execution model
//!
//! Single-threaded and cooperative: one [`MemoGraph`] and all of its
//! wrappers belong to one thread of execution, and no shared-state borrow is
//! held while user code runs, so work functions are free to call other
//! wrappers (or dirty keys) of the same graph. There are no locks anywhere.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod context;
mod entry;
mod key;
mod lru;
mod report;
mod wrap;

pub use key::{CallKey, KeyAtom, KeyTrie};
pub use lru::{Iter, LruCache};
pub use report::MemoStats;
pub use wrap::{
    DisposableWrapped, MemoError, MemoGraph, MemoResult, Unsubscribe, WrapOptions, Wrapped,
};
