// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cheap counters describing what a graph has been doing.
//!
//! These are plain monotonic counts, snapshotted on demand. Formatting and
//! interpretation are left to embedders.

use core::cell::Cell;

/// Snapshot of a graph's activity counters.
///
/// Obtained from [`MemoGraph::stats`](crate::MemoGraph::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoStats {
    /// Work-function executions (cache misses and recomputations).
    pub executed: u64,
    /// Calls answered from a clean cached outcome.
    pub hits: u64,
    /// Re-entrant recomputations rejected with a cycle error.
    pub cycles: u64,
    /// Entries evicted by cache cleaning.
    pub evictions: u64,
}

/// Live counters backing [`MemoStats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    executed: Cell<u64>,
    hits: Cell<u64>,
    cycles: Cell<u64>,
    evictions: Cell<u64>,
}

impl Counters {
    pub(crate) fn record_execution(&self) {
        self.executed.set(self.executed.get().wrapping_add(1));
    }

    pub(crate) fn record_hit(&self) {
        self.hits.set(self.hits.get().wrapping_add(1));
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.set(self.cycles.get().wrapping_add(1));
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.set(self.evictions.get().wrapping_add(1));
    }

    pub(crate) fn snapshot(&self) -> MemoStats {
        MemoStats {
            executed: self.executed.get(),
            hits: self.hits.get(),
            cycles: self.cycles.get(),
            evictions: self.evictions.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let counters = Counters::default();
        counters.record_execution();
        counters.record_execution();
        counters.record_hit();
        counters.record_cycle();

        assert_eq!(
            counters.snapshot(),
            MemoStats {
                executed: 2,
                hits: 1,
                cycles: 1,
                evictions: 0,
            }
        );
    }
}
