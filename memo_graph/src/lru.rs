// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded key/value cache with an intrusive recency list and a dispose hook.
//!
//! The cache defers eviction: [`LruCache::set`] never evicts, and excess
//! entries are only trimmed when [`LruCache::clean`] runs. This lets a batch
//! of inserts complete before any dispose callbacks fire, so the hook always
//! observes a settled cache.
//!
//! Recency is maintained as a doubly-linked list threaded through dense slot
//! indices (no pointers), so promotions are O(1) and slots are reused through
//! a free list.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;

/// Sentinel for "no neighbor" in the recency list.
const NIL: u32 = u32::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    /// Next slot toward the newest end, or [`NIL`].
    newer: u32,
    /// Next slot toward the oldest end, or [`NIL`].
    older: u32,
}

/// Callback invoked for each entry evicted by [`LruCache::clean`].
///
/// Receives the evicted value and a reference to its key. It is *not* invoked
/// by [`LruCache::delete`].
type Dispose<K, V> = Box<dyn FnMut(V, &K)>;

/// A bounded map with newest-to-oldest recency ordering and deferred eviction.
///
/// - [`get`](Self::get) and [`set`](Self::set) promote the touched key to the
///   newest position; [`has`](Self::has) and [`peek`](Self::peek) do not.
/// - [`set`](Self::set) never evicts. Entries beyond the capacity bound are
///   removed by [`clean`](Self::clean), which invokes the dispose hook exactly
///   once per evicted entry.
/// - [`delete`](Self::delete) removes an entry without invoking the hook.
///
/// A bound of `0` means "never evict": the cache behaves as unbounded.
pub struct LruCache<K, V> {
    map: HashMap<K, u32>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<u32>,
    newest: u32,
    oldest: u32,
    limit: usize,
    dispose: Option<Dispose<K, V>>,
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.map.len())
            .field("limit", &self.limit)
            .field("has_dispose", &self.dispose.is_some())
            .finish_non_exhaustive()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache bounded to `max` entries, with no dispose hook.
    ///
    /// `max == 0` disables eviction entirely.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            newest: NIL,
            oldest: NIL,
            limit: if max == 0 { usize::MAX } else { max },
            dispose: None,
        }
    }

    /// Creates a cache bounded to `max` entries that invokes `dispose` for
    /// each entry evicted by [`clean`](Self::clean).
    #[must_use]
    pub fn with_dispose(max: usize, dispose: impl FnMut(V, &K) + 'static) -> Self {
        let mut cache = Self::new(max);
        cache.dispose = Some(Box::new(dispose));
        cache
    }

    /// Returns the number of cached entries (including any not yet trimmed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the value for `key` and promotes it to the newest position.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        self.slots.get(idx as usize)?.as_ref().map(|s| &s.value)
    }

    /// Returns the value for `key` without touching recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.slots.get(idx as usize)?.as_ref().map(|s| &s.value)
    }

    /// Returns `true` if `key` is present, without touching recency.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts or overwrites `key`, promotes it to the newest position, and
    /// returns the previous value if one was replaced.
    ///
    /// Excess entries are not evicted here; call [`clean`](Self::clean).
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            self.promote(idx);
            let slot = self.slots.get_mut(idx as usize)?.as_mut()?;
            return Some(core::mem::replace(&mut slot.value, value));
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(Slot {
                    key: key.clone(),
                    value,
                    newer: NIL,
                    older: NIL,
                });
                idx
            }
            None => {
                let idx = u32::try_from(self.slots.len())
                    .expect("too many live cache slots for u32 indices");
                self.slots.push(Some(Slot {
                    key: key.clone(),
                    value,
                    newer: NIL,
                    older: NIL,
                }));
                idx
            }
        };
        self.map.insert(key, idx);
        self.attach_newest(idx);
        None
    }

    /// Removes `key` and returns its value. The dispose hook is not invoked.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        let slot = self.slots.get_mut(idx as usize)?.take()?;
        self.free.push(idx);
        Some(slot.value)
    }

    /// Evicts oldest entries until the cache fits its bound, invoking the
    /// dispose hook once per evicted entry.
    pub fn clean(&mut self) {
        while self.map.len() > self.limit {
            let Some((key, value)) = self.pop_oldest() else {
                break;
            };
            if let Some(dispose) = self.dispose.as_mut() {
                dispose(value, &key);
            }
        }
    }

    /// Iterates cached `(key, value)` pairs from newest to oldest.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            cursor: self.newest,
        }
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let idx = self.oldest;
        if idx == NIL {
            return None;
        }
        self.detach(idx);
        let slot = self.slots.get_mut(idx as usize)?.take()?;
        self.free.push(idx);
        self.map.remove(&slot.key);
        Some((slot.key, slot.value))
    }

    /// Moves `idx` to the newest position.
    fn promote(&mut self, idx: u32) {
        if self.newest == idx {
            return;
        }
        self.detach(idx);
        self.attach_newest(idx);
    }

    /// Unlinks `idx` from the recency list, fixing up both endpoints.
    fn detach(&mut self, idx: u32) {
        let (newer, older) = match self.slots.get(idx as usize).and_then(Option::as_ref) {
            Some(slot) => (slot.newer, slot.older),
            None => return,
        };

        if newer == NIL {
            self.newest = older;
        } else if let Some(slot) = self.slots.get_mut(newer as usize).and_then(Option::as_mut) {
            slot.older = older;
        }

        if older == NIL {
            self.oldest = newer;
        } else if let Some(slot) = self.slots.get_mut(older as usize).and_then(Option::as_mut) {
            slot.newer = newer;
        }

        if let Some(slot) = self.slots.get_mut(idx as usize).and_then(Option::as_mut) {
            slot.newer = NIL;
            slot.older = NIL;
        }
    }

    /// Links `idx` in at the newest end of the recency list.
    fn attach_newest(&mut self, idx: u32) {
        let head = self.newest;
        if let Some(slot) = self.slots.get_mut(idx as usize).and_then(Option::as_mut) {
            slot.newer = NIL;
            slot.older = head;
        }
        if head != NIL
            && let Some(slot) = self.slots.get_mut(head as usize).and_then(Option::as_mut)
        {
            slot.newer = idx;
        }
        self.newest = idx;
        if self.oldest == NIL {
            self.oldest = idx;
        }
    }
}

/// Newest-to-oldest iterator over an [`LruCache`].
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    cache: &'a LruCache<K, V>,
    cursor: u32,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let slot = self
            .cache
            .slots
            .get(self.cursor as usize)?
            .as_ref()?;
        self.cursor = slot.older;
        Some((&slot.key, &slot.value))
    }
}
