//! # Sharded Concurrent Map
//!
//! A keyed store split across a fixed number of independently locked
//! shards. Lock contention on one global map is the primary bottleneck
//! for a concurrent keyspace; 32 shards give good parallelism for
//! uniform workloads without per-key locking overhead.
//!
//! ## Design Principles
//! 1. **Shard by FNV-1a**: the shard index is `fnv1a_32(key) % 32`, kept
//!    independent of the in-shard hasher.
//! 2. **Closure Access**: values that are not `Clone` (sorted sets) are
//!    inspected and mutated in place under the shard lock.
//! 3. **Short Critical Sections**: a shard lock is held for one map
//!    operation, never across I/O.
//! 4. **No Cross-Shard Atomicity**: multi-key operations see each key
//!    independently.

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::hash::fnv1a_32;

/// Number of independent shards.
pub const SHARD_COUNT: usize = 32;

struct Shard<V> {
    map: RwLock<HashMap<Vec<u8>, V, RandomState>>,
}

/// Fixed-shard concurrent map keyed by raw bytes.
pub struct ShardedMap<V> {
    shards: Vec<Shard<V>>,
}

impl<V> ShardedMap<V> {
    /// Creates an empty map with `SHARD_COUNT` shards.
    ///
    /// The shards share one `RandomState` seed so hash distribution stays
    /// consistent across them.
    pub fn new() -> Self {
        let state = RandomState::new();
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Shard {
                map: RwLock::new(HashMap::with_hasher(state.clone())),
            });
        }
        ShardedMap { shards }
    }

    fn shard(&self, key: &[u8]) -> &Shard<V> {
        let index = fnv1a_32(key) as usize % SHARD_COUNT;
        &self.shards[index]
    }

    /// Runs `f` over the value for `key` (if any) under the shard's read
    /// lock.
    pub fn view<R>(&self, key: &[u8], f: impl FnOnce(Option<&V>) -> R) -> R {
        let guard = self.shard(key).map.read();
        f(guard.get(key))
    }

    /// Runs `f` over a mutable reference to the value for `key` (if any)
    /// under the shard's write lock. Absent keys stay absent.
    pub fn update<R>(&self, key: &[u8], f: impl FnOnce(Option<&mut V>) -> R) -> R {
        let mut guard = self.shard(key).map.write();
        f(guard.get_mut(key))
    }

    /// Inserts `key` if absent (via `make`), then runs `f` over the
    /// value, all under one write-lock acquisition.
    pub fn upsert<R>(&self, key: &[u8], make: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        let mut guard = self.shard(key).map.write();
        let value = guard.entry(key.to_vec()).or_insert_with(make);
        f(value)
    }

    /// Inserts or overwrites the value for `key`.
    pub fn insert(&self, key: &[u8], value: V) {
        let mut guard = self.shard(key).map.write();
        guard.insert(key.to_vec(), value);
    }

    /// Inserts only when the key is absent. Returns whether it wrote.
    pub fn insert_if_absent(&self, key: &[u8], value: V) -> bool {
        let mut guard = self.shard(key).map.write();
        if guard.contains_key(key) {
            return false;
        }
        guard.insert(key.to_vec(), value);
        true
    }

    /// Overwrites only when the key is present. Returns whether it wrote.
    pub fn insert_if_present(&self, key: &[u8], value: V) -> bool {
        let mut guard = self.shard(key).map.write();
        match guard.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Removes the key. Idempotent; carries no present/absent signal, so
    /// callers that need a deletion count check presence first.
    pub fn remove(&self, key: &[u8]) {
        let mut guard = self.shard(key).map.write();
        guard.remove(key);
    }

    /// Returns whether the key is present.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.shard(key).map.read().contains_key(key)
    }

    /// Total entries across all shards. Takes the shard read locks one at
    /// a time, so the result is only a point-in-time approximation under
    /// concurrent writers.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    /// Returns whether every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.map.read().is_empty())
    }
}

impl<V> Default for ShardedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_view_roundtrip() {
        let map = ShardedMap::new();
        map.insert(b"alpha", 7u64);
        assert_eq!(map.view(b"alpha", |v| v.copied()), Some(7));
        assert_eq!(map.view(b"beta", |v| v.copied()), None);
    }

    #[test]
    fn insert_overwrites() {
        let map = ShardedMap::new();
        map.insert(b"alpha", 1u64);
        map.insert(b"alpha", 2u64);
        assert_eq!(map.view(b"alpha", |v| v.copied()), Some(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn conditional_inserts() {
        let map = ShardedMap::new();
        assert!(map.insert_if_absent(b"k", 1u64));
        assert!(!map.insert_if_absent(b"k", 2u64));
        assert_eq!(map.view(b"k", |v| v.copied()), Some(1));

        assert!(map.insert_if_present(b"k", 3u64));
        assert!(!map.insert_if_present(b"missing", 4u64));
        assert_eq!(map.view(b"k", |v| v.copied()), Some(3));
    }

    #[test]
    fn remove_is_idempotent() {
        let map = ShardedMap::new();
        map.insert(b"k", 1u64);
        map.remove(b"k");
        map.remove(b"k");
        assert!(!map.contains_key(b"k"));
        assert!(map.is_empty());
    }

    #[test]
    fn update_mutates_in_place() {
        let map = ShardedMap::new();
        map.insert(b"counter", 10i64);
        let seen = map.update(b"counter", |v| {
            let slot = v.unwrap();
            *slot += 5;
            *slot
        });
        assert_eq!(seen, 15);
        assert_eq!(map.update(b"missing", |v| v.is_some()), false);
    }

    #[test]
    fn upsert_creates_then_mutates() {
        let map = ShardedMap::new();
        let len = map.upsert(b"buf", Vec::new, |buf: &mut Vec<u8>| {
            buf.extend_from_slice(b"ab");
            buf.len()
        });
        assert_eq!(len, 2);
        let len = map.upsert(b"buf", Vec::new, |buf| {
            buf.extend_from_slice(b"c");
            buf.len()
        });
        assert_eq!(len, 3);
    }

    #[test]
    fn concurrent_writers_land_on_distinct_keys() {
        let map = Arc::new(ShardedMap::new());
        let mut handles = Vec::new();
        for worker in 0..8u64 {
            let map = Arc::clone(&map);
            handles.push(std::thread::spawn(move || {
                for i in 0..100u64 {
                    let key = format!("w{}:{}", worker, i);
                    map.insert(key.as_bytes(), worker * 1000 + i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 800);
        assert_eq!(map.view(b"w3:42", |v| v.copied()), Some(3042));
    }
}
