//! # Database
//!
//! One logical keyspace: a `data` map from key to value and an
//! `expires` map from key to absolute deadline, both sharded. Expiry is
//! lazy: every access first checks the deadline and removes a dead key
//! before looking at the data, so a caller never observes an expired
//! value. There is no background sweeper.
//!
//! A key may have an expiry record without a live value (harmless; the
//! record is dropped on the next touch), but deletion always clears
//! both maps.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use carmine_common::CommandError;

use crate::map::ShardedMap;
use crate::value::Value;

/// Expiry state of a key, as reported by the TTL command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key is absent or already expired.
    Missing,
    /// Key exists and never expires.
    NoExpiry,
    /// Key expires after the given duration.
    ExpiresIn(Duration),
}

/// A single logical database.
pub struct Database {
    data: ShardedMap<Value>,
    expires: ShardedMap<SystemTime>,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Self {
        Database {
            data: ShardedMap::new(),
            expires: ShardedMap::new(),
        }
    }

    /// Drops the key if its deadline has passed. Returns whether it did.
    fn reap_if_due(&self, key: &[u8]) -> bool {
        let due = self
            .expires
            .view(key, |deadline| matches!(deadline, Some(at) if *at <= SystemTime::now()));
        if due {
            self.data.remove(key);
            self.expires.remove(key);
        }
        due
    }

    /// Runs `f` over the live value for `key` under the shard read lock.
    pub fn read<R>(&self, key: &[u8], f: impl FnOnce(Option<&Value>) -> R) -> R {
        self.reap_if_due(key);
        self.data.view(key, f)
    }

    /// Runs `f` over a mutable reference to the live value for `key`.
    pub fn write<R>(&self, key: &[u8], f: impl FnOnce(Option<&mut Value>) -> R) -> R {
        self.reap_if_due(key);
        self.data.update(key, f)
    }

    /// Creates the key via `make` if absent, then runs `f` on its value,
    /// in one shard-lock acquisition.
    pub fn upsert<R>(&self, key: &[u8], make: impl FnOnce() -> Value, f: impl FnOnce(&mut Value) -> R) -> R {
        self.reap_if_due(key);
        self.data.upsert(key, make, f)
    }

    /// Unconditional write. Leaves any expiry record alone; the command
    /// layer decides whether to clear or keep it.
    pub fn set(&self, key: &[u8], value: Value) {
        self.reap_if_due(key);
        self.data.insert(key, value);
    }

    /// Writes only if the key is absent (NX). Returns whether it wrote.
    pub fn set_if_absent(&self, key: &[u8], value: Value) -> bool {
        self.reap_if_due(key);
        self.data.insert_if_absent(key, value)
    }

    /// Writes only if the key is present (XX). Returns whether it wrote.
    pub fn set_if_present(&self, key: &[u8], value: Value) -> bool {
        self.reap_if_due(key);
        self.data.insert_if_present(key, value)
    }

    /// Whether the key is live.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.reap_if_due(key);
        self.data.contains_key(key)
    }

    /// Deletes a key and its expiry record. Returns whether a live key
    /// was removed; the presence re-check is what turns the map's
    /// signal-free remove into a deletion count.
    pub fn delete(&self, key: &[u8]) -> bool {
        if self.reap_if_due(key) {
            return false;
        }
        let was_present = self.data.contains_key(key);
        self.data.remove(key);
        self.expires.remove(key);
        was_present
    }

    /// Installs an absolute expiry deadline.
    pub fn expire_at(&self, key: &[u8], deadline: SystemTime) {
        self.expires.insert(key, deadline);
    }

    /// Installs an expiry a signed number of milliseconds from now.
    ///
    /// Non-positive offsets land in the past; the key then dies on its
    /// next touch, which is how EXAT/PXAT targets behind the clock are
    /// honored.
    pub fn expire_in(&self, key: &[u8], millis: i64) {
        let now = SystemTime::now();
        let deadline = if millis >= 0 {
            now + Duration::from_millis(millis as u64)
        } else {
            now - Duration::from_millis(millis.unsigned_abs())
        };
        self.expire_at(key, deadline);
    }

    /// Removes the expiry record. Returns whether one existed for a live
    /// key.
    pub fn persist(&self, key: &[u8]) -> bool {
        if self.reap_if_due(key) {
            return false;
        }
        let had_deadline = self.expires.contains_key(key) && self.data.contains_key(key);
        self.expires.remove(key);
        had_deadline
    }

    /// Reports the expiry state of a key.
    pub fn ttl(&self, key: &[u8]) -> TtlStatus {
        if self.reap_if_due(key) {
            return TtlStatus::Missing;
        }
        if !self.data.contains_key(key) {
            return TtlStatus::Missing;
        }
        let deadline = self.expires.view(key, |d| d.copied());
        match deadline {
            None => TtlStatus::NoExpiry,
            Some(at) => match at.duration_since(SystemTime::now()) {
                Ok(remaining) => TtlStatus::ExpiresIn(remaining),
                Err(_) => TtlStatus::Missing,
            },
        }
    }

    /// Reads the live string value for a key, if it is one.
    ///
    /// `Ok(None)` for an absent key; WRONGTYPE when the key holds a
    /// different type.
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, CommandError> {
        self.read(key, |value| match value {
            None => Ok(None),
            Some(Value::Str(data)) => Ok(Some(Arc::clone(data))),
            Some(_) => Err(CommandError::WrongType),
        })
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn get_bytes(db: &Database, key: &[u8]) -> Option<Vec<u8>> {
        db.get_string(key).unwrap().map(|data| data.to_vec())
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let db = Database::new();
        db.set(b"alpha", Value::str(&b"one"[..]));
        assert_eq!(get_bytes(&db, b"alpha"), Some(b"one".to_vec()));

        assert!(db.delete(b"alpha"));
        assert!(!db.delete(b"alpha"));
        assert_eq!(get_bytes(&db, b"alpha"), None);
    }

    #[test]
    fn conditional_writes_respect_presence() {
        let db = Database::new();
        assert!(!db.set_if_present(b"k", Value::str(&b"x"[..])));
        assert!(db.set_if_absent(b"k", Value::str(&b"one"[..])));
        assert!(!db.set_if_absent(b"k", Value::str(&b"two"[..])));
        assert!(db.set_if_present(b"k", Value::str(&b"three"[..])));
        assert_eq!(get_bytes(&db, b"k"), Some(b"three".to_vec()));
    }

    #[test]
    fn expired_keys_vanish_on_access() {
        let db = Database::new();
        db.set(b"k", Value::str(&b"v"[..]));
        db.expire_in(b"k", 5);
        sleep(Duration::from_millis(15));

        assert_eq!(get_bytes(&db, b"k"), None);
        assert!(!db.contains(b"k"));
        // the expiry record went with it
        assert_eq!(db.ttl(b"k"), TtlStatus::Missing);
    }

    #[test]
    fn past_deadlines_expire_immediately() {
        let db = Database::new();
        db.set(b"k", Value::str(&b"v"[..]));
        db.expire_in(b"k", -1000);
        assert_eq!(get_bytes(&db, b"k"), None);
    }

    #[test]
    fn expired_key_counts_as_absent_for_nx() {
        let db = Database::new();
        db.set(b"k", Value::str(&b"old"[..]));
        db.expire_in(b"k", -1);
        assert!(db.set_if_absent(b"k", Value::str(&b"new"[..])));
        assert_eq!(get_bytes(&db, b"k"), Some(b"new".to_vec()));
    }

    #[test]
    fn persist_drops_the_deadline() {
        let db = Database::new();
        db.set(b"k", Value::str(&b"v"[..]));
        db.expire_in(b"k", 60_000);
        assert!(matches!(db.ttl(b"k"), TtlStatus::ExpiresIn(_)));

        assert!(db.persist(b"k"));
        assert!(!db.persist(b"k"));
        assert_eq!(db.ttl(b"k"), TtlStatus::NoExpiry);

        sleep(Duration::from_millis(5));
        assert_eq!(get_bytes(&db, b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn ttl_reports_each_state() {
        let db = Database::new();
        assert_eq!(db.ttl(b"missing"), TtlStatus::Missing);

        db.set(b"k", Value::str(&b"v"[..]));
        assert_eq!(db.ttl(b"k"), TtlStatus::NoExpiry);

        db.expire_in(b"k", 60_000);
        match db.ttl(b"k") {
            TtlStatus::ExpiresIn(remaining) => assert!(remaining <= Duration::from_secs(60)),
            other => panic!("unexpected ttl state {:?}", other),
        }
    }

    #[test]
    fn wrong_type_is_visible_to_string_reads() {
        let db = Database::new();
        db.set(b"z", Value::Sorted(crate::ZSet::new()));
        assert!(db.get_string(b"z").is_err());
    }

    #[test]
    fn upsert_mutates_sorted_values_in_place() {
        let db = Database::new();
        let len = db.upsert(
            b"z",
            || Value::Sorted(crate::ZSet::new()),
            |value| match value {
                Value::Sorted(set) => {
                    set.insert(b"m", 1.5);
                    set.len()
                }
                _ => panic!("expected a sorted set"),
            },
        );
        assert_eq!(len, 1);
        let score = db.read(b"z", |value| match value {
            Some(Value::Sorted(set)) => set.score(b"m"),
            _ => None,
        });
        assert_eq!(score, Some(1.5));
    }
}
