//! # Sorted Set
//!
//! A skiplist index paired with a member→score map. The map answers
//! point lookups in O(1); the skiplist answers order, rank, and range
//! queries. Every mutation goes through this wrapper so the two stay in
//! lockstep, and the member buffer is a single `Arc<[u8]>` shared
//! between the skiplist node and the map key.

use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;

use crate::skiplist::{RangeSpec, SkipList};

/// Ordered scored set keyed by `(score, member)` with member tiebreak.
pub struct ZSet {
    list: SkipList,
    scores: HashMap<Arc<[u8]>, f64, RandomState>,
}

impl ZSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        ZSet {
            list: SkipList::new(),
            scores: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set holds no members.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Inserts a member, or moves it to a new score if already present.
    ///
    /// Re-inserting with the identical score is a no-op.
    pub fn insert(&mut self, member: &[u8], score: f64) {
        match self.scores.get(member).copied() {
            Some(current) if current == score => {}
            Some(_) => self.update(member, score),
            None => {
                let shared: Arc<[u8]> = Arc::from(member);
                self.list.insert(Arc::clone(&shared), score);
                self.scores.insert(shared, score);
            }
        }
    }

    /// Moves an existing member to `score`.
    ///
    /// The skiplist is keyed by `(score, member)`, so a score change is a
    /// delete at the old position plus an insert at the new one.
    pub fn update(&mut self, member: &[u8], score: f64) {
        let Some((shared, current)) = self.scores.get_key_value(member) else {
            return;
        };
        let shared = Arc::clone(shared);
        let current = *current;
        if current == score {
            return;
        }
        self.list.delete(member, current);
        self.list.insert(Arc::clone(&shared), score);
        self.scores.insert(shared, score);
    }

    /// Removes a member. Returns whether it was present.
    ///
    /// The map holds the canonical score, so the caller never passes one.
    pub fn delete(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.list.delete(member, score);
                true
            }
            None => false,
        }
    }

    /// Current score of a member.
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// 1-based rank of a member, validated against the map; 0 when the
    /// member is absent or `score` disagrees with the stored one.
    pub fn rank(&self, member: &[u8], score: f64) -> usize {
        match self.scores.get(member) {
            Some(&stored) if stored == score => self.list.rank(member, score),
            _ => 0,
        }
    }

    /// The n-th element within the score range; see
    /// [`SkipList::nth_in_range`].
    pub fn nth_in_range(&self, range: &RangeSpec, n: i64) -> Option<(&[u8], f64)> {
        self.list.nth_in_range(range, n)
    }
}

impl Default for ZSet {
    fn default() -> Self {
        Self::new()
    }
}
