//! # Rank-Augmented Skiplist
//!
//! Ordered index keyed by `(score, member)` with a span counter per
//! level, so rank queries and rank-offset jumps run in O(log N) expected
//! time alongside ordinary insert/delete.
//!
//! ## Design Principles
//! 1. **Index Arena**: nodes live in a `Vec<Option<Node>>` with a
//!    free-list; `forward`, `backward`, `tail`, and search paths are slot
//!    indices, which sidesteps the ownership cycle a doubly linked
//!    pointer graph would create.
//! 2. **Stable Slots**: deletion returns a slot to the free list instead
//!    of compacting, so indices held by a traversal stay valid.
//! 3. **Span Bookkeeping**: for every level, the spans along the forward
//!    chain (including the trailing link to the end) sum to `len`.
//! 4. **Owned RNG**: level generation draws from a per-instance
//!    `SmallRng` seeded once, so bursts of insertions cannot correlate.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Maximum node height.
const MAX_LEVEL: usize = 32;

/// Probability of promoting a node one more level.
const LEVEL_P: f64 = 0.25;

/// Offsets below this walk node by node; larger offsets jump by rank.
const MAX_LINEAR_STEPS: usize = 10;

/// Slot of the head sentinel; never freed, never reported.
const HEAD: usize = 0;

/// Score interval with independently exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub min_ex: bool,
    pub max_ex: bool,
}

impl RangeSpec {
    /// Builds a range inclusive on both ends.
    pub fn inclusive(min: f64, max: f64) -> Self {
        RangeSpec {
            min,
            max,
            min_ex: false,
            max_ex: false,
        }
    }

    /// Whether `score` sits at or above the lower bound.
    pub fn gte_min(&self, score: f64) -> bool {
        if self.min_ex {
            score > self.min
        } else {
            score >= self.min
        }
    }

    /// Whether `score` sits at or below the upper bound.
    pub fn lte_max(&self, score: f64) -> bool {
        if self.max_ex {
            score < self.max
        } else {
            score <= self.max
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Level {
    forward: Option<usize>,
    /// Nodes this link skips; 1 when `forward` is the immediate
    /// successor at level 0.
    span: usize,
}

#[derive(Debug)]
struct Node {
    member: Arc<[u8]>,
    score: f64,
    /// Immediate level-0 predecessor; `None` on the first node.
    backward: Option<usize>,
    levels: Vec<Level>,
}

/// Skiplist ordered by `(score, member)` ascending.
///
/// Callers guarantee `(score, member)` pairs are distinct and scores are
/// never NaN; the sorted-set layer enforces both through its member map.
pub struct SkipList {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    tail: Option<usize>,
    /// Greatest level index in use, at least 1.
    level: usize,
    /// Number of nodes, excluding the head sentinel.
    len: usize,
    rng: SmallRng,
}

impl SkipList {
    /// Creates an empty skiplist with a pre-allocated head sentinel.
    pub fn new() -> Self {
        let head = Node {
            member: Arc::from(&b""[..]),
            score: 0.0,
            backward: None,
            levels: vec![Level::default(); MAX_LEVEL],
        };
        SkipList {
            nodes: vec![Some(head)],
            free: Vec::new(),
            tail: None,
            level: 1,
            len: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, idx: usize) -> &Node {
        self.nodes[idx].as_ref().expect("live slot")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("live slot")
    }

    /// Whether the node at `idx` orders strictly before `(score, member)`.
    fn precedes(&self, idx: usize, score: f64, member: &[u8]) -> bool {
        let node = self.node(idx);
        node.score < score || (node.score == score && node.member.as_ref() < member)
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen::<f64>() <= LEVEL_P {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, member: Arc<[u8]>, score: f64, height: usize) -> usize {
        let node = Node {
            member,
            score,
            backward: None,
            levels: vec![Level::default(); height],
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Inserts a new `(member, score)` pair.
    ///
    /// The pair must not already be present; the sorted-set layer routes
    /// score changes through delete + insert.
    pub fn insert(&mut self, member: Arc<[u8]>, score: f64) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.node(x).levels[i].forward {
                if !self.precedes(next, score, member.as_ref()) {
                    break;
                }
                rank[i] += self.node(x).levels[i].span;
                x = next;
            }
            update[i] = x;
        }

        let height = self.random_level();
        if height > self.level {
            let len = self.len;
            for i in self.level..height {
                rank[i] = 0;
                update[i] = HEAD;
                self.node_mut(HEAD).levels[i].span = len;
            }
            self.level = height;
        }

        let idx = self.alloc(member, score, height);
        for i in 0..height {
            let prev = update[i];
            let prev_forward = self.node(prev).levels[i].forward;
            let prev_span = self.node(prev).levels[i].span;

            {
                let node = self.node_mut(idx);
                node.levels[i].forward = prev_forward;
                node.levels[i].span = prev_span - (rank[0] - rank[i]);
            }
            let prev_node = self.node_mut(prev);
            prev_node.levels[i].forward = Some(idx);
            prev_node.levels[i].span = rank[0] - rank[i] + 1;
        }
        // Links that skip over the new node just got one node longer.
        for i in height..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        self.node_mut(idx).backward = if update[0] == HEAD {
            None
        } else {
            Some(update[0])
        };
        match self.node(idx).levels[0].forward {
            Some(next) => self.node_mut(next).backward = Some(idx),
            None => self.tail = Some(idx),
        }
        self.len += 1;
    }

    /// Removes `(member, score)` if present. Returns whether it was.
    pub fn delete(&mut self, member: &[u8], score: f64) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.node(x).levels[i].forward {
                if !self.precedes(next, score, member) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }

        let target = match self.node(x).levels[0].forward {
            Some(idx) => idx,
            None => return false,
        };
        {
            let node = self.node(target);
            if node.score != score || node.member.as_ref() != member {
                return false;
            }
        }

        for i in 0..self.level {
            if self.node(update[i]).levels[i].forward == Some(target) {
                let (t_forward, t_span) = {
                    let t = self.node(target);
                    (t.levels[i].forward, t.levels[i].span)
                };
                let prev = self.node_mut(update[i]);
                prev.levels[i].span += t_span;
                prev.levels[i].span -= 1;
                prev.levels[i].forward = t_forward;
            } else {
                self.node_mut(update[i]).levels[i].span -= 1;
            }
        }

        let (t_backward, t_forward0) = {
            let t = self.node(target);
            (t.backward, t.levels[0].forward)
        };
        match t_forward0 {
            Some(next) => self.node_mut(next).backward = t_backward,
            None => self.tail = t_backward,
        }

        while self.level > 1 && self.node(HEAD).levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.len -= 1;
        self.nodes[target] = None;
        self.free.push(target);
        true
    }

    /// 1-based rank of `(member, score)`, or 0 when absent.
    pub fn rank(&self, member: &[u8], score: f64) -> usize {
        let mut rank = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.node(x).levels[i].forward {
                if !self.precedes(next, score, member) {
                    break;
                }
                rank += self.node(x).levels[i].span;
                x = next;
            }
        }

        match self.node(x).levels[0].forward {
            Some(candidate) => {
                let node = self.node(candidate);
                if node.score == score && node.member.as_ref() == member {
                    rank + 1
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    /// Walks `rank` positions forward of `start`, descending from
    /// `start_level`. `rank` is relative to `start` and 1-based.
    fn element_by_rank_from(&self, start: usize, start_level: usize, rank: usize) -> Option<usize> {
        let mut x = start;
        let mut traversed = 0;
        for i in (0..=start_level).rev() {
            while let Some(next) = self.node(x).levels[i].forward {
                if traversed + self.node(x).levels[i].span > rank {
                    break;
                }
                traversed += self.node(x).levels[i].span;
                x = next;
            }
            if traversed == rank {
                return Some(x);
            }
        }
        None
    }

    /// Whether any element can fall inside `range`.
    fn overlaps(&self, range: &RangeSpec) -> bool {
        if range.min > range.max || (range.min == range.max && (range.min_ex || range.max_ex)) {
            return false;
        }
        let first = match self.node(HEAD).levels[0].forward {
            Some(idx) => idx,
            None => return false,
        };
        if !range.lte_max(self.node(first).score) {
            return false;
        }
        let tail = match self.tail {
            Some(idx) => idx,
            None => return false,
        };
        if !range.gte_min(self.node(tail).score) {
            return false;
        }
        true
    }

    /// Returns the n-th element inside `range`.
    ///
    /// `n >= 0` counts forward from the first in-range element; `n < 0`
    /// counts backward from the last, with `-1` naming the last itself.
    /// Small offsets step pointer by pointer; larger ones jump by rank
    /// from the edge node remembered at the top level.
    pub fn nth_in_range(&self, range: &RangeSpec, n: i64) -> Option<(&[u8], f64)> {
        if !self.overlaps(range) {
            return None;
        }

        let top = self.level - 1;
        let mut x = HEAD;
        let mut edge_rank = 0;
        while let Some(next) = self.node(x).levels[top].forward {
            if range.gte_min(self.node(next).score) {
                break;
            }
            edge_rank += self.node(x).levels[top].span;
            x = next;
        }
        let jump_node = x;
        let jump_rank = edge_rank;

        if n >= 0 {
            let n = n as usize;
            for i in (0..top).rev() {
                while let Some(next) = self.node(x).levels[i].forward {
                    if range.gte_min(self.node(next).score) {
                        break;
                    }
                    edge_rank += self.node(x).levels[i].span;
                    x = next;
                }
            }

            if edge_rank + n >= self.len {
                return None;
            }

            if n < MAX_LINEAR_STEPS {
                for _ in 0..n + 1 {
                    x = self.node(x).levels[0].forward?;
                }
            } else {
                let rank_diff = edge_rank - jump_rank + n + 1;
                x = self.element_by_rank_from(jump_node, top, rank_diff)?;
            }

            let node = self.node(x);
            if !range.lte_max(node.score) {
                return None;
            }
            Some((node.member.as_ref(), node.score))
        } else {
            let back = n.unsigned_abs() as usize;
            for i in (0..=top).rev() {
                while let Some(next) = self.node(x).levels[i].forward {
                    if !range.lte_max(self.node(next).score) {
                        break;
                    }
                    edge_rank += self.node(x).levels[i].span;
                    x = next;
                }
            }

            if edge_rank < back {
                return None;
            }

            if back - 1 < MAX_LINEAR_STEPS {
                for _ in 0..back - 1 {
                    x = self.node(x).backward?;
                }
            } else {
                // The target may sit before the remembered edge node, in
                // which case it is below the lower bound by construction.
                let rank_diff = (edge_rank - back + 1).checked_sub(jump_rank)?;
                x = self.element_by_rank_from(jump_node, top, rank_diff)?;
            }

            let node = self.node(x);
            if !range.gte_min(node.score) {
                return None;
            }
            Some((node.member.as_ref(), node.score))
        }
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> Arc<[u8]> {
        Arc::from(name.as_bytes())
    }

    fn list_of(pairs: &[(&str, f64)]) -> SkipList {
        let mut list = SkipList::new();
        for (name, score) in pairs {
            list.insert(member(name), *score);
        }
        list
    }

    /// Collects `(member, score)` in level-0 order.
    fn elements(list: &SkipList) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::new();
        let mut cursor = list.node(HEAD).levels[0].forward;
        while let Some(idx) = cursor {
            let node = list.node(idx);
            out.push((node.member.to_vec(), node.score));
            cursor = node.levels[0].forward;
        }
        out
    }

    /// Checks every structural invariant the operations must preserve.
    fn audit(list: &SkipList) {
        for i in 0..list.level {
            let mut sum = 0;
            let mut cursor = HEAD;
            loop {
                sum += list.node(cursor).levels[i].span;
                match list.node(cursor).levels[i].forward {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
            assert_eq!(sum, list.len, "span sum at level {} != length", i);
        }

        let mut prev: Option<usize> = None;
        let mut cursor = list.node(HEAD).levels[0].forward;
        let mut count = 0;
        while let Some(idx) = cursor {
            let node = list.node(idx);
            assert_eq!(node.backward, prev, "backward pointer mismatch");
            if let Some(prev_idx) = prev {
                let before = list.node(prev_idx);
                assert!(
                    before.score < node.score
                        || (before.score == node.score && before.member < node.member),
                    "ordering violated"
                );
            }
            prev = Some(idx);
            cursor = node.levels[0].forward;
            count += 1;
        }
        assert_eq!(count, list.len);
        if list.len == 0 {
            assert_eq!(list.tail, None);
        } else {
            assert_eq!(list.tail, prev, "tail is not the rightmost node");
        }
    }

    #[test]
    fn insert_into_empty_list() {
        let list = list_of(&[("a", 1.0)]);
        assert_eq!(list.len(), 1);
        assert_eq!(elements(&list), vec![(b"a".to_vec(), 1.0)]);
        audit(&list);
    }

    #[test]
    fn insert_at_head_tail_and_middle() {
        let mut list = list_of(&[("b", 2.0), ("d", 4.0)]);
        list.insert(member("a"), 1.0);
        list.insert(member("e"), 5.0);
        list.insert(member("c"), 3.0);
        assert_eq!(
            elements(&list)
                .iter()
                .map(|(m, _)| m.clone())
                .collect::<Vec<_>>(),
            vec![
                b"a".to_vec(),
                b"b".to_vec(),
                b"c".to_vec(),
                b"d".to_vec(),
                b"e".to_vec()
            ]
        );
        audit(&list);
    }

    #[test]
    fn equal_scores_order_by_member() {
        let list = list_of(&[("c", 1.0), ("a", 1.0), ("b", 1.0)]);
        assert_eq!(
            elements(&list)
                .iter()
                .map(|(m, _)| m.clone())
                .collect::<Vec<_>>(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        audit(&list);
    }

    #[test]
    fn delete_each_position() {
        let mut list = list_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);

        assert!(list.delete(b"a", 1.0));
        audit(&list);
        assert!(list.delete(b"d", 4.0));
        audit(&list);
        assert!(list.delete(b"b", 2.0));
        audit(&list);
        assert!(list.delete(b"c", 3.0));
        audit(&list);
        assert!(list.is_empty());
    }

    #[test]
    fn delete_requires_exact_pair() {
        let mut list = list_of(&[("a", 1.0)]);
        assert!(!list.delete(b"a", 2.0));
        assert!(!list.delete(b"b", 1.0));
        assert_eq!(list.len(), 1);
        assert!(list.delete(b"a", 1.0));
        assert!(list.is_empty());
    }

    #[test]
    fn delete_on_empty_list() {
        let mut list = SkipList::new();
        assert!(!list.delete(b"a", 1.0));
        audit(&list);
    }

    #[test]
    fn slots_are_recycled() {
        let mut list = list_of(&[("a", 1.0), ("b", 2.0)]);
        let slots_before = list.nodes.len();
        assert!(list.delete(b"a", 1.0));
        list.insert(member("c"), 3.0);
        assert_eq!(list.nodes.len(), slots_before);
        audit(&list);
    }

    #[test]
    fn rank_is_one_based() {
        let list = list_of(&[("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 3.0)]);
        assert_eq!(list.rank(b"a", 1.0), 1);
        assert_eq!(list.rank(b"b", 2.0), 2);
        assert_eq!(list.rank(b"c", 2.0), 3);
        assert_eq!(list.rank(b"d", 3.0), 4);
        assert_eq!(list.rank(b"a", 9.0), 0);
        assert_eq!(list.rank(b"x", 1.0), 0);
    }

    #[test]
    fn invariants_survive_mixed_churn() {
        let mut list = SkipList::new();
        for i in 0..200 {
            list.insert(member(&format!("m{:03}", i)), (i % 50) as f64);
            if i % 3 == 0 {
                audit(&list);
            }
        }
        for i in (0..200).step_by(2) {
            assert!(list.delete(format!("m{:03}", i).as_bytes(), (i % 50) as f64));
        }
        audit(&list);
        assert_eq!(list.len(), 100);
    }

    #[test]
    fn nth_in_range_forward_offsets() {
        let list = list_of(&[
            ("a", 1.0),
            ("b", 2.0),
            ("c", 3.0),
            ("d", 4.0),
            ("e", 5.0),
        ]);
        let range = RangeSpec::inclusive(2.0, 4.0);

        assert_eq!(list.nth_in_range(&range, 0), Some((&b"b"[..], 2.0)));
        assert_eq!(list.nth_in_range(&range, 1), Some((&b"c"[..], 3.0)));
        assert_eq!(list.nth_in_range(&range, 2), Some((&b"d"[..], 4.0)));
        // offset walks past the upper bound
        assert_eq!(list.nth_in_range(&range, 3), None);
        // offset walks past the whole list
        assert_eq!(list.nth_in_range(&range, 10), None);
    }

    #[test]
    fn nth_in_range_backward_offsets() {
        let list = list_of(&[
            ("a", 1.0),
            ("b", 2.0),
            ("c", 3.0),
            ("d", 4.0),
            ("e", 5.0),
        ]);
        let range = RangeSpec::inclusive(2.0, 4.0);

        assert_eq!(list.nth_in_range(&range, -1), Some((&b"d"[..], 4.0)));
        assert_eq!(list.nth_in_range(&range, -2), Some((&b"c"[..], 3.0)));
        assert_eq!(list.nth_in_range(&range, -3), Some((&b"b"[..], 2.0)));
        // steps below the lower bound
        assert_eq!(list.nth_in_range(&range, -4), None);
        assert_eq!(list.nth_in_range(&range, -10), None);
    }

    #[test]
    fn nth_in_range_exclusive_bounds() {
        let list = list_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let range = RangeSpec {
            min: 1.0,
            max: 3.0,
            min_ex: true,
            max_ex: true,
        };
        assert_eq!(list.nth_in_range(&range, 0), Some((&b"b"[..], 2.0)));
        assert_eq!(list.nth_in_range(&range, -1), Some((&b"b"[..], 2.0)));
        assert_eq!(list.nth_in_range(&range, 1), None);
    }

    #[test]
    fn nth_in_range_rejects_impossible_ranges() {
        let list = list_of(&[("a", 1.0), ("b", 2.0)]);

        // min above max
        assert_eq!(
            list.nth_in_range(&RangeSpec::inclusive(3.0, 1.0), 0),
            None
        );
        // empty point range with an exclusive end
        let point = RangeSpec {
            min: 2.0,
            max: 2.0,
            min_ex: false,
            max_ex: true,
        };
        assert_eq!(list.nth_in_range(&point, 0), None);
        // disjoint above and below
        assert_eq!(
            list.nth_in_range(&RangeSpec::inclusive(5.0, 9.0), 0),
            None
        );
        assert_eq!(
            list.nth_in_range(&RangeSpec::inclusive(-3.0, 0.0), 0),
            None
        );
        // empty list never overlaps
        let empty = SkipList::new();
        assert_eq!(
            empty.nth_in_range(&RangeSpec::inclusive(0.0, 10.0), 0),
            None
        );
    }

    #[test]
    fn nth_in_range_point_range() {
        let list = list_of(&[("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 3.0)]);
        let point = RangeSpec::inclusive(2.0, 2.0);
        assert_eq!(list.nth_in_range(&point, 0), Some((&b"b"[..], 2.0)));
        assert_eq!(list.nth_in_range(&point, -1), Some((&b"c"[..], 2.0)));
    }

    #[test]
    fn large_offsets_take_the_rank_jump_path() {
        let mut list = SkipList::new();
        for i in 0..64 {
            list.insert(member(&format!("m{:02}", i)), i as f64);
        }
        let range = RangeSpec::inclusive(10.0, 60.0);

        // both offsets exceed the linear-walk cutoff
        assert_eq!(
            list.nth_in_range(&range, 25),
            Some((&b"m35"[..], 35.0))
        );
        assert_eq!(
            list.nth_in_range(&range, -20),
            Some((&b"m41"[..], 41.0))
        );
        // agreement between the linear and jump paths at the cutoff edge
        assert_eq!(list.nth_in_range(&range, 9), Some((&b"m19"[..], 19.0)));
        assert_eq!(list.nth_in_range(&range, 10), Some((&b"m20"[..], 20.0)));
    }

    #[test]
    fn nth_in_range_straddling_bounds() {
        let list = list_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);

        // range reaches below the least score
        let low = RangeSpec::inclusive(-5.0, 2.0);
        assert_eq!(list.nth_in_range(&low, 0), Some((&b"a"[..], 1.0)));
        assert_eq!(list.nth_in_range(&low, -1), Some((&b"b"[..], 2.0)));

        // range reaches above the greatest score
        let high = RangeSpec::inclusive(2.0, 50.0);
        assert_eq!(list.nth_in_range(&high, 0), Some((&b"b"[..], 2.0)));
        assert_eq!(list.nth_in_range(&high, -1), Some((&b"c"[..], 3.0)));
    }
}
