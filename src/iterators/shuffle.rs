//! Randomized iteration: full shuffle and chunked (rotated) shuffle

use super::ordering::{sort_programs, Direction, SlotOrder};
use super::{reorder_by_ids, IterationState, IteratorSnapshot, PoolTag, ProgramIterator};
use crate::models::{ContentProgram, SlotProgram};
use crate::random::SeededRng;

// ============================================================================
// Shuffle
// ============================================================================

/// Random permutation of the pool.
///
/// On wraparound the list is split at its midpoint and each half is shuffled
/// on its own, so items played at the end of a cycle cannot reappear at the
/// start of the next one.
#[derive(Debug, Clone)]
pub struct ShuffleIterator {
    programs: Vec<ContentProgram>,
    position: usize,
    tag: PoolTag,
}

impl ShuffleIterator {
    pub fn new(mut programs: Vec<ContentProgram>, tag: PoolTag, rng: &mut SeededRng) -> Self {
        rng.shuffle(&mut programs);
        Self {
            programs,
            position: 0,
            tag,
        }
    }

    /// Rebuild from a persisted permutation; `None` if it does not match the pool
    pub fn from_order(programs: &[ContentProgram], ids: &[String], tag: PoolTag) -> Option<Self> {
        let programs = reorder_by_ids(programs, ids)?;
        Some(Self {
            programs,
            position: 0,
            tag,
        })
    }

    pub(crate) fn restore_position(&mut self, position: usize) {
        if !self.programs.is_empty() {
            self.position = position % self.programs.len();
        }
    }
}

impl ProgramIterator for ShuffleIterator {
    fn current(&mut self, _state: &IterationState, _rng: &mut SeededRng) -> Option<SlotProgram> {
        self.programs.get(self.position).map(|p| self.tag.wrap(p))
    }

    fn next(&mut self, rng: &mut SeededRng) {
        let n = self.programs.len();
        if n == 0 {
            return;
        }

        self.position += 1;
        if self.position >= n {
            let mid = n / 2;
            rng.shuffle_range(&mut self.programs, 0, mid);
            rng.shuffle_range(&mut self.programs, mid, n);
            self.position = 0;
        }
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn len(&self) -> usize {
        self.programs.len()
    }

    fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot {
            position: self.position,
            order: Some(self.programs.iter().map(|p| p.id.clone()).collect()),
        }
    }

    fn restore(&mut self, snapshot: &IteratorSnapshot) -> bool {
        if let Some(ids) = &snapshot.order {
            match reorder_by_ids(&self.programs, ids) {
                Some(programs) => self.programs = programs,
                None => return false,
            }
        }
        self.restore_position(snapshot.position);
        true
    }
}

// ============================================================================
// Chunked Shuffle
// ============================================================================

/// Sorted by the natural key, then rotated by a random offset.
///
/// Local order is preserved; only the starting point is random.
#[derive(Debug, Clone)]
pub struct ChunkedShuffleIterator {
    programs: Vec<ContentProgram>,
    position: usize,
    tag: PoolTag,
}

impl ChunkedShuffleIterator {
    pub fn new(
        mut programs: Vec<ContentProgram>,
        direction: Direction,
        tag: PoolTag,
        rng: &mut SeededRng,
    ) -> Self {
        sort_programs(&mut programs, SlotOrder::OrderedShuffle, direction);
        if !programs.is_empty() {
            let offset = rng.integer(0, programs.len() as i64 - 1) as usize;
            programs.rotate_left(offset);
        }
        Self {
            programs,
            position: 0,
            tag,
        }
    }

    /// Rebuild from a persisted rotation; `None` if it does not match the pool
    pub fn from_order(programs: &[ContentProgram], ids: &[String], tag: PoolTag) -> Option<Self> {
        let programs = reorder_by_ids(programs, ids)?;
        Some(Self {
            programs,
            position: 0,
            tag,
        })
    }

    pub(crate) fn restore_position(&mut self, position: usize) {
        if !self.programs.is_empty() {
            self.position = position % self.programs.len();
        }
    }
}

impl ProgramIterator for ChunkedShuffleIterator {
    fn current(&mut self, _state: &IterationState, _rng: &mut SeededRng) -> Option<SlotProgram> {
        self.programs.get(self.position).map(|p| self.tag.wrap(p))
    }

    fn next(&mut self, _rng: &mut SeededRng) {
        if !self.programs.is_empty() {
            self.position = (self.position + 1) % self.programs.len();
        }
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn len(&self) -> usize {
        self.programs.len()
    }

    fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot {
            position: self.position,
            order: Some(self.programs.iter().map(|p| p.id.clone()).collect()),
        }
    }

    fn restore(&mut self, snapshot: &IteratorSnapshot) -> bool {
        if let Some(ids) = &snapshot.order {
            match reorder_by_ids(&self.programs, ids) {
                Some(programs) => self.programs = programs,
                None => return false,
            }
        }
        self.restore_position(snapshot.position);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MINUTE_MS;
    use std::collections::HashSet;

    fn pool(n: u32) -> Vec<ContentProgram> {
        (1..=n)
            .map(|i| ContentProgram::episode(format!("e{i}"), "s", 1, i, 20 * MINUTE_MS))
            .collect()
    }

    fn drain(iter: &mut dyn ProgramIterator, rng: &mut SeededRng, n: usize) -> Vec<String> {
        let state = IterationState::default();
        (0..n)
            .map(|_| {
                let id = iter.current(&state, rng).unwrap().program().unwrap().id.clone();
                iter.next(rng);
                id
            })
            .collect()
    }

    #[test]
    fn test_shuffle_visits_every_item_per_cycle() {
        let mut rng = SeededRng::from_seed(&[10]);
        let mut iter = ShuffleIterator::new(pool(12), PoolTag::Content, &mut rng);

        for _ in 0..3 {
            let cycle: HashSet<String> = drain(&mut iter, &mut rng, 12).into_iter().collect();
            assert_eq!(cycle.len(), 12);
        }
    }

    #[test]
    fn test_shuffle_wraparound_keeps_halves() {
        let mut rng = SeededRng::from_seed(&[11]);
        let mut iter = ShuffleIterator::new(pool(10), PoolTag::Content, &mut rng);

        let first = drain(&mut iter, &mut rng, 10);
        let second = drain(&mut iter, &mut rng, 10);

        let first_tail: HashSet<&String> = first[5..].iter().collect();
        let second_head: HashSet<&String> = second[..5].iter().collect();
        assert!(first_tail.is_disjoint(&second_head));
    }

    #[test]
    fn test_shuffle_is_seed_deterministic() {
        let mut a_rng = SeededRng::from_seed(&[12]);
        let mut b_rng = SeededRng::from_seed(&[12]);
        let mut a = ShuffleIterator::new(pool(9), PoolTag::Content, &mut a_rng);
        let mut b = ShuffleIterator::new(pool(9), PoolTag::Content, &mut b_rng);
        assert_eq!(drain(&mut a, &mut a_rng, 30), drain(&mut b, &mut b_rng, 30));
    }

    #[test]
    fn test_shuffle_restore_rejects_foreign_order() {
        let mut rng = SeededRng::from_seed(&[13]);
        let mut iter = ShuffleIterator::new(pool(4), PoolTag::Content, &mut rng);
        let foreign = IteratorSnapshot {
            position: 1,
            order: Some(vec!["x".into(), "y".into(), "z".into(), "w".into()]),
        };
        assert!(!iter.restore(&foreign));
    }

    #[test]
    fn test_chunked_preserves_local_order() {
        let mut rng = SeededRng::from_seed(&[14]);
        let mut iter = ChunkedShuffleIterator::new(pool(8), Direction::Asc, PoolTag::Content, &mut rng);
        let seen = drain(&mut iter, &mut rng, 8);

        // Consecutive items follow episode order modulo the rotation
        for window in seen.windows(2) {
            let a: u32 = window[0][1..].parse().unwrap();
            let b: u32 = window[1][1..].parse().unwrap();
            assert!(b == a + 1 || (a == 8 && b == 1));
        }
    }

    #[test]
    fn test_chunked_next_draws_nothing() {
        let mut rng = SeededRng::from_seed(&[15]);
        let mut iter = ChunkedShuffleIterator::new(pool(5), Direction::Asc, PoolTag::Content, &mut rng);
        let used = rng.use_count();
        drain(&mut iter, &mut rng, 20);
        assert_eq!(rng.use_count(), used);
    }
}
