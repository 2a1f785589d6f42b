//! Program iteration strategies
//!
//! A [`ProgramIterator`] produces "the next item" from a fixed pool. The
//! schedulers peek with [`ProgramIterator::current`], decide whether the item
//! fits, and only then call [`ProgramIterator::next`] to consume it.
//!
//! # Strategies
//!
//! - [`OrderedIterator`] - sorted once by a key (`next`, `alphanumeric`,
//!   `chronological`), wraps modulo pool size
//! - [`ShuffleIterator`] - random permutation, halves reshuffled on wraparound
//! - [`ChunkedShuffleIterator`] - sorted, then rotated by a random offset
//! - [`WeightedFillerIterator`] - duration/recency weighted draw for filler
//! - [`StaticIterator`] / [`FlexIterator`] - fixed redirect or stretching flex
//!
//! Iterators never own a random source. The caller threads its
//! [`SeededRng`] through every call, so a run's randomness is fully
//! determined by that one stream.

pub mod fixed;
pub mod ordered;
pub mod ordering;
pub mod shuffle;
pub mod weighted;

use serde::{Deserialize, Serialize};

use crate::models::{ContentProgram, SlotProgram};
use crate::random::SeededRng;

pub use fixed::{FlexIterator, StaticIterator};
pub use ordered::OrderedIterator;
pub use ordering::{sort_programs, Direction, SlotOrder};
pub use shuffle::{ChunkedShuffleIterator, ShuffleIterator};
pub use weighted::{DurationWeighting, WeightPreference, WeightedFillerIterator, WeightedProgram};

/// Ephemeral context passed into every `current` call; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IterationState {
    /// Time still available for the item being requested
    pub slot_duration_ms: i64,
    /// Position of the schedule cursor
    pub time_cursor_ms: i64,
}

impl IterationState {
    pub fn new(slot_duration_ms: i64, time_cursor_ms: i64) -> Self {
        Self {
            slot_duration_ms,
            time_cursor_ms,
        }
    }
}

/// Persistable iterator position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorSnapshot {
    pub position: usize,
    /// Materialized order of program ids (shuffle-style iterators only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
}

/// Strategy producing the next item from a fixed pool
pub trait ProgramIterator: Send {
    /// Peek at the current item.
    ///
    /// Repeated calls with the same `state` and no `next()` in between
    /// return the same result.
    fn current(&mut self, state: &IterationState, rng: &mut SeededRng) -> Option<SlotProgram>;

    /// Advance past the current item
    fn next(&mut self, rng: &mut SeededRng);

    /// Return to the first position
    fn reset(&mut self);

    /// Number of distinct items in the pool
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture the position for persistence
    fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot::default()
    }

    /// Restore a previously captured position.
    ///
    /// Returns `false` when the snapshot does not match the current pool and
    /// was ignored.
    fn restore(&mut self, _snapshot: &IteratorSnapshot) -> bool {
        true
    }
}

/// How content pulled from a pool is tagged when handed to a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolTag {
    Content,
    CustomShow(String),
    Filler(String),
}

impl PoolTag {
    /// Wrap a catalog program into what the slot yields
    pub fn wrap(&self, program: &ContentProgram) -> SlotProgram {
        match self {
            Self::Content => SlotProgram::Content {
                program: program.clone(),
            },
            Self::CustomShow(id) => SlotProgram::CustomShow {
                custom_show_id: id.clone(),
                program: program.clone(),
            },
            Self::Filler(id) => SlotProgram::Filler {
                list_id: id.clone(),
                program: program.clone(),
            },
        }
    }
}

/// Build the iterator for a content pool
///
/// Consumes draws from `rng` for the shuffle-style orders.
pub fn build_content_iterator(
    programs: Vec<ContentProgram>,
    order: SlotOrder,
    direction: Direction,
    tag: PoolTag,
    rng: &mut SeededRng,
) -> Box<dyn ProgramIterator> {
    match order {
        SlotOrder::Shuffle => Box::new(ShuffleIterator::new(programs, tag, rng)),
        SlotOrder::OrderedShuffle => {
            Box::new(ChunkedShuffleIterator::new(programs, direction, tag, rng))
        }
        SlotOrder::Next | SlotOrder::Alphanumeric | SlotOrder::Chronological => {
            Box::new(OrderedIterator::new(programs, order, direction, tag))
        }
    }
}

/// Rebuild an iterator from a persisted snapshot.
///
/// When the snapshot carries an order matching the pool it is reused without
/// touching `rng`; otherwise the iterator is built fresh (consuming draws)
/// and only the position is carried over.
pub fn restore_content_iterator(
    programs: Vec<ContentProgram>,
    order: SlotOrder,
    direction: Direction,
    tag: PoolTag,
    snapshot: &IteratorSnapshot,
    rng: &mut SeededRng,
) -> Box<dyn ProgramIterator> {
    let persisted = snapshot.order.as_deref();
    match order {
        SlotOrder::Shuffle => {
            if let Some(mut iter) = persisted
                .and_then(|ids| ShuffleIterator::from_order(&programs, ids, tag.clone()))
            {
                iter.restore(snapshot);
                return Box::new(iter);
            }
            let mut iter = ShuffleIterator::new(programs, tag, rng);
            iter.restore_position(snapshot.position);
            Box::new(iter)
        }
        SlotOrder::OrderedShuffle => {
            if let Some(mut iter) = persisted
                .and_then(|ids| ChunkedShuffleIterator::from_order(&programs, ids, tag.clone()))
            {
                iter.restore(snapshot);
                return Box::new(iter);
            }
            let mut iter = ChunkedShuffleIterator::new(programs, direction, tag, rng);
            iter.restore_position(snapshot.position);
            Box::new(iter)
        }
        SlotOrder::Next | SlotOrder::Alphanumeric | SlotOrder::Chronological => {
            let mut iter = OrderedIterator::new(programs, order, direction, tag);
            iter.restore(snapshot);
            Box::new(iter)
        }
    }
}

/// Reorder `programs` to follow `ids`; `None` unless `ids` is a permutation
/// of the pool
pub(crate) fn reorder_by_ids(programs: &[ContentProgram], ids: &[String]) -> Option<Vec<ContentProgram>> {
    if ids.len() != programs.len() {
        return None;
    }

    let by_id: std::collections::HashMap<&str, &ContentProgram> =
        programs.iter().map(|p| (p.id.as_str(), p)).collect();
    if by_id.len() != programs.len() {
        return None;
    }

    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return None;
        }
        ordered.push((*by_id.get(id.as_str())?).clone());
    }
    Some(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MINUTE_MS;

    fn pool(n: usize) -> Vec<ContentProgram> {
        (0..n)
            .map(|i| ContentProgram::episode(format!("ep{i}"), "show", 1, i as u32 + 1, 20 * MINUTE_MS))
            .collect()
    }

    fn ids(iter: &mut dyn ProgramIterator, rng: &mut SeededRng, n: usize) -> Vec<String> {
        let state = IterationState::new(60 * MINUTE_MS, 0);
        let mut out = Vec::new();
        for _ in 0..n {
            let item = iter.current(&state, rng).unwrap();
            out.push(item.program().unwrap().id.clone());
            iter.next(rng);
        }
        out
    }

    #[test]
    fn test_reorder_by_ids() {
        let programs = pool(3);
        let ids = vec!["ep2".to_string(), "ep0".to_string(), "ep1".to_string()];
        let ordered = reorder_by_ids(&programs, &ids).unwrap();
        assert_eq!(ordered[0].id, "ep2");

        // Size mismatch invalidates the order
        assert!(reorder_by_ids(&programs, &ids[..2]).is_none());
        // Unknown id invalidates the order
        let bad = vec!["ep2".to_string(), "ep0".to_string(), "zzz".to_string()];
        assert!(reorder_by_ids(&programs, &bad).is_none());
        // Duplicates invalidate the order
        let dup = vec!["ep2".to_string(), "ep2".to_string(), "ep1".to_string()];
        assert!(reorder_by_ids(&programs, &dup).is_none());
    }

    #[test]
    fn test_restore_shuffle_without_draws() {
        let mut rng = SeededRng::from_seed(&[1, 2]);
        let mut original =
            build_content_iterator(pool(8), SlotOrder::Shuffle, Direction::Asc, PoolTag::Content, &mut rng);
        let _ = ids(original.as_mut(), &mut rng, 3);
        let snapshot = original.snapshot();
        let expected = ids(original.as_mut(), &mut rng, 4);

        let mut fresh_rng = SeededRng::from_seed(&[99]);
        let mut restored = restore_content_iterator(
            pool(8),
            SlotOrder::Shuffle,
            Direction::Asc,
            PoolTag::Content,
            &snapshot,
            &mut fresh_rng,
        );
        assert_eq!(fresh_rng.use_count(), 0);
        assert_eq!(ids(restored.as_mut(), &mut fresh_rng, 4), expected);
    }

    #[test]
    fn test_restore_with_changed_pool_regenerates() {
        let mut rng = SeededRng::from_seed(&[3]);
        let original =
            build_content_iterator(pool(8), SlotOrder::Shuffle, Direction::Asc, PoolTag::Content, &mut rng);
        let snapshot = original.snapshot();

        let mut rng2 = SeededRng::from_seed(&[4]);
        let restored = restore_content_iterator(
            pool(9),
            SlotOrder::Shuffle,
            Direction::Asc,
            PoolTag::Content,
            &snapshot,
            &mut rng2,
        );
        assert!(rng2.use_count() > 0);
        assert_eq!(restored.len(), 9);
        assert_eq!(restored.snapshot().order.unwrap().len(), 9);
    }

    #[test]
    fn test_pool_tag_wrap() {
        let program = ContentProgram::movie("m", "M", MINUTE_MS);
        let wrapped = PoolTag::Filler("list".into()).wrap(&program);
        assert!(matches!(wrapped, SlotProgram::Filler { ref list_id, .. } if list_id == "list"));
    }
}
