//! Duration/recency weighted selection for filler pools
//!
//! Each item carries a static weight derived from its duration and a
//! `current_weight` that decays when the item is drawn and recovers toward
//! the static weight on every `next()`. Items that do not fit the requested
//! window, or that were drawn within the last window of simulated time, are
//! excluded from the draw.

use serde::{Deserialize, Serialize};

use super::{IterationState, IteratorSnapshot, PoolTag, ProgramIterator};
use crate::models::{ContentProgram, SlotProgram, MINUTE_MS};
use crate::random::SeededRng;

/// Multiplier applied to an item's weight when it is drawn
pub const DECAY_FACTOR: f64 = 0.5;

/// Fraction of the lost weight recovered on every `next()`
pub const RECOVERY_FACTOR: f64 = 0.25;

/// Smallest weight an item can carry so it stays drawable
const MIN_WEIGHT: f64 = 1e-6;

/// How duration maps onto the static weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationWeighting {
    #[default]
    Linear,
    Log,
}

/// Which end of the duration range is favored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreference {
    /// Every item weighs the same
    #[default]
    Uniform,
    PreferShort,
    PreferLong,
}

/// Program with its static and decayed weights
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedProgram {
    pub program: ContentProgram,
    pub original_weight: f64,
    pub current_weight: f64,
    last_drawn_at: Option<i64>,
}

impl WeightedProgram {
    fn new(program: ContentProgram, weight: f64) -> Self {
        Self {
            program,
            original_weight: weight,
            current_weight: weight,
            last_drawn_at: None,
        }
    }

    fn recover(&mut self) {
        self.current_weight += (self.original_weight - self.current_weight) * RECOVERY_FACTOR;
        if self.current_weight > self.original_weight {
            self.current_weight = self.original_weight;
        }
    }
}

/// Static weight for a program of `duration_ms`
pub fn duration_weight(
    duration_ms: i64,
    weighting: DurationWeighting,
    preference: WeightPreference,
) -> f64 {
    if preference == WeightPreference::Uniform {
        return 1.0;
    }

    let minutes = duration_ms.max(0) as f64 / MINUTE_MS as f64;
    let base = match weighting {
        DurationWeighting::Linear => minutes,
        DurationWeighting::Log => (1.0 + minutes).ln(),
    }
    .max(MIN_WEIGHT);

    match preference {
        WeightPreference::PreferLong => base,
        WeightPreference::PreferShort => 1.0 / base,
        WeightPreference::Uniform => 1.0,
    }
}

/// Weighted draw over a filler pool
#[derive(Debug, Clone)]
pub struct WeightedFillerIterator {
    items: Vec<WeightedProgram>,
    tag: PoolTag,
    /// Last draw, keyed by the state it was drawn for
    cached: Option<(IterationState, Option<usize>)>,
}

impl WeightedFillerIterator {
    pub fn new(
        programs: Vec<ContentProgram>,
        weighting: DurationWeighting,
        preference: WeightPreference,
        tag: PoolTag,
    ) -> Self {
        let items = programs
            .into_iter()
            .map(|p| {
                let weight = duration_weight(p.duration_ms, weighting, preference);
                WeightedProgram::new(p, weight)
            })
            .collect();

        Self {
            items,
            tag,
            cached: None,
        }
    }

    /// Current weights, in pool order
    pub fn items(&self) -> &[WeightedProgram] {
        &self.items
    }

    fn is_candidate(item: &WeightedProgram, state: &IterationState) -> bool {
        if item.program.duration_ms > state.slot_duration_ms {
            return false;
        }
        match item.last_drawn_at {
            Some(at) => at + state.slot_duration_ms <= state.time_cursor_ms,
            None => true,
        }
    }

    fn draw(&mut self, state: &IterationState, rng: &mut SeededRng) -> Option<usize> {
        let mut cumulative: Vec<(usize, f64)> = Vec::new();
        let mut sum = 0.0;
        for (idx, item) in self.items.iter().enumerate() {
            if Self::is_candidate(item, state) {
                sum += item.current_weight;
                cumulative.push((idx, sum));
            }
        }

        if cumulative.is_empty() {
            return None;
        }

        let target = rng.real(0.0, sum);
        let picked = cumulative
            .iter()
            .find(|(_, acc)| *acc > target)
            .or_else(|| cumulative.last())
            .map(|(idx, _)| *idx)?;

        let item = &mut self.items[picked];
        item.current_weight = (item.current_weight * DECAY_FACTOR).max(MIN_WEIGHT);
        item.last_drawn_at = Some(state.time_cursor_ms);
        Some(picked)
    }
}

impl ProgramIterator for WeightedFillerIterator {
    fn current(&mut self, state: &IterationState, rng: &mut SeededRng) -> Option<SlotProgram> {
        if let Some((cached_state, picked)) = self.cached {
            if cached_state == *state {
                return picked.map(|idx| self.tag.wrap(&self.items[idx].program));
            }
        }

        let picked = self.draw(state, rng);
        self.cached = Some((*state, picked));
        picked.map(|idx| self.tag.wrap(&self.items[idx].program))
    }

    fn next(&mut self, _rng: &mut SeededRng) {
        self.cached = None;
        for item in &mut self.items {
            item.recover();
        }
    }

    fn reset(&mut self) {
        self.cached = None;
        for item in &mut self.items {
            item.current_weight = item.original_weight;
            item.last_drawn_at = None;
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    /// Nothing is captured: decayed weights and draw times live only for one
    /// generation run, and a restored iterator starts from the static weights.
    fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(id: &str, minutes: i64) -> ContentProgram {
        ContentProgram::new(id, id, crate::models::ProgramKind::OtherVideo, minutes * MINUTE_MS)
    }

    fn iter(preference: WeightPreference) -> WeightedFillerIterator {
        WeightedFillerIterator::new(
            vec![filler("short", 1), filler("mid", 3), filler("long", 10)],
            DurationWeighting::Linear,
            preference,
            PoolTag::Filler("list".into()),
        )
    }

    #[test]
    fn test_duration_weight() {
        assert_eq!(
            duration_weight(5 * MINUTE_MS, DurationWeighting::Linear, WeightPreference::Uniform),
            1.0
        );
        assert_eq!(
            duration_weight(5 * MINUTE_MS, DurationWeighting::Linear, WeightPreference::PreferLong),
            5.0
        );
        assert!((duration_weight(4 * MINUTE_MS, DurationWeighting::Linear, WeightPreference::PreferShort) - 0.25).abs() < 1e-9);

        let log = duration_weight(10 * MINUTE_MS, DurationWeighting::Log, WeightPreference::PreferLong);
        assert!((log - 11f64.ln()).abs() < 1e-9);

        // Zero-length items stay drawable
        assert!(duration_weight(0, DurationWeighting::Linear, WeightPreference::PreferLong) > 0.0);
    }

    #[test]
    fn test_only_fitting_items_drawn() {
        let mut rng = SeededRng::from_seed(&[20]);
        let mut it = iter(WeightPreference::PreferLong);

        for i in 0..50 {
            let state = IterationState::new(2 * MINUTE_MS, i * 10 * MINUTE_MS);
            let pick = it.current(&state, &mut rng).unwrap();
            assert_eq!(pick.program().unwrap().id, "short");
            it.next(&mut rng);
        }
    }

    #[test]
    fn test_current_is_idempotent_for_same_state() {
        let mut rng = SeededRng::from_seed(&[21]);
        let mut it = iter(WeightPreference::Uniform);
        let state = IterationState::new(30 * MINUTE_MS, 0);

        let first = it.current(&state, &mut rng);
        let used = rng.use_count();
        let second = it.current(&state, &mut rng);
        assert_eq!(first, second);
        assert_eq!(rng.use_count(), used);
    }

    #[test]
    fn test_recently_drawn_excluded() {
        let mut rng = SeededRng::from_seed(&[22]);
        let mut it = WeightedFillerIterator::new(
            vec![filler("only", 1)],
            DurationWeighting::Linear,
            WeightPreference::Uniform,
            PoolTag::Filler("l".into()),
        );

        let window = 10 * MINUTE_MS;
        assert!(it.current(&IterationState::new(window, 0), &mut rng).is_some());
        it.next(&mut rng);

        // Still inside the window of the last draw
        assert!(it.current(&IterationState::new(window, 5 * MINUTE_MS), &mut rng).is_none());
        it.next(&mut rng);

        // Window elapsed
        assert!(it.current(&IterationState::new(window, 10 * MINUTE_MS), &mut rng).is_some());
    }

    #[test]
    fn test_decay_and_recovery() {
        let mut rng = SeededRng::from_seed(&[23]);
        let mut it = WeightedFillerIterator::new(
            vec![filler("a", 2)],
            DurationWeighting::Linear,
            WeightPreference::PreferLong,
            PoolTag::Filler("l".into()),
        );

        it.current(&IterationState::new(5 * MINUTE_MS, 0), &mut rng);
        assert!((it.items()[0].current_weight - 1.0).abs() < 1e-9);

        it.next(&mut rng);
        // 1.0 + (2.0 - 1.0) * 0.25
        assert!((it.items()[0].current_weight - 1.25).abs() < 1e-9);

        for _ in 0..100 {
            it.next(&mut rng);
        }
        assert!(it.items()[0].current_weight <= it.items()[0].original_weight);
        assert!((it.items()[0].current_weight - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_preference_shifts_distribution() {
        let mut rng = SeededRng::from_seed(&[24]);
        let mut it = iter(WeightPreference::PreferShort);
        let mut short = 0;
        for i in 0..400 {
            let state = IterationState::new(60 * MINUTE_MS, i * 120 * MINUTE_MS);
            if it.current(&state, &mut rng).unwrap().program().unwrap().id == "short" {
                short += 1;
            }
            it.next(&mut rng);
        }
        // short carries 1.0 of 1.0 + 0.33 + 0.1 static weight
        assert!(short > 200);
    }

    #[test]
    fn test_restore_starts_from_static_weights() {
        let mut rng = SeededRng::from_seed(&[26]);
        let mut it = iter(WeightPreference::PreferLong);
        let state = IterationState::new(60 * MINUTE_MS, 0);
        it.current(&state, &mut rng);
        it.next(&mut rng);
        assert!(it.items().iter().any(|i| i.current_weight < i.original_weight));

        let snapshot = it.snapshot();
        assert_eq!(snapshot, IteratorSnapshot::default());
        let mut restored = iter(WeightPreference::PreferLong);
        assert!(restored.restore(&snapshot));
        assert!(restored
            .items()
            .iter()
            .all(|i| (i.current_weight - i.original_weight).abs() < 1e-12));
    }

    #[test]
    fn test_reset_restores_weights() {
        let mut rng = SeededRng::from_seed(&[25]);
        let mut it = iter(WeightPreference::PreferLong);
        it.current(&IterationState::new(60 * MINUTE_MS, 0), &mut rng);
        it.reset();
        assert!(it
            .items()
            .iter()
            .all(|i| (i.current_weight - i.original_weight).abs() < 1e-12));
    }
}
