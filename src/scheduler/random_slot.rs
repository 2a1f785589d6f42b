//! Weighted-random floating-slot scheduling
//!
//! At every step the cursor is aligned to the pad multiple, one slot is
//! chosen among those not in cooldown, and that slot plays a run of either
//! a fixed duration or a fixed number of programs. When every slot is in
//! cooldown the cursor waits with flex until the first one becomes eligible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::SchedulerResult;
use super::lineup::{Lineup, LineupBuilder};
use super::run::{build_run, ceil_to_pad, pad_amount, FlexPreference, PadStyle, RunLimit, RunParams};
use super::validation::{validate_random_slot_schedule, validate_slot_pools};
use super::RunOptions;
use crate::models::{DAY_MS, MINUTE_MS, SLACK_MS};
use crate::pool::ProgramPool;
use crate::random::SeededRng;
use crate::slots::{build_slots, RandomSlot, SlotDuration};

/// Flex emitted for a run that produced nothing and has no pad to fall back on
const EMPTY_RUN_MS: i64 = 30 * MINUTE_MS;

/// How the next slot is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomDistribution {
    /// Every eligible slot equally likely
    Uniform,
    /// Proportional to slot weight
    #[default]
    Weighted,
    /// Round-robin in declaration order
    None,
}

fn default_max_days() -> u32 {
    1
}

/// Random-slot schedule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSlotSchedule {
    pub slots: Vec<RandomSlot>,
    #[serde(default)]
    pub pad_ms: i64,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    #[serde(default)]
    pub distribution: RandomDistribution,
    #[serde(default)]
    pub flex_preference: FlexPreference,
    #[serde(default)]
    pub pad_style: PadStyle,
}

impl RandomSlotSchedule {
    pub fn new(slots: Vec<RandomSlot>) -> Self {
        Self {
            slots,
            pad_ms: 0,
            max_days: default_max_days(),
            distribution: RandomDistribution::Weighted,
            flex_preference: FlexPreference::Distribute,
            pad_style: PadStyle::Episode,
        }
    }

    pub fn with_pad(mut self, pad_ms: i64) -> Self {
        self.pad_ms = pad_ms;
        self
    }

    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days;
        self
    }

    pub fn with_distribution(mut self, distribution: RandomDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_pad_style(mut self, pad_style: PadStyle) -> Self {
        self.pad_style = pad_style;
        self
    }

    pub fn with_flex_preference(mut self, flex_preference: FlexPreference) -> Self {
        self.flex_preference = flex_preference;
        self
    }
}

// ============================================================================
// Slot Selection
// ============================================================================

/// A slot competing for the next selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub weight: f64,
    /// Earliest cursor at which the slot is out of cooldown
    pub eligible_at: i64,
}

impl Candidate {
    pub(crate) fn new(weight: f64, last_start: Option<i64>, cooldown_ms: i64) -> Self {
        Self {
            weight,
            eligible_at: eligible_at(last_start, cooldown_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Chosen(usize),
    /// Nothing eligible; the first slot frees up after this long
    Wait(i64),
}

pub(crate) fn eligible_at(last_start: Option<i64>, cooldown_ms: i64) -> i64 {
    match last_start {
        Some(last) if cooldown_ms > 0 => last + cooldown_ms - SLACK_MS,
        _ => i64::MIN,
    }
}

/// Incremental weighted draw over the eligible candidates.
///
/// Each eligible slot adds its weight to the running total and replaces the
/// current pick with probability `weight / total`, which leaves every slot
/// chosen with probability proportional to its weight.
/// Only eligible slots add to the total, so a slot in cooldown does not
/// dilute the shares of the others.
pub(crate) fn select_weighted(
    candidates: &[Candidate],
    cursor: i64,
    uniform: bool,
    rng: &mut SeededRng,
) -> Selection {
    let mut total = 0.0;
    let mut chosen = None;
    let mut first_eligible = None;
    let mut wait: Option<i64> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.eligible_at <= cursor {
            first_eligible.get_or_insert(idx);
            let weight = if uniform { 1.0 } else { candidate.weight.max(0.0) };
            total += weight;
            if rng.bool(weight, total) {
                chosen = Some(idx);
            }
        } else {
            let w = candidate.eligible_at - cursor;
            wait = Some(wait.map_or(w, |cur| cur.min(w)));
        }
    }

    match chosen.or(first_eligible) {
        Some(idx) => Selection::Chosen(idx),
        None => Selection::Wait(wait.unwrap_or(0)),
    }
}

/// First eligible candidate after `previous`, wrapping around
pub(crate) fn select_round_robin(
    candidates: &[Candidate],
    cursor: i64,
    previous: Option<usize>,
) -> Selection {
    let n = candidates.len();
    let first = previous.map_or(0, |p| (p + 1) % n.max(1));
    let mut wait: Option<i64> = None;

    for step in 0..n {
        let idx = (first + step) % n;
        let candidate = &candidates[idx];
        if candidate.eligible_at <= cursor {
            return Selection::Chosen(idx);
        }
        let w = candidate.eligible_at - cursor;
        wait = Some(wait.map_or(w, |cur| cur.min(w)));
    }
    Selection::Wait(wait.unwrap_or(0))
}

// ============================================================================
// Scheduler
// ============================================================================

/// Builds lineups from a [`RandomSlotSchedule`]
pub struct RandomSlotScheduler<'a> {
    schedule: &'a RandomSlotSchedule,
    pool: &'a ProgramPool,
}

impl<'a> RandomSlotScheduler<'a> {
    pub fn new(schedule: &'a RandomSlotSchedule, pool: &'a ProgramPool) -> Self {
        Self { schedule, pool }
    }

    /// Generate the lineup.
    ///
    /// Identical seed, discard count and `options.last_played` history
    /// reproduce the same lineup.
    pub fn generate(&self, options: &RunOptions) -> SchedulerResult<Lineup> {
        let schedule = self.schedule;
        validate_random_slot_schedule(schedule)?;
        validate_slot_pools(schedule.slots.iter().map(|s| &s.slot), self.pool)?;

        let seed = options.seed.clone().unwrap_or_else(SeededRng::generate_seed);
        let mut rng = SeededRng::with_discard(&seed, options.discard_count);
        let (mut arena, slots) =
            build_slots(schedule.slots.iter().map(|s| &s.slot), self.pool, &mut rng)?;

        let pad = schedule.pad_ms.max(0);
        let start = if pad > 0 {
            options.start_ms - options.start_ms.rem_euclid(pad)
        } else {
            options.start_ms
        };
        let end = start + i64::from(schedule.max_days) * DAY_MS;

        let mut last_start: Vec<Option<i64>> = slots
            .iter()
            .map(|s| options.last_played.get(s.id()).copied())
            .collect();
        let mut previous: Option<usize> = None;
        let mut selections: HashMap<&str, usize> = HashMap::new();

        let mut lineup = LineupBuilder::new(start, options.max_items);
        while lineup.cursor() < end {
            let cursor = lineup.cursor();

            let gap = pad_amount(cursor, pad);
            if gap > 0 {
                lineup.push_flex(gap)?;
                continue;
            }

            let candidates: Vec<Candidate> = schedule
                .slots
                .iter()
                .zip(&last_start)
                .map(|(s, last)| Candidate::new(s.slot.weight, *last, s.slot.cooldown_ms))
                .collect();

            let selection = match schedule.distribution {
                RandomDistribution::None => select_round_robin(&candidates, cursor, previous),
                RandomDistribution::Uniform => select_weighted(&candidates, cursor, true, &mut rng),
                RandomDistribution::Weighted => select_weighted(&candidates, cursor, false, &mut rng),
            };

            let idx = match selection {
                Selection::Chosen(idx) => idx,
                Selection::Wait(wait) => {
                    // Land on a pad boundary so the next program stays aligned
                    let resume = ceil_to_pad(cursor + wait.max(1), pad).min(end.max(cursor + 1));
                    tracing::debug!(cursor, wait, "All slots in cooldown, waiting with flex");
                    lineup.push_flex(resume - cursor)?;
                    continue;
                }
            };

            let slot = &slots[idx];
            last_start[idx] = Some(cursor);
            previous = Some(idx);
            *selections.entry(slot.id()).or_default() += 1;

            let limit = match schedule.slots[idx].duration {
                SlotDuration::Fixed { duration_ms } => RunLimit::Budget(duration_ms),
                SlotDuration::Dynamic { program_count } => RunLimit::Count(program_count),
            };
            let run = build_run(
                slot,
                &mut arena,
                &mut rng,
                RunParams {
                    start_ms: cursor,
                    limit,
                    pad_ms: pad,
                    pad_style: schedule.pad_style,
                    flex: schedule.flex_preference,
                },
            );

            if run.duration_ms() <= 0 {
                lineup.push_flex(if pad > 0 { pad } else { EMPTY_RUN_MS })?;
                continue;
            }
            for item in run.items {
                lineup.push(item, Some(slot.id()))?;
            }
        }

        let lineup = lineup.finish(seed, options.discard_count, rng.use_count());
        tracing::info!(
            items = lineup.items.len(),
            selections = ?selections,
            "Random-slot lineup generated"
        );
        Ok(lineup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentProgram, HOUR_MS};
    use crate::slots::{SlotDefinition, SlotKind};

    fn pool() -> ProgramPool {
        let mut pool = ProgramPool::new();
        for show in ["a", "b", "c"] {
            for i in 1..=4 {
                pool.add_program(ContentProgram::episode(format!("{show}{i}"), show, 1, i, 30 * MINUTE_MS));
            }
        }
        pool
    }

    fn slot(id: &str, weight: f64, cooldown_ms: i64) -> RandomSlot {
        RandomSlot::new(
            SlotDefinition::new(id, SlotKind::Show { show_id: id.into() })
                .with_weight(weight)
                .with_cooldown(cooldown_ms),
            SlotDuration::Dynamic { program_count: 1 },
        )
    }

    fn options() -> RunOptions {
        RunOptions::starting_at(0).with_seed(vec![42])
    }

    #[test]
    fn test_select_weighted_skips_cooldown() {
        let mut rng = SeededRng::from_seed(&[1]);
        let candidates = [
            Candidate { weight: 100.0, eligible_at: 50 },
            Candidate { weight: 1.0, eligible_at: 0 },
        ];
        for _ in 0..20 {
            assert_eq!(select_weighted(&candidates, 10, false, &mut rng), Selection::Chosen(1));
        }
        let all_cooling = [
            Candidate { weight: 1.0, eligible_at: 50 },
            Candidate { weight: 1.0, eligible_at: 30 },
        ];
        assert_eq!(select_weighted(&all_cooling, 10, false, &mut rng), Selection::Wait(20));
    }

    #[test]
    fn test_select_weighted_cooling_slot_keeps_proportions() {
        let mut rng = SeededRng::from_seed(&[3]);
        let candidates = [
            Candidate { weight: 100.0, eligible_at: 50 },
            Candidate { weight: 1.0, eligible_at: 0 },
            Candidate { weight: 3.0, eligible_at: 0 },
        ];
        let draws = 4000;
        let light = (0..draws)
            .filter(|_| select_weighted(&candidates, 10, false, &mut rng) == Selection::Chosen(1))
            .count();
        let share = light as f64 / draws as f64;
        assert!((0.2..0.3).contains(&share), "share {share}");
    }

    #[test]
    fn test_select_weighted_zero_weights_fall_back() {
        let mut rng = SeededRng::from_seed(&[2]);
        let candidates = [
            Candidate { weight: 0.0, eligible_at: i64::MIN },
            Candidate { weight: 0.0, eligible_at: i64::MIN },
        ];
        assert_eq!(select_weighted(&candidates, 0, false, &mut rng), Selection::Chosen(0));
    }

    #[test]
    fn test_round_robin() {
        let candidates = [
            Candidate { weight: 1.0, eligible_at: i64::MIN },
            Candidate { weight: 1.0, eligible_at: 100 },
            Candidate { weight: 1.0, eligible_at: i64::MIN },
        ];
        assert_eq!(select_round_robin(&candidates, 0, None), Selection::Chosen(0));
        assert_eq!(select_round_robin(&candidates, 0, Some(0)), Selection::Chosen(2));
        assert_eq!(select_round_robin(&candidates, 0, Some(2)), Selection::Chosen(0));
        assert_eq!(select_round_robin(&candidates, 200, Some(0)), Selection::Chosen(1));
    }

    #[test]
    fn test_eligible_at_uses_slack() {
        assert_eq!(eligible_at(None, HOUR_MS), i64::MIN);
        assert_eq!(eligible_at(Some(0), 0), i64::MIN);
        assert_eq!(eligible_at(Some(0), HOUR_MS), HOUR_MS - SLACK_MS);
    }

    #[test]
    fn test_start_aligned_to_pad() {
        let schedule = RandomSlotSchedule::new(vec![slot("a", 1.0, 0)]).with_pad(30 * MINUTE_MS);
        let opts = RunOptions::starting_at(40 * MINUTE_MS).with_seed(vec![1]);
        let lineup = RandomSlotScheduler::new(&schedule, &pool()).generate(&opts).unwrap();
        assert_eq!(lineup.start_time_ms, 30 * MINUTE_MS);
        assert!(lineup.is_contiguous());
        assert!(lineup.end_ms() >= lineup.start_time_ms + DAY_MS);
    }

    #[test]
    fn test_round_robin_distribution() {
        let schedule = RandomSlotSchedule::new(vec![slot("a", 1.0, 0), slot("b", 1.0, 0), slot("c", 1.0, 0)])
            .with_pad(30 * MINUTE_MS)
            .with_distribution(RandomDistribution::None);
        let lineup = RandomSlotScheduler::new(&schedule, &pool()).generate(&options()).unwrap();
        let order: Vec<&str> = lineup.items.iter().take(6).filter_map(|i| i.slot_id.as_deref()).collect();
        assert_eq!(order, vec!["a", "b", "c", "a", "b", "c"]);
        assert_eq!(lineup.final_use_count, 0);
    }

    #[test]
    fn test_cooldown_wait_when_all_cooling() {
        let schedule = RandomSlotSchedule::new(vec![slot("a", 1.0, 2 * HOUR_MS), slot("b", 1.0, 2 * HOUR_MS)])
            .with_pad(30 * MINUTE_MS);
        let lineup = RandomSlotScheduler::new(&schedule, &pool()).generate(&options()).unwrap();

        assert!(lineup.is_contiguous());
        assert_eq!(lineup.items[0].start_ms, 0);
        assert_eq!(lineup.items[1].start_ms, 30 * MINUTE_MS);
        // Both in cooldown from 01:00 until 02:00
        assert!(lineup.items[2].is_flex());
        assert_eq!(lineup.items[2].start_ms, HOUR_MS);
        assert_eq!(lineup.items[3].start_ms, 2 * HOUR_MS);
        assert_eq!(lineup.items[3].slot_id, lineup.items[0].slot_id);
    }

    #[test]
    fn test_fixed_duration_slot() {
        let schedule = RandomSlotSchedule::new(vec![RandomSlot::new(
            SlotDefinition::new("a", SlotKind::Show { show_id: "a".into() }),
            SlotDuration::Fixed { duration_ms: 2 * HOUR_MS },
        )])
        .with_pad(30 * MINUTE_MS)
        .with_max_days(1);
        let lineup = RandomSlotScheduler::new(&schedule, &pool()).generate(&options()).unwrap();
        // Four 30 minute episodes exactly fill each two hour run
        assert!(lineup.items.iter().all(|i| i.kind() == "content"));
        assert_eq!(lineup.items.len(), 48);
    }

    #[test]
    fn test_empty_pool_slot_degrades_to_flex() {
        let schedule = RandomSlotSchedule::new(vec![RandomSlot::new(
            SlotDefinition::new("m", SlotKind::Movie),
            SlotDuration::Dynamic { program_count: 2 },
        )])
        .with_pad(30 * MINUTE_MS);
        let lineup = RandomSlotScheduler::new(&schedule, &pool()).generate(&options()).unwrap();
        assert_eq!(lineup.items.len(), 1);
        assert!(lineup.items[0].is_flex());
        assert_eq!(lineup.end_ms(), DAY_MS);
    }
}
