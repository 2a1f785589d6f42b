//! Time-of-day grid scheduling
//!
//! Slots are anchored at offsets into a recurring day or week. The cursor
//! starts at the period-aligned start and walks forward; at each step the
//! slot whose offset range contains the cursor gets the time up to the next
//! slot's offset. A cursor that arrives later than `lateness_ms` past a
//! slot's nominal start fills the rest of that slot with flex instead of
//! starting a truncated program.

use serde::{Deserialize, Serialize};

use super::error::SchedulerResult;
use super::lineup::{Lineup, LineupBuilder};
use super::run::{build_run, FlexPreference, PadStyle, RunLimit, RunParams};
use super::validation::{validate_slot_pools, validate_time_slot_schedule};
use super::RunOptions;
use crate::models::{DAY_MS, MINUTE_MS, WEEK_MS};
use crate::pool::ProgramPool;
use crate::random::SeededRng;
use crate::slots::{build_slots, TimeSlot};

/// Length of the recurring grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePeriod {
    #[default]
    Day,
    Week,
}

impl SchedulePeriod {
    pub fn period_ms(self) -> i64 {
        match self {
            Self::Day => DAY_MS,
            Self::Week => WEEK_MS,
        }
    }
}

fn default_lateness() -> i64 {
    15 * MINUTE_MS
}

fn default_max_days() -> u32 {
    1
}

/// Time-slot schedule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotSchedule {
    #[serde(default)]
    pub period: SchedulePeriod,
    pub slots: Vec<TimeSlot>,
    #[serde(default)]
    pub pad_ms: i64,
    /// How late a slot may start before it is skipped
    #[serde(default = "default_lateness")]
    pub lateness_ms: i64,
    #[serde(default)]
    pub flex_preference: FlexPreference,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    /// Fixed offset of the schedule's local time from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl TimeSlotSchedule {
    pub fn new(period: SchedulePeriod, slots: Vec<TimeSlot>) -> Self {
        Self {
            period,
            slots,
            pad_ms: 0,
            lateness_ms: default_lateness(),
            flex_preference: FlexPreference::Distribute,
            max_days: default_max_days(),
            utc_offset_minutes: 0,
        }
    }

    pub fn with_pad(mut self, pad_ms: i64) -> Self {
        self.pad_ms = pad_ms;
        self
    }

    pub fn with_lateness(mut self, lateness_ms: i64) -> Self {
        self.lateness_ms = lateness_ms;
        self
    }

    pub fn with_flex_preference(mut self, flex_preference: FlexPreference) -> Self {
        self.flex_preference = flex_preference;
        self
    }

    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days;
        self
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

/// Start of the day or week (weeks start on Sunday) containing `ts_ms`,
/// in the given fixed offset
pub fn period_start(ts_ms: i64, period: SchedulePeriod, utc_offset_minutes: i32) -> i64 {
    let offset_ms = i64::from(utc_offset_minutes) * MINUTE_MS;
    let local = ts_ms + offset_ms;
    let days = local.div_euclid(DAY_MS);
    let start_day = match period {
        SchedulePeriod::Day => days,
        // 1970-01-01 was a Thursday
        SchedulePeriod::Week => days - (days + 4).rem_euclid(7),
    };
    start_day * DAY_MS - offset_ms
}

/// Builds lineups from a [`TimeSlotSchedule`]
pub struct TimeSlotScheduler<'a> {
    schedule: &'a TimeSlotSchedule,
    pool: &'a ProgramPool,
}

impl<'a> TimeSlotScheduler<'a> {
    pub fn new(schedule: &'a TimeSlotSchedule, pool: &'a ProgramPool) -> Self {
        Self { schedule, pool }
    }

    /// Generate the lineup.
    ///
    /// The same seed and discard count over the same pool reproduce the
    /// same lineup.
    pub fn generate(&self, options: &RunOptions) -> SchedulerResult<Lineup> {
        let schedule = self.schedule;
        validate_time_slot_schedule(schedule)?;

        let mut sorted: Vec<&TimeSlot> = schedule.slots.iter().collect();
        sorted.sort_by_key(|t| t.start_offset_ms);
        validate_slot_pools(sorted.iter().map(|t| &t.slot), self.pool)?;

        let seed = options.seed.clone().unwrap_or_else(SeededRng::generate_seed);
        let mut rng = SeededRng::with_discard(&seed, options.discard_count);
        let (mut arena, slots) = build_slots(sorted.iter().map(|t| &t.slot), self.pool, &mut rng)?;

        let period_ms = schedule.period.period_ms();
        let start = period_start(options.start_ms, schedule.period, schedule.utc_offset_minutes);
        let end = start + (i64::from(schedule.max_days) + 1) * DAY_MS;

        tracing::debug!(start, end, slots = slots.len(), "Building time-slot lineup");

        let mut lineup = LineupBuilder::new(start, options.max_items);
        while lineup.cursor() < end {
            let cursor = lineup.cursor();
            let offset = (cursor - start).rem_euclid(period_ms);

            // Last slot at or before the offset; before the first slot the
            // previous period's last slot is still running
            let idx = sorted
                .iter()
                .rposition(|t| t.start_offset_ms <= offset)
                .unwrap_or(sorted.len() - 1);
            let slot_offset = sorted[idx].start_offset_ms;
            let next_offset = match sorted.get(idx + 1) {
                Some(next) => next.start_offset_ms,
                None => sorted[0].start_offset_ms + period_ms,
            };

            let elapsed = (offset - slot_offset).rem_euclid(period_ms);
            let remaining = next_offset - slot_offset - elapsed;

            if elapsed > schedule.lateness_ms {
                lineup.push_flex(remaining)?;
                continue;
            }

            let run = build_run(
                &slots[idx],
                &mut arena,
                &mut rng,
                RunParams {
                    start_ms: cursor,
                    limit: RunLimit::Budget(remaining),
                    pad_ms: schedule.pad_ms,
                    pad_style: PadStyle::Episode,
                    flex: schedule.flex_preference,
                },
            );

            for item in run.items {
                lineup.push(item, Some(slots[idx].id()))?;
            }
        }

        let lineup = lineup.finish(seed, options.discard_count, rng.use_count());
        tracing::info!(
            items = lineup.items.len(),
            start = lineup.start_time_ms,
            end = lineup.end_ms(),
            "Time-slot lineup generated"
        );
        Ok(lineup)
    }
}
