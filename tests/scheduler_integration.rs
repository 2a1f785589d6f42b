//! Integration tests for the time-slot and random-slot schedulers
//!
//! These tests verify the lineup-level guarantees:
//! - No gaps or overlaps
//! - Reproducibility from seed and discard count
//! - Cooldowns and the all-in-cooldown escape valve
//! - Pad alignment
//! - Weighted selection converging to the configured weights

mod common;

use std::collections::HashMap;

use common::{assert_lineup_contiguous, create_test_pool, show_slot, test_seed};
use lineup::models::{ContentProgram, SlotProgram, DAY_MS, HOUR_MS, MINUTE_MS, SLACK_MS};
use lineup::pool::ProgramPool;
use lineup::scheduler::{
    RandomDistribution, RandomSlotSchedule, RandomSlotScheduler, RunOptions, SchedulePeriod, SchedulerError,
    TimeSlotSchedule, TimeSlotScheduler,
};
use lineup::slots::{RandomSlot, SlotDefinition, SlotDuration, SlotKind, TimeSlot};
use proptest::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};

fn dynamic(slot: SlotDefinition, count: u32) -> RandomSlot {
    RandomSlot::new(slot, SlotDuration::Dynamic { program_count: count })
}

fn options() -> RunOptions {
    RunOptions::starting_at(0).with_seed(test_seed())
}

// ============================================================================
// Time-Slot Scenarios
// ============================================================================

#[test]
fn test_single_episode_padded_to_half_hour() {
    let mut pool = ProgramPool::new();
    pool.add_program(ContentProgram::episode("only", "show", 1, 1, 25 * MINUTE_MS));
    let schedule = TimeSlotSchedule::new(SchedulePeriod::Day, vec![TimeSlot::new(0, show_slot("s", "show"))])
        .with_pad(30 * MINUTE_MS);

    let lineup = TimeSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap();

    assert_lineup_contiguous(&lineup);
    assert_eq!(lineup.items[0].kind(), "content");
    assert_eq!(lineup.items[0].duration_ms, 25 * MINUTE_MS);
    assert_eq!(lineup.items[1].program, SlotProgram::Flex { duration_ms: 5 * MINUTE_MS });
    assert_eq!(lineup.items[2].kind(), "content");
    assert_eq!(lineup.items[2].start_ms, 30 * MINUTE_MS);
}

#[test]
fn test_weekly_schedule_covers_requested_days() {
    let pool = create_test_pool(&["a", "b"], 5, 30);
    let schedule = TimeSlotSchedule::new(
        SchedulePeriod::Week,
        vec![
            TimeSlot::new(0, show_slot("weekend", "a")),
            TimeSlot::new(DAY_MS, show_slot("weekdays", "b")),
        ],
    )
    .with_max_days(7);

    // 2024-05-12 is a Sunday
    let sunday = 1_715_472_000_000;
    let lineup = TimeSlotScheduler::new(&schedule, &pool)
        .generate(&RunOptions::starting_at(sunday + 3 * HOUR_MS).with_seed(test_seed()))
        .unwrap();

    assert_eq!(lineup.start_time_ms, sunday);
    assert_lineup_contiguous(&lineup);
    assert!(lineup.end_ms() >= sunday + 7 * DAY_MS);
}

#[test]
fn test_invalid_time_slot_schedule_rejected() {
    let pool = create_test_pool(&["a"], 1, 30);
    let schedule = TimeSlotSchedule::new(
        SchedulePeriod::Day,
        vec![TimeSlot::new(0, show_slot("x", "a")), TimeSlot::new(0, show_slot("y", "a"))],
    );
    let err = TimeSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfiguration { .. }));
}

// ============================================================================
// Random-Slot Scenarios
// ============================================================================

#[test]
fn test_reproducible_and_resumable() {
    let pool = create_test_pool(&["a", "b", "c"], 8, 30);
    let schedule = RandomSlotSchedule::new(vec![
        dynamic(show_slot("a", "a"), 1),
        dynamic(show_slot("b", "b"), 2),
        dynamic(show_slot("c", "c"), 1),
    ])
    .with_pad(30 * MINUTE_MS);
    let scheduler = RandomSlotScheduler::new(&schedule, &pool);

    let first = scheduler.generate(&options()).unwrap();
    let again = scheduler.generate(&options()).unwrap();
    assert_eq!(first, again);

    // A follow-up run continues the stream where the first one stopped
    let follow_up = options().with_discard(first.final_use_count);
    let second = scheduler.generate(&follow_up).unwrap();
    assert_eq!(second.discard_count, first.final_use_count);
    assert_eq!(second, scheduler.generate(&follow_up).unwrap());
    assert_ne!(
        first.items.iter().map(|i| i.slot_id.clone()).collect::<Vec<_>>(),
        second.items.iter().map(|i| i.slot_id.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn test_cooldown_respected_with_alternatives() {
    let pool = create_test_pool(&["a", "b"], 6, 30);
    let schedule = RandomSlotSchedule::new(vec![
        dynamic(show_slot("rare", "a").with_cooldown(3 * HOUR_MS), 1),
        dynamic(show_slot("common", "b"), 1),
    ])
    .with_pad(30 * MINUTE_MS)
    .with_max_days(2);

    let lineup = RandomSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap();
    assert_lineup_contiguous(&lineup);

    let rare: Vec<i64> = lineup
        .content()
        .filter(|i| i.slot_id.as_deref() == Some("rare"))
        .map(|i| i.start_ms)
        .collect();
    assert!(!rare.is_empty());
    for pair in rare.windows(2) {
        assert!(pair[1] - pair[0] >= 3 * HOUR_MS - SLACK_MS);
    }

    // "common" is always eligible, so no waiting flex is ever needed
    assert!(lineup.items.iter().all(|i| i.slot_id.is_some() || !i.is_flex()));
}

#[test]
fn test_escape_valve_only_when_all_in_cooldown() {
    let pool = create_test_pool(&["a", "b"], 6, 30);
    let schedule = RandomSlotSchedule::new(vec![
        dynamic(show_slot("a", "a").with_cooldown(2 * HOUR_MS), 1),
        dynamic(show_slot("b", "b").with_cooldown(2 * HOUR_MS), 1),
    ])
    .with_pad(30 * MINUTE_MS);

    let lineup = RandomSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap();
    assert_lineup_contiguous(&lineup);

    let mut last: HashMap<&str, i64> = HashMap::new();
    for item in &lineup.items {
        match item.slot_id.as_deref() {
            Some(slot) if item.kind() == "content" => {
                if let Some(prev) = last.get(slot) {
                    assert!(item.start_ms - prev >= 2 * HOUR_MS - SLACK_MS);
                }
                last.insert(slot, item.start_ms);
            }
            None => {
                // Waiting flex: every slot must still be cooling down
                assert!(item.is_flex());
                for prev in last.values() {
                    assert!(item.start_ms - prev < 2 * HOUR_MS - SLACK_MS);
                }
            }
            _ => {}
        }
    }
    assert!(lineup.items.iter().any(|i| i.slot_id.is_none()));
}

#[test]
fn test_weighted_selection_converges() {
    let pool = create_test_pool(&["a", "b", "c"], 10, 30);
    let weights = [("a", 37.5), ("b", 25.0), ("c", 37.5)];
    let schedule = RandomSlotSchedule::new(
        weights
            .iter()
            .map(|(id, w)| dynamic(show_slot(id, id).with_weight(*w), 1))
            .collect(),
    )
    .with_pad(30 * MINUTE_MS)
    .with_max_days(21)
    .with_distribution(RandomDistribution::Weighted);

    let lineup = RandomSlotScheduler::new(&schedule, &pool)
        .generate(&options().with_max_items(10_000))
        .unwrap();

    let mut observed: HashMap<&str, f64> = HashMap::new();
    for item in lineup.content().take(1000) {
        *observed.entry(item.slot_id.as_deref().unwrap_or("")).or_default() += 1.0;
    }
    let total: f64 = observed.values().sum();
    assert_eq!(total, 1000.0);

    let chi_square: f64 = weights
        .iter()
        .map(|(id, w)| {
            let expected = total * w / 100.0;
            let got = observed.get(id).copied().unwrap_or(0.0);
            (got - expected).powi(2) / expected
        })
        .sum();
    let critical = ChiSquared::new(2.0).unwrap().inverse_cdf(0.999);
    assert!(chi_square < critical, "chi-square {chi_square} exceeds {critical}: {observed:?}");
}

#[test]
fn test_round_robin_distribution() {
    let pool = create_test_pool(&["a", "b", "c"], 4, 30);
    let schedule = RandomSlotSchedule::new(vec![
        dynamic(show_slot("a", "a"), 1),
        dynamic(show_slot("b", "b"), 1),
        dynamic(show_slot("c", "c"), 1),
    ])
    .with_pad(30 * MINUTE_MS)
    .with_distribution(RandomDistribution::None);

    let lineup = RandomSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap();
    let order: Vec<&str> = lineup
        .content()
        .take(6)
        .filter_map(|i| i.slot_id.as_deref())
        .collect();
    assert_eq!(order, vec!["a", "b", "c", "a", "b", "c"]);
}

#[test]
fn test_dynamic_flex_slot_rejected() {
    let pool = create_test_pool(&["a"], 1, 30);
    let schedule = RandomSlotSchedule::new(vec![dynamic(SlotDefinition::new("f", SlotKind::Flex), 1)]);
    let err = RandomSlotScheduler::new(&schedule, &pool).generate(&options()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfiguration { .. }));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_random_lineup_has_no_gaps(
        durations in prop::collection::vec(1i64..90, 1..8),
        counts in prop::collection::vec(1u32..4, 1..4),
        cooldown_minutes in 0i64..240,
        seed in prop::collection::vec(any::<u32>(), 1..8),
    ) {
        let mut pool = ProgramPool::new();
        for (i, minutes) in durations.iter().enumerate() {
            pool.add_program(ContentProgram::episode(format!("p{i}"), "show", 1, i as u32 + 1, minutes * MINUTE_MS));
        }
        let slots = counts
            .iter()
            .enumerate()
            .map(|(i, count)| dynamic(show_slot(&format!("s{i}"), "show").with_cooldown(cooldown_minutes * MINUTE_MS), *count))
            .collect();
        let schedule = RandomSlotSchedule::new(slots).with_pad(30 * MINUTE_MS);

        let lineup = RandomSlotScheduler::new(&schedule, &pool)
            .generate(&RunOptions::starting_at(0).with_seed(seed))
            .unwrap();

        prop_assert!(lineup.is_contiguous());
        prop_assert!(lineup.end_ms() >= DAY_MS);
        for item in lineup.content() {
            prop_assert_eq!(item.start_ms % (30 * MINUTE_MS), 0);
        }
    }
}
