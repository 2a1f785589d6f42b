//! Schedule validation
//!
//! Checks run before any generation or persistence so that a bad schedule is
//! rejected as a whole with [`SchedulerError::InvalidConfiguration`].

use std::collections::HashSet;

use super::error::{SchedulerError, SchedulerResult};
use super::random_slot::{RandomDistribution, RandomSlotSchedule};
use super::time_slot::TimeSlotSchedule;
use crate::infinite::{FillMode, InfiniteSchedule};
use crate::models::ContentProgram;
use crate::pool::ProgramPool;
use crate::slots::{SlotDefinition, SlotDuration, SlotKind};

/// Checks shared by every schedule type
fn validate_definitions<'a>(
    definitions: impl IntoIterator<Item = &'a SlotDefinition>,
) -> SchedulerResult<()> {
    let mut ids = HashSet::new();
    for def in definitions {
        if def.id.trim().is_empty() {
            return Err(SchedulerError::invalid_config("slots.id", "slot id must not be empty"));
        }
        if !ids.insert(def.id.as_str()) {
            return Err(SchedulerError::invalid_config(
                "slots.id",
                format!("duplicate slot id '{}'", def.id),
            ));
        }
        if !def.weight.is_finite() || def.weight < 0.0 {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].weight", def.id),
                "weight must be a finite, non-negative number",
            ));
        }
        if def.cooldown_ms < 0 {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].cooldown_ms", def.id),
                "cooldown must not be negative",
            ));
        }
        if let Some(filler) = def.fillers.iter().find(|f| f.placements.is_empty()) {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].fillers", def.id),
                format!("filler list '{}' has no placements", filler.list_id),
            ));
        }
    }
    Ok(())
}

fn validate_pad(pad_ms: i64) -> SchedulerResult<()> {
    if pad_ms < 0 {
        return Err(SchedulerError::invalid_config("pad_ms", "pad must not be negative"));
    }
    Ok(())
}

pub fn validate_time_slot_schedule(schedule: &TimeSlotSchedule) -> SchedulerResult<()> {
    if schedule.slots.is_empty() {
        return Err(SchedulerError::invalid_config("slots", "schedule has no slots"));
    }
    validate_pad(schedule.pad_ms)?;
    if schedule.lateness_ms < 0 {
        return Err(SchedulerError::invalid_config("lateness_ms", "lateness must not be negative"));
    }
    validate_definitions(schedule.slots.iter().map(|s| &s.slot))?;

    let period = schedule.period.period_ms();
    let mut offsets = HashSet::new();
    for slot in &schedule.slots {
        if !(0..period).contains(&slot.start_offset_ms) {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].start_offset_ms", slot.slot.id),
                format!("offset {} is outside the period", slot.start_offset_ms),
            ));
        }
        if !offsets.insert(slot.start_offset_ms) {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].start_offset_ms", slot.slot.id),
                "two slots start at the same offset",
            ));
        }
    }
    Ok(())
}

pub fn validate_random_slot_schedule(schedule: &RandomSlotSchedule) -> SchedulerResult<()> {
    if schedule.slots.is_empty() {
        return Err(SchedulerError::invalid_config("slots", "schedule has no slots"));
    }
    validate_pad(schedule.pad_ms)?;
    validate_definitions(schedule.slots.iter().map(|s| &s.slot))?;

    for slot in &schedule.slots {
        let field = format!("slots[{}].duration", slot.slot.id);
        match slot.duration {
            SlotDuration::Dynamic { .. } if slot.slot.kind.is_offline() => {
                return Err(SchedulerError::invalid_config(
                    field,
                    format!("{} slots need a fixed duration", slot.slot.kind.as_str()),
                ));
            }
            SlotDuration::Dynamic { program_count: 0 } => {
                return Err(SchedulerError::invalid_config(field, "program count must be positive"));
            }
            SlotDuration::Fixed { duration_ms } if duration_ms <= 0 => {
                return Err(SchedulerError::invalid_config(field, "duration must be positive"));
            }
            _ => {}
        }
    }

    if schedule.distribution == RandomDistribution::Weighted
        && !schedule.slots.iter().any(|s| s.slot.weight > 0.0)
    {
        return Err(SchedulerError::invalid_config(
            "distribution",
            "weighted distribution needs at least one positive weight",
        ));
    }
    Ok(())
}

pub fn validate_infinite_schedule(schedule: &InfiniteSchedule) -> SchedulerResult<()> {
    if schedule.id.trim().is_empty() {
        return Err(SchedulerError::invalid_config("id", "schedule id must not be empty"));
    }
    validate_pad(schedule.pad_ms)?;
    if schedule.buffer_days == 0 {
        return Err(SchedulerError::invalid_config("buffer_days", "buffer must span at least one day"));
    }
    validate_definitions(schedule.slots.iter().map(|s| &s.slot))?;

    for slot in &schedule.slots {
        let field = format!("slots[{}].fill_mode", slot.slot.id);
        match slot.fill_mode {
            FillMode::Count { count: 0 } => {
                return Err(SchedulerError::invalid_config(field, "count must be positive"));
            }
            FillMode::Duration { duration_ms } if duration_ms <= 0 => {
                return Err(SchedulerError::invalid_config(field, "duration must be positive"));
            }
            FillMode::Fill | FillMode::Count { .. }
                if slot.slot.kind.is_offline() && schedule.pad_ms == 0 =>
            {
                return Err(SchedulerError::invalid_config(
                    field,
                    format!(
                        "{} slots need a duration fill mode when the schedule has no pad",
                        slot.slot.kind.as_str()
                    ),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// A slot that plays a filler list as its content needs that list non-empty
pub fn validate_resolved_pool(definition: &SlotDefinition, programs: &[ContentProgram]) -> SchedulerResult<()> {
    if let SlotKind::Filler { filler_list_id } = &definition.kind {
        if programs.is_empty() {
            return Err(SchedulerError::invalid_config(
                format!("slots[{}].kind", definition.id),
                format!("filler list '{filler_list_id}' is empty"),
            ));
        }
    }
    Ok(())
}

/// Resolve every filler-kind slot against `pool` and reject empty lists
pub fn validate_slot_pools<'a>(
    definitions: impl IntoIterator<Item = &'a SlotDefinition>,
    pool: &ProgramPool,
) -> SchedulerResult<()> {
    for def in definitions {
        if let (SlotKind::Filler { .. }, Some(source)) = (&def.kind, def.kind.pool_source()) {
            let programs = pool.resolve_source(&source)?;
            validate_resolved_pool(def, &programs)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infinite::InfiniteSlot;
    use crate::models::{HOUR_MS, MINUTE_MS};
    use crate::scheduler::time_slot::SchedulePeriod;
    use crate::slots::{FillerPlacement, RandomSlot, SlotFiller, TimeSlot};

    fn show(id: &str) -> SlotDefinition {
        SlotDefinition::new(id, SlotKind::Show { show_id: id.into() })
    }

    fn assert_invalid(result: SchedulerResult<()>, field_part: &str) {
        match result {
            Err(SchedulerError::InvalidConfiguration { field, .. }) => {
                assert!(field.contains(field_part), "unexpected field {field}")
            }
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_time_slot_rules() {
        let ok = TimeSlotSchedule::new(
            SchedulePeriod::Day,
            vec![TimeSlot::new(0, show("a")), TimeSlot::new(HOUR_MS, show("b"))],
        );
        assert!(validate_time_slot_schedule(&ok).is_ok());

        let empty = TimeSlotSchedule::new(SchedulePeriod::Day, vec![]);
        assert_invalid(validate_time_slot_schedule(&empty), "slots");

        let outside = TimeSlotSchedule::new(SchedulePeriod::Day, vec![TimeSlot::new(25 * HOUR_MS, show("a"))]);
        assert_invalid(validate_time_slot_schedule(&outside), "start_offset_ms");

        let dup = TimeSlotSchedule::new(
            SchedulePeriod::Day,
            vec![TimeSlot::new(0, show("a")), TimeSlot::new(0, show("b"))],
        );
        assert_invalid(validate_time_slot_schedule(&dup), "start_offset_ms");

        let same_id = TimeSlotSchedule::new(
            SchedulePeriod::Day,
            vec![TimeSlot::new(0, show("a")), TimeSlot::new(HOUR_MS, show("a"))],
        );
        assert_invalid(validate_time_slot_schedule(&same_id), "slots.id");

        let bad_pad = ok.clone().with_pad(-1);
        assert_invalid(validate_time_slot_schedule(&bad_pad), "pad_ms");
    }

    #[test]
    fn test_dynamic_flex_rejected() {
        let schedule = RandomSlotSchedule::new(vec![RandomSlot::new(
            SlotDefinition::new("f", SlotKind::Flex),
            SlotDuration::Dynamic { program_count: 1 },
        )]);
        assert_invalid(validate_random_slot_schedule(&schedule), "duration");

        let redirect = RandomSlotSchedule::new(vec![RandomSlot::new(
            SlotDefinition::new("r", SlotKind::Redirect { channel_id: "c".into() }),
            SlotDuration::Dynamic { program_count: 2 },
        )]);
        assert_invalid(validate_random_slot_schedule(&redirect), "duration");

        let fixed_flex = RandomSlotSchedule::new(vec![RandomSlot::new(
            SlotDefinition::new("f", SlotKind::Flex),
            SlotDuration::Fixed { duration_ms: 30 * MINUTE_MS },
        )]);
        assert!(validate_random_slot_schedule(&fixed_flex).is_ok());
    }

    #[test]
    fn test_weighted_needs_positive_weight() {
        let schedule = RandomSlotSchedule::new(vec![RandomSlot::new(
            show("a").with_weight(0.0),
            SlotDuration::Dynamic { program_count: 1 },
        )]);
        assert_invalid(validate_random_slot_schedule(&schedule), "distribution");
        let uniform = schedule.with_distribution(RandomDistribution::Uniform);
        assert!(validate_random_slot_schedule(&uniform).is_ok());
    }

    #[test]
    fn test_filler_without_placements() {
        let schedule = RandomSlotSchedule::new(vec![RandomSlot::new(
            show("a").with_filler(SlotFiller::new("ads", &[])),
            SlotDuration::Dynamic { program_count: 1 },
        )]);
        assert_invalid(validate_random_slot_schedule(&schedule), "fillers");

        let placed = RandomSlotSchedule::new(vec![RandomSlot::new(
            show("a").with_filler(SlotFiller::new("ads", &[FillerPlacement::Post])),
            SlotDuration::Dynamic { program_count: 1 },
        )]);
        assert!(validate_random_slot_schedule(&placed).is_ok());
    }

    #[test]
    fn test_empty_filler_slot_pool() {
        let mut pool = ProgramPool::new();
        pool.add_filler_list("ads", vec![]);
        let def = SlotDefinition::new("f", SlotKind::Filler { filler_list_id: "ads".into() });
        assert_invalid(validate_slot_pools([&def], &pool), "kind");

        // Content slots with nothing to play degrade at generation time instead
        assert!(validate_slot_pools([&show("nothing")], &pool).is_ok());
    }

    #[test]
    fn test_infinite_rules() {
        let mut schedule = InfiniteSchedule::new("s1", "Channel");
        schedule.slots.push(InfiniteSlot::new(show("a"), FillMode::Fill));
        assert!(validate_infinite_schedule(&schedule).is_ok());

        schedule.slots.push(InfiniteSlot::new(SlotDefinition::new("f", SlotKind::Flex), FillMode::Fill));
        assert_invalid(validate_infinite_schedule(&schedule), "fill_mode");

        schedule.pad_ms = 30 * MINUTE_MS;
        assert!(validate_infinite_schedule(&schedule).is_ok());

        schedule.slots.push(InfiniteSlot::new(show("b"), FillMode::Count { count: 0 }));
        assert_invalid(validate_infinite_schedule(&schedule), "fill_mode");

        let mut no_buffer = InfiniteSchedule::new("s2", "Channel");
        no_buffer.buffer_days = 0;
        assert_invalid(validate_infinite_schedule(&no_buffer), "buffer_days");
    }
}
