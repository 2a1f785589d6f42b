//! Common test utilities

#![allow(dead_code)]

use lineup::infinite::GeneratedScheduleItem;
use lineup::models::{ContentProgram, MINUTE_MS};
use lineup::pool::ProgramPool;
use lineup::scheduler::Lineup;
use lineup::slots::{SlotDefinition, SlotKind};

/// Pool with `episodes` episodes of each show, all `minutes` long
pub fn create_test_pool(shows: &[&str], episodes: u32, minutes: i64) -> ProgramPool {
    let mut pool = ProgramPool::new();
    for show in shows {
        for ep in 1..=episodes {
            pool.add_program(ContentProgram::episode(
                format!("{show}-{ep}"),
                *show,
                1,
                ep,
                minutes * MINUTE_MS,
            ));
        }
    }
    pool
}

/// Show slot playing `show`
pub fn show_slot(id: &str, show: &str) -> SlotDefinition {
    SlotDefinition::new(id, SlotKind::Show { show_id: show.to_string() })
}

/// Fixed seed used across tests
pub fn test_seed() -> Vec<u32> {
    vec![0xC0FF_EE00, 42, 7, 1999]
}

/// Assert every item starts where the previous one ended
pub fn assert_lineup_contiguous(lineup: &Lineup) {
    let mut cursor = lineup.start_time_ms;
    for (i, item) in lineup.items.iter().enumerate() {
        assert_eq!(item.start_ms, cursor, "gap or overlap before item {i}");
        assert!(item.duration_ms > 0, "item {i} has no length");
        cursor = item.end_ms();
    }
}

/// Assert generated items form one contiguous sequence
pub fn assert_items_contiguous(items: &[GeneratedScheduleItem]) {
    for pair in items.windows(2) {
        assert_eq!(
            pair[0].end_time_ms(),
            pair[1].start_time_ms,
            "gap or overlap between sequence {} and {}",
            pair[0].sequence_index,
            pair[1].sequence_index
        );
        assert_eq!(pair[0].sequence_index + 1, pair[1].sequence_index);
    }
}
