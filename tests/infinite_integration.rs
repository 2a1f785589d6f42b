//! Integration tests for infinite schedules on SQLite
//!
//! These tests verify the complete workflow of:
//! - Storing a schedule with its persisted state
//! - Generating across restarts with a file-backed database
//! - Previews leaving storage untouched
//! - Buffer maintenance over several schedules

mod common;

use std::sync::Arc;

use common::{assert_items_contiguous, create_test_pool, show_slot};
use lineup::infinite::{
    BufferMaintainer, FillMode, InfiniteSchedule, InfiniteScheduleService, InfiniteSlot, ItemType,
    MaintenanceSettings, PersistedScheduleState, PersistedSlotState,
};
use lineup::models::{HOUR_MS, MINUTE_MS};
use lineup::pool::ProgramPool;
use lineup::slots::{SlotDefinition, SlotKind};
use lineup::storage::{ScheduleRepository, SlotStateChanges, SqliteScheduleRepository};
use tempfile::TempDir;

fn schedule() -> InfiniteSchedule {
    InfiniteSchedule::new("cartoons", "Cartoons")
        .with_pad(30 * MINUTE_MS)
        .with_buffer_days(1)
        .with_slot(InfiniteSlot::new(show_slot("a", "a"), FillMode::Count { count: 3 }))
        .with_slot(InfiniteSlot::new(show_slot("b", "b"), FillMode::Fill))
        .with_slot(InfiniteSlot::new(
            SlotDefinition::new("break", SlotKind::Flex),
            FillMode::Duration { duration_ms: 15 * MINUTE_MS },
        ))
}

fn pool() -> ProgramPool {
    create_test_pool(&["a", "b"], 7, 25)
}

/// Store the schedule with fixed seeds so two databases start identical
fn seeded_repo(path: &std::path::Path) -> SqliteScheduleRepository {
    let repo = SqliteScheduleRepository::new(path).unwrap();
    let schedule = schedule();
    let changes = SlotStateChanges {
        schedule_state: Some(PersistedScheduleState::with_seed(&schedule.id, vec![11, 12])),
        added: schedule
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| PersistedSlotState::with_seed(&schedule.id, slot.id(), vec![i as u32, 99]))
            .collect(),
        removed: Vec::new(),
    };
    repo.save_schedule(&schedule, &changes).unwrap();
    repo
}

fn service_for(repo: SqliteScheduleRepository) -> InfiniteScheduleService {
    InfiniteScheduleService::new(Arc::new(repo), Arc::new(pool()))
}

#[tokio::test]
async fn test_resume_across_restart_matches_single_run() {
    let dir = TempDir::new().unwrap();

    let single = service_for(seeded_repo(&dir.path().join("single.db")));
    single
        .generate_and_commit("cartoons", 0, Some(0), Some(24 * HOUR_MS))
        .await
        .unwrap();
    let expected = single.repository().items_in_range("cartoons", 0, i64::MAX).unwrap();

    let split_path = dir.path().join("split.db");
    {
        let first = service_for(seeded_repo(&split_path));
        first
            .generate_and_commit("cartoons", 0, Some(0), Some(10 * HOUR_MS))
            .await
            .unwrap();
    }
    // Reopen the database as a fresh process would
    let reopened = service_for(SqliteScheduleRepository::new(&split_path).unwrap());
    reopened
        .generate_and_commit("cartoons", 0, None, Some(24 * HOUR_MS))
        .await
        .unwrap();
    let resumed = reopened.repository().items_in_range("cartoons", 0, i64::MAX).unwrap();

    assert_items_contiguous(&resumed);
    assert_eq!(resumed, expected);
}

#[tokio::test]
async fn test_generated_items_follow_fill_modes() {
    let dir = TempDir::new().unwrap();
    let service = service_for(seeded_repo(&dir.path().join("lineup.db")));
    service
        .generate_and_commit("cartoons", 0, Some(0), Some(12 * HOUR_MS))
        .await
        .unwrap();
    let items = service.repository().items_in_range("cartoons", 0, i64::MAX).unwrap();

    assert_eq!(items[0].start_time_ms, 0);
    assert_items_contiguous(&items);

    // Round robin: three from "a", one from "b", then the break
    let content: Vec<&str> = items
        .iter()
        .filter(|i| i.item_type == ItemType::Content)
        .take(4)
        .filter_map(|i| i.slot_id.as_deref())
        .collect();
    assert_eq!(content, vec!["a", "a", "a", "b"]);

    for item in items.iter().filter(|i| i.item_type == ItemType::Content) {
        assert_eq!(item.start_time_ms % (30 * MINUTE_MS), 0);
    }
    assert!(items
        .iter()
        .any(|i| i.slot_id.as_deref() == Some("break") && i.duration_ms == 15 * MINUTE_MS));
}

#[tokio::test]
async fn test_preview_leaves_storage_untouched() {
    let dir = TempDir::new().unwrap();
    let service = service_for(seeded_repo(&dir.path().join("lineup.db")));
    let before = service.diagnostics("cartoons").unwrap();

    let first = service.preview("cartoons", 0, 6 * HOUR_MS).await.unwrap();
    let second = service.preview("cartoons", 0, 6 * HOUR_MS).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(service.diagnostics("cartoons").unwrap(), before);
}

#[tokio::test]
async fn test_maintenance_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(service_for(seeded_repo(&dir.path().join("lineup.db"))));
    let other = InfiniteSchedule::new("movies-night", "Movies")
        .with_buffer_days(1)
        .with_slot(InfiniteSlot::new(show_slot("b", "b"), FillMode::Fill));
    service.create_schedule(other, 0).unwrap();

    let maintainer = BufferMaintainer::new(
        service.clone(),
        MaintenanceSettings {
            low_water_ms: 12 * HOUR_MS,
            retention_ms: 2 * HOUR_MS,
            max_concurrency: 2,
            interval: std::time::Duration::from_secs(60),
        },
    );

    let report = maintainer.run_once(0).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.extended, 2);
    assert!(report.failures.is_empty());

    for id in ["cartoons", "movies-night"] {
        let diagnostics = service.diagnostics(id).unwrap();
        assert!(diagnostics.buffer_end_ms.unwrap() >= 24 * HOUR_MS);
        assert!(diagnostics.missing_slot_states.is_empty());
    }
}
