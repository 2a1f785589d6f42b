//! Schedule persistence
//!
//! Trait-based repository abstraction over infinite schedules, their
//! persisted RNG/iterator state and the generated item buffer, with a
//! SQLite implementation for production and a mock for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  InfiniteScheduleService                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ScheduleRepository                       │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                       │
//!                    ▼                       ▼
//!          ┌─────────────────┐     ┌─────────────────┐
//!          │     SQLite      │     │      Mock       │
//!          │ Implementation  │     │ Implementation  │
//!          └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lineup::storage::{ScheduleRepository, SqliteScheduleRepository};
//!
//! let repo = SqliteScheduleRepository::new("data/lineup.db")?;
//! let end = repo.buffer_end_time("channel-1")?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::infinite::{
    GeneratedScheduleItem, GenerationCheckpoint, GenerationResult, InfiniteSchedule, ItemType,
    PersistedScheduleState, PersistedSlotState,
};

// ============================================================================
// Core Types
// ============================================================================

/// Slot-state changes applied together with a schedule definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotStateChanges {
    /// Inserted when the schedule has no state yet
    pub schedule_state: Option<PersistedScheduleState>,
    /// States for newly added slots
    pub added: Vec<PersistedSlotState>,
    /// Slots removed from the definition; their state is deleted
    pub removed: Vec<String>,
}

/// Buffer figures for one schedule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub item_count: usize,
    pub first_start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Storage port for infinite schedules
///
/// Multi-step writes (`save_schedule`, `commit_generation`) are atomic:
/// either every change is applied or none is.
pub trait ScheduleRepository: Send + Sync {
    /// Insert or replace a schedule definition and apply slot-state changes
    fn save_schedule(&self, schedule: &InfiniteSchedule, changes: &SlotStateChanges) -> Result<()>;

    /// Get a schedule definition by ID
    fn get_schedule(&self, id: &str) -> Result<Option<InfiniteSchedule>>;

    /// List all schedule definitions ordered by ID
    fn list_schedules(&self) -> Result<Vec<InfiniteSchedule>>;

    /// Delete a schedule with its state and items
    fn delete_schedule(&self, id: &str) -> Result<bool>;

    fn load_schedule_state(&self, schedule_id: &str) -> Result<Option<PersistedScheduleState>>;

    fn save_schedule_state(&self, state: &PersistedScheduleState) -> Result<()>;

    /// All slot states of a schedule, ordered by slot ID
    fn load_slot_states(&self, schedule_id: &str) -> Result<Vec<PersistedSlotState>>;

    fn load_slot_state(&self, schedule_id: &str, slot_id: &str) -> Result<Option<PersistedSlotState>>;

    fn save_slot_state(&self, state: &PersistedSlotState) -> Result<()>;

    /// Append generated items; returns the number stored
    fn append_items(&self, items: &[GeneratedScheduleItem]) -> Result<usize>;

    /// Items overlapping `[from_ms, to_ms)` in sequence order
    fn items_in_range(&self, schedule_id: &str, from_ms: i64, to_ms: i64) -> Result<Vec<GeneratedScheduleItem>>;

    /// Delete items starting at or after `from_ms`
    fn delete_items_from(&self, schedule_id: &str, from_ms: i64) -> Result<usize>;

    /// Delete items ending at or before `before_ms`
    ///
    /// Checkpoints older than the newest one at or before `before_ms` go
    /// with them.
    fn delete_items_before(&self, schedule_id: &str, before_ms: i64) -> Result<usize>;

    /// End of the last buffered item
    fn buffer_end_time(&self, schedule_id: &str) -> Result<Option<i64>> {
        Ok(self.buffer_stats(schedule_id)?.end_ms)
    }

    fn buffer_stats(&self, schedule_id: &str) -> Result<BufferStats>;

    /// Apply a generation result (items, slot states, schedule state and
    /// starting checkpoint) atomically
    fn commit_generation(&self, result: &GenerationResult) -> Result<()>;

    /// Newest checkpoint taken at or before `at_ms`
    fn latest_checkpoint(&self, schedule_id: &str, at_ms: i64) -> Result<Option<GenerationCheckpoint>>;

    /// Delete items starting at or after `clear_from_ms` together with the
    /// checkpoints taken there, then apply `result`, all atomically
    fn commit_regeneration(&self, clear_from_ms: i64, result: &GenerationResult) -> Result<()>;
}

/// Shared schedule repository
pub type SharedScheduleRepository = Arc<dyn ScheduleRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of ScheduleRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteScheduleRepository {
    conn: Mutex<Connection>,
}

impl SqliteScheduleRepository {
    /// Create a new SQLite repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite schedule repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("SQLite connection lock poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS schedules (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    definition TEXT NOT NULL,
                    created_at_ms INTEGER NOT NULL,
                    updated_at_ms INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS schedule_state (
                    schedule_id TEXT PRIMARY KEY REFERENCES schedules(id) ON DELETE CASCADE,
                    last_slot_id TEXT,
                    rotation_cursor INTEGER NOT NULL DEFAULT 0,
                    generation_cursor_ms INTEGER,
                    selection_seed TEXT NOT NULL,
                    selection_use_count INTEGER NOT NULL DEFAULT 0,
                    next_sequence_index INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS slot_state (
                    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                    slot_id TEXT NOT NULL,
                    rng_seed TEXT NOT NULL,
                    rng_use_count INTEGER NOT NULL DEFAULT 0,
                    iterator_position INTEGER NOT NULL DEFAULT 0,
                    shuffle_order TEXT,
                    fill_items INTEGER NOT NULL DEFAULT 0,
                    fill_duration_ms INTEGER NOT NULL DEFAULT 0,
                    last_scheduled_at_ms INTEGER,
                    PRIMARY KEY (schedule_id, slot_id)
                );

                CREATE TABLE IF NOT EXISTS generated_items (
                    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                    sequence_index INTEGER NOT NULL,
                    slot_id TEXT,
                    program_id TEXT,
                    redirect_channel_id TEXT,
                    item_type TEXT NOT NULL,
                    start_time_ms INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    PRIMARY KEY (schedule_id, sequence_index)
                );

                CREATE INDEX IF NOT EXISTS idx_generated_items_start
                    ON generated_items(schedule_id, start_time_ms);

                CREATE TABLE IF NOT EXISTS generation_checkpoints (
                    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                    at_ms INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    PRIMARY KEY (schedule_id, at_ms)
                );
                "#,
        )?;

        Ok(())
    }

    fn row_to_slot_state(row: &Row<'_>) -> rusqlite::Result<(PersistedSlotState, String, Option<String>)> {
        let state = PersistedSlotState {
            schedule_id: row.get(0)?,
            slot_id: row.get(1)?,
            rng_seed: Vec::new(),
            rng_use_count: row.get::<_, i64>(3)? as u64,
            iterator_position: row.get::<_, i64>(4)? as usize,
            shuffle_order: None,
            fill_items: row.get::<_, i64>(6)? as u32,
            fill_duration_ms: row.get(7)?,
            last_scheduled_at_ms: row.get(8)?,
        };
        Ok((state, row.get(2)?, row.get(5)?))
    }

    /// Decode the JSON columns of a slot-state row
    fn finish_slot_state(
        (mut state, seed, order): (PersistedSlotState, String, Option<String>),
    ) -> Result<PersistedSlotState> {
        state.rng_seed = serde_json::from_str(&seed)?;
        state.shuffle_order = order.map(|o| serde_json::from_str(&o)).transpose()?;
        Ok(state)
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<(GeneratedScheduleItem, String)> {
        let item = GeneratedScheduleItem {
            schedule_id: row.get(0)?,
            sequence_index: row.get::<_, i64>(1)? as u64,
            slot_id: row.get(2)?,
            program_id: row.get(3)?,
            redirect_channel_id: row.get(4)?,
            item_type: ItemType::Flex,
            start_time_ms: row.get(6)?,
            duration_ms: row.get(7)?,
        };
        Ok((item, row.get(5)?))
    }

    fn upsert_schedule_state(conn: &Connection, state: &PersistedScheduleState) -> Result<()> {
        conn.execute(
            r#"
                INSERT OR REPLACE INTO schedule_state
                    (schedule_id, last_slot_id, rotation_cursor, generation_cursor_ms,
                     selection_seed, selection_use_count, next_sequence_index)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            params![
                state.schedule_id,
                state.last_slot_id,
                state.rotation_cursor as i64,
                state.generation_cursor_ms,
                serde_json::to_string(&state.selection_seed)?,
                state.selection_use_count as i64,
                state.next_sequence_index as i64,
            ],
        )?;
        Ok(())
    }

    fn upsert_slot_state(conn: &Connection, state: &PersistedSlotState) -> Result<()> {
        let order = state
            .shuffle_order
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            r#"
                INSERT OR REPLACE INTO slot_state
                    (schedule_id, slot_id, rng_seed, rng_use_count, iterator_position,
                     shuffle_order, fill_items, fill_duration_ms, last_scheduled_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            params![
                state.schedule_id,
                state.slot_id,
                serde_json::to_string(&state.rng_seed)?,
                state.rng_use_count as i64,
                state.iterator_position as i64,
                order,
                i64::from(state.fill_items),
                state.fill_duration_ms,
                state.last_scheduled_at_ms,
            ],
        )?;
        Ok(())
    }

    fn upsert_checkpoint(conn: &Connection, checkpoint: &GenerationCheckpoint) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO generation_checkpoints (schedule_id, at_ms, state) VALUES (?1, ?2, ?3)",
            params![
                checkpoint.schedule_id,
                checkpoint.at_ms,
                serde_json::to_string(checkpoint)?,
            ],
        )?;
        Ok(())
    }

    fn apply_result(conn: &Connection, result: &GenerationResult) -> Result<()> {
        Self::insert_items(conn, &result.items)?;
        for state in &result.slot_states {
            Self::upsert_slot_state(conn, state)?;
        }
        Self::upsert_schedule_state(conn, &result.schedule_state)?;
        if let Some(checkpoint) = &result.checkpoint {
            Self::upsert_checkpoint(conn, checkpoint)?;
        }
        Ok(())
    }

    fn insert_items(conn: &Connection, items: &[GeneratedScheduleItem]) -> Result<usize> {
        let mut stmt = conn.prepare_cached(
            r#"
                INSERT INTO generated_items
                    (schedule_id, sequence_index, slot_id, program_id, redirect_channel_id,
                     item_type, start_time_ms, duration_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
        )?;
        for item in items {
            stmt.execute(params![
                item.schedule_id,
                item.sequence_index as i64,
                item.slot_id,
                item.program_id,
                item.redirect_channel_id,
                item.item_type.as_str(),
                item.start_time_ms,
                item.duration_ms,
            ])?;
        }
        Ok(items.len())
    }
}

impl ScheduleRepository for SqliteScheduleRepository {
    fn save_schedule(&self, schedule: &InfiniteSchedule, changes: &SlotStateChanges) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
                INSERT INTO schedules (id, name, definition, created_at_ms, updated_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    definition = excluded.definition,
                    updated_at_ms = excluded.updated_at_ms
                "#,
            params![
                schedule.id,
                schedule.name,
                serde_json::to_string(schedule)?,
                schedule.created_at_ms,
                schedule.updated_at_ms,
            ],
        )?;

        if let Some(state) = &changes.schedule_state {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM schedule_state WHERE schedule_id = ?1)",
                params![schedule.id],
                |row| row.get(0),
            )?;
            if !exists {
                Self::upsert_schedule_state(&tx, state)?;
            }
        }
        for slot_id in &changes.removed {
            tx.execute(
                "DELETE FROM slot_state WHERE schedule_id = ?1 AND slot_id = ?2",
                params![schedule.id, slot_id],
            )?;
        }
        for state in &changes.added {
            Self::upsert_slot_state(&tx, state)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_schedule(&self, id: &str) -> Result<Option<InfiniteSchedule>> {
        let conn = self.conn()?;
        let definition: Option<String> = conn
            .query_row(
                "SELECT definition FROM schedules WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(definition.map(|d| serde_json::from_str(&d)).transpose()?)
    }

    fn list_schedules(&self) -> Result<Vec<InfiniteSchedule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT definition FROM schedules ORDER BY id")?;
        let definitions = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        definitions
            .iter()
            .map(|d| serde_json::from_str(d).map_err(Error::from))
            .collect()
    }

    fn delete_schedule(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn load_schedule_state(&self, schedule_id: &str) -> Result<Option<PersistedScheduleState>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                    SELECT schedule_id, last_slot_id, rotation_cursor, generation_cursor_ms,
                           selection_seed, selection_use_count, next_sequence_index
                    FROM schedule_state WHERE schedule_id = ?1
                    "#,
                params![schedule_id],
                |row| {
                    Ok((
                        PersistedScheduleState {
                            schedule_id: row.get(0)?,
                            last_slot_id: row.get(1)?,
                            rotation_cursor: row.get::<_, i64>(2)? as usize,
                            generation_cursor_ms: row.get(3)?,
                            selection_seed: Vec::new(),
                            selection_use_count: row.get::<_, i64>(5)? as u64,
                            next_sequence_index: row.get::<_, i64>(6)? as u64,
                        },
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(mut state, seed)| {
            state.selection_seed = serde_json::from_str(&seed)?;
            Ok::<_, Error>(state)
        })
        .transpose()
    }

    fn save_schedule_state(&self, state: &PersistedScheduleState) -> Result<()> {
        let conn = self.conn()?;
        Self::upsert_schedule_state(&conn, state)
    }

    fn load_slot_states(&self, schedule_id: &str) -> Result<Vec<PersistedSlotState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT schedule_id, slot_id, rng_seed, rng_use_count, iterator_position,
                       shuffle_order, fill_items, fill_duration_ms, last_scheduled_at_ms
                FROM slot_state WHERE schedule_id = ?1 ORDER BY slot_id
                "#,
        )?;
        let rows = stmt
            .query_map(params![schedule_id], Self::row_to_slot_state)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::finish_slot_state).collect()
    }

    fn load_slot_state(&self, schedule_id: &str, slot_id: &str) -> Result<Option<PersistedSlotState>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                    SELECT schedule_id, slot_id, rng_seed, rng_use_count, iterator_position,
                           shuffle_order, fill_items, fill_duration_ms, last_scheduled_at_ms
                    FROM slot_state WHERE schedule_id = ?1 AND slot_id = ?2
                    "#,
                params![schedule_id, slot_id],
                Self::row_to_slot_state,
            )
            .optional()?;

        row.map(Self::finish_slot_state).transpose()
    }

    fn save_slot_state(&self, state: &PersistedSlotState) -> Result<()> {
        let conn = self.conn()?;
        Self::upsert_slot_state(&conn, state)
    }

    fn append_items(&self, items: &[GeneratedScheduleItem]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = Self::insert_items(&tx, items)?;
        tx.commit()?;
        Ok(count)
    }

    fn items_in_range(&self, schedule_id: &str, from_ms: i64, to_ms: i64) -> Result<Vec<GeneratedScheduleItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT schedule_id, sequence_index, slot_id, program_id, redirect_channel_id,
                       item_type, start_time_ms, duration_ms
                FROM generated_items
                WHERE schedule_id = ?1
                  AND start_time_ms < ?3
                  AND start_time_ms + duration_ms > ?2
                ORDER BY sequence_index
                "#,
        )?;
        let rows = stmt
            .query_map(params![schedule_id, from_ms, to_ms], Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(mut item, item_type)| {
                item.item_type = ItemType::parse(&item_type)?;
                Ok::<_, Error>(item)
            })
            .collect()
    }

    fn delete_items_from(&self, schedule_id: &str, from_ms: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM generated_items WHERE schedule_id = ?1 AND start_time_ms >= ?2",
            params![schedule_id, from_ms],
        )?;
        Ok(deleted)
    }

    fn delete_items_before(&self, schedule_id: &str, before_ms: i64) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM generated_items WHERE schedule_id = ?1 AND start_time_ms + duration_ms <= ?2",
            params![schedule_id, before_ms],
        )?;
        tx.execute(
            r#"
                DELETE FROM generation_checkpoints
                WHERE schedule_id = ?1
                  AND at_ms < (
                      SELECT MAX(at_ms) FROM generation_checkpoints
                      WHERE schedule_id = ?1 AND at_ms <= ?2
                  )
                "#,
            params![schedule_id, before_ms],
        )?;
        tx.commit()?;
        Ok(deleted)
    }

    fn buffer_stats(&self, schedule_id: &str) -> Result<BufferStats> {
        let conn = self.conn()?;
        let (count, first, end): (i64, Option<i64>, Option<i64>) = conn.query_row(
            r#"
                SELECT COUNT(*), MIN(start_time_ms), MAX(start_time_ms + duration_ms)
                FROM generated_items WHERE schedule_id = ?1
                "#,
            params![schedule_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(BufferStats {
            item_count: count as usize,
            first_start_ms: first,
            end_ms: end,
        })
    }

    fn commit_generation(&self, result: &GenerationResult) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::apply_result(&tx, result)?;
        tx.commit()?;
        Ok(())
    }

    fn latest_checkpoint(&self, schedule_id: &str, at_ms: i64) -> Result<Option<GenerationCheckpoint>> {
        let conn = self.conn()?;
        let state: Option<String> = conn
            .query_row(
                r#"
                    SELECT state FROM generation_checkpoints
                    WHERE schedule_id = ?1 AND at_ms <= ?2
                    ORDER BY at_ms DESC
                    LIMIT 1
                    "#,
                params![schedule_id, at_ms],
                |row| row.get(0),
            )
            .optional()?;
        Ok(state.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    fn commit_regeneration(&self, clear_from_ms: i64, result: &GenerationResult) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM generated_items WHERE schedule_id = ?1 AND start_time_ms >= ?2",
            params![result.schedule_id, clear_from_ms],
        )?;
        tx.execute(
            "DELETE FROM generation_checkpoints WHERE schedule_id = ?1 AND at_ms >= ?2",
            params![result.schedule_id, clear_from_ms],
        )?;
        Self::apply_result(&tx, result)?;

        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

/// Mock implementation of ScheduleRepository for testing
///
/// Every write takes the single lock once, so multi-step writes are atomic.
#[derive(Default)]
pub struct MockScheduleRepository {
    inner: RwLock<MockState>,
}

#[derive(Default, Clone)]
struct MockState {
    schedules: BTreeMap<String, InfiniteSchedule>,
    schedule_states: HashMap<String, PersistedScheduleState>,
    slot_states: HashMap<String, BTreeMap<String, PersistedSlotState>>,
    items: HashMap<String, BTreeMap<u64, GeneratedScheduleItem>>,
    checkpoints: HashMap<String, BTreeMap<i64, GenerationCheckpoint>>,
}

impl MockScheduleRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MockState>> {
        self.inner
            .read()
            .map_err(|_| Error::other("Mock repository lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MockState>> {
        self.inner
            .write()
            .map_err(|_| Error::other("Mock repository lock poisoned"))
    }
}

impl MockState {
    fn insert_items(&mut self, items: &[GeneratedScheduleItem]) -> Result<usize> {
        for item in items {
            let buffer = self.items.entry(item.schedule_id.clone()).or_default();
            if buffer.contains_key(&item.sequence_index) {
                return Err(Error::other(format!(
                    "duplicate sequence index {} for schedule {}",
                    item.sequence_index, item.schedule_id
                )));
            }
            buffer.insert(item.sequence_index, item.clone());
        }
        Ok(items.len())
    }

    fn put_slot_state(&mut self, state: &PersistedSlotState) {
        self.slot_states
            .entry(state.schedule_id.clone())
            .or_default()
            .insert(state.slot_id.clone(), state.clone());
    }

    fn apply_result(&mut self, result: &GenerationResult) -> Result<()> {
        self.insert_items(&result.items)?;
        for slot_state in &result.slot_states {
            self.put_slot_state(slot_state);
        }
        self.schedule_states
            .insert(result.schedule_id.clone(), result.schedule_state.clone());
        if let Some(checkpoint) = &result.checkpoint {
            self.checkpoints
                .entry(checkpoint.schedule_id.clone())
                .or_default()
                .insert(checkpoint.at_ms, checkpoint.clone());
        }
        Ok(())
    }

    fn retain_items(&mut self, schedule_id: &str, keep: impl Fn(&GeneratedScheduleItem) -> bool) -> usize {
        let Some(buffer) = self.items.get_mut(schedule_id) else {
            return 0;
        };
        let before = buffer.len();
        buffer.retain(|_, item| keep(item));
        before - buffer.len()
    }
}

impl ScheduleRepository for MockScheduleRepository {
    fn save_schedule(&self, schedule: &InfiniteSchedule, changes: &SlotStateChanges) -> Result<()> {
        let mut state = self.write()?;
        state.schedules.insert(schedule.id.clone(), schedule.clone());

        if let Some(schedule_state) = &changes.schedule_state {
            state
                .schedule_states
                .entry(schedule.id.clone())
                .or_insert_with(|| schedule_state.clone());
        }
        if let Some(slots) = state.slot_states.get_mut(&schedule.id) {
            for slot_id in &changes.removed {
                slots.remove(slot_id);
            }
        }
        for slot_state in &changes.added {
            state.put_slot_state(slot_state);
        }
        Ok(())
    }

    fn get_schedule(&self, id: &str) -> Result<Option<InfiniteSchedule>> {
        Ok(self.read()?.schedules.get(id).cloned())
    }

    fn list_schedules(&self) -> Result<Vec<InfiniteSchedule>> {
        Ok(self.read()?.schedules.values().cloned().collect())
    }

    fn delete_schedule(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let existed = state.schedules.remove(id).is_some();
        state.schedule_states.remove(id);
        state.slot_states.remove(id);
        state.items.remove(id);
        state.checkpoints.remove(id);
        Ok(existed)
    }

    fn load_schedule_state(&self, schedule_id: &str) -> Result<Option<PersistedScheduleState>> {
        Ok(self.read()?.schedule_states.get(schedule_id).cloned())
    }

    fn save_schedule_state(&self, schedule_state: &PersistedScheduleState) -> Result<()> {
        self.write()?
            .schedule_states
            .insert(schedule_state.schedule_id.clone(), schedule_state.clone());
        Ok(())
    }

    fn load_slot_states(&self, schedule_id: &str) -> Result<Vec<PersistedSlotState>> {
        Ok(self
            .read()?
            .slot_states
            .get(schedule_id)
            .map(|slots| slots.values().cloned().collect())
            .unwrap_or_default())
    }

    fn load_slot_state(&self, schedule_id: &str, slot_id: &str) -> Result<Option<PersistedSlotState>> {
        Ok(self
            .read()?
            .slot_states
            .get(schedule_id)
            .and_then(|slots| slots.get(slot_id))
            .cloned())
    }

    fn save_slot_state(&self, slot_state: &PersistedSlotState) -> Result<()> {
        self.write()?.put_slot_state(slot_state);
        Ok(())
    }

    fn append_items(&self, items: &[GeneratedScheduleItem]) -> Result<usize> {
        let mut state = self.write()?;
        // Validate against a copy so a duplicate leaves nothing behind
        let mut staged = state.clone();
        let count = staged.insert_items(items)?;
        *state = staged;
        Ok(count)
    }

    fn items_in_range(&self, schedule_id: &str, from_ms: i64, to_ms: i64) -> Result<Vec<GeneratedScheduleItem>> {
        Ok(self
            .read()?
            .items
            .get(schedule_id)
            .map(|buffer| {
                buffer
                    .values()
                    .filter(|i| i.start_time_ms < to_ms && i.end_time_ms() > from_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_items_from(&self, schedule_id: &str, from_ms: i64) -> Result<usize> {
        Ok(self
            .write()?
            .retain_items(schedule_id, |i| i.start_time_ms < from_ms))
    }

    fn delete_items_before(&self, schedule_id: &str, before_ms: i64) -> Result<usize> {
        let mut state = self.write()?;
        let deleted = state.retain_items(schedule_id, |i| i.end_time_ms() > before_ms);
        if let Some(checkpoints) = state.checkpoints.get_mut(schedule_id) {
            let newest = checkpoints.range(..=before_ms).next_back().map(|(&at, _)| at);
            if let Some(newest) = newest {
                checkpoints.retain(|&at, _| at >= newest);
            }
        }
        Ok(deleted)
    }

    fn buffer_stats(&self, schedule_id: &str) -> Result<BufferStats> {
        let state = self.read()?;
        let Some(buffer) = state.items.get(schedule_id) else {
            return Ok(BufferStats::default());
        };
        Ok(BufferStats {
            item_count: buffer.len(),
            first_start_ms: buffer.values().map(|i| i.start_time_ms).min(),
            end_ms: buffer.values().map(GeneratedScheduleItem::end_time_ms).max(),
        })
    }

    fn commit_generation(&self, result: &GenerationResult) -> Result<()> {
        let mut state = self.write()?;
        let mut staged = state.clone();
        staged.apply_result(result)?;
        *state = staged;
        Ok(())
    }

    fn latest_checkpoint(&self, schedule_id: &str, at_ms: i64) -> Result<Option<GenerationCheckpoint>> {
        Ok(self
            .read()?
            .checkpoints
            .get(schedule_id)
            .and_then(|checkpoints| checkpoints.range(..=at_ms).next_back())
            .map(|(_, checkpoint)| checkpoint.clone()))
    }

    fn commit_regeneration(&self, clear_from_ms: i64, result: &GenerationResult) -> Result<()> {
        let mut state = self.write()?;
        let mut staged = state.clone();
        staged.retain_items(&result.schedule_id, |i| i.start_time_ms < clear_from_ms);
        if let Some(checkpoints) = staged.checkpoints.get_mut(&result.schedule_id) {
            checkpoints.retain(|&at, _| at < clear_from_ms);
        }
        staged.apply_result(result)?;
        *state = staged;
        Ok(())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create a SQLite-backed schedule repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedScheduleRepository> {
    Ok(Arc::new(SqliteScheduleRepository::new(path)?))
}

/// Create a mock schedule repository (for testing)
pub fn create_mock_repository() -> SharedScheduleRepository {
    Arc::new(MockScheduleRepository::new())
}

// ============================================================================
// Tests
// ============================================================================
