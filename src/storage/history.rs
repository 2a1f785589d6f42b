//! Per-channel play history
//!
//! The filler picker scores candidates by how recently they played, so the
//! history of a channel is kept here and read back for a lookback window.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::filler::PlayRecord;

/// Storage port for play history
pub trait PlayHistoryRepository: Send + Sync {
    /// Record one play of a program on a channel
    fn record_play(&self, channel_id: &str, record: &PlayRecord) -> Result<()>;

    /// Plays on a channel at or after `since_ms`, oldest first
    fn history_for_channel(&self, channel_id: &str, since_ms: i64) -> Result<Vec<PlayRecord>>;

    /// Forget plays older than `before_ms`; returns the number removed
    fn prune_history(&self, before_ms: i64) -> Result<usize>;
}

/// Shared play history repository
pub type SharedPlayHistoryRepository = Arc<dyn PlayHistoryRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqlitePlayHistoryRepository {
    conn: Mutex<Connection>,
}

impl SqlitePlayHistoryRepository {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite play history initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let repo = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("SQLite connection lock poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS play_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    channel_id TEXT NOT NULL,
                    program_id TEXT NOT NULL,
                    list_id TEXT,
                    played_at_ms INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_play_history_channel
                    ON play_history(channel_id, played_at_ms);
                "#,
        )?;
        Ok(())
    }
}

impl PlayHistoryRepository for SqlitePlayHistoryRepository {
    fn record_play(&self, channel_id: &str, record: &PlayRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO play_history (channel_id, program_id, list_id, played_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![channel_id, record.program_id, record.list_id, record.played_at_ms],
        )?;
        Ok(())
    }

    fn history_for_channel(&self, channel_id: &str, since_ms: i64) -> Result<Vec<PlayRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT program_id, list_id, played_at_ms FROM play_history
                WHERE channel_id = ?1 AND played_at_ms >= ?2
                ORDER BY played_at_ms, id
                "#,
        )?;
        let records = stmt
            .query_map(params![channel_id, since_ms], |row| {
                Ok(PlayRecord {
                    program_id: row.get(0)?,
                    list_id: row.get(1)?,
                    played_at_ms: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn prune_history(&self, before_ms: i64) -> Result<usize> {
        let removed = self
            .conn()?
            .execute("DELETE FROM play_history WHERE played_at_ms < ?1", params![before_ms])?;
        Ok(removed)
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

#[derive(Default)]
pub struct MockPlayHistoryRepository {
    plays: RwLock<HashMap<String, Vec<PlayRecord>>>,
}

impl MockPlayHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayHistoryRepository for MockPlayHistoryRepository {
    fn record_play(&self, channel_id: &str, record: &PlayRecord) -> Result<()> {
        let mut plays = self
            .plays
            .write()
            .map_err(|_| Error::other("Mock history lock poisoned"))?;
        let channel = plays.entry(channel_id.to_string()).or_default();
        channel.push(record.clone());
        channel.sort_by_key(|r| r.played_at_ms);
        Ok(())
    }

    fn history_for_channel(&self, channel_id: &str, since_ms: i64) -> Result<Vec<PlayRecord>> {
        let plays = self
            .plays
            .read()
            .map_err(|_| Error::other("Mock history lock poisoned"))?;
        Ok(plays
            .get(channel_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.played_at_ms >= since_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn prune_history(&self, before_ms: i64) -> Result<usize> {
        let mut plays = self
            .plays
            .write()
            .map_err(|_| Error::other("Mock history lock poisoned"))?;
        let mut removed = 0;
        for records in plays.values_mut() {
            let before = records.len();
            records.retain(|r| r.played_at_ms >= before_ms);
            removed += before - records.len();
        }
        Ok(removed)
    }
}
