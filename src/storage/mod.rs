//! Persistence for infinite schedules and play history
//!
//! Both stores follow the same repository pattern: a synchronous
//! `Send + Sync` trait, a SQLite implementation for production and an
//! in-memory mock for tests.

pub mod history;
pub mod repository;

pub use history::{
    MockPlayHistoryRepository, PlayHistoryRepository, SharedPlayHistoryRepository,
    SqlitePlayHistoryRepository,
};
pub use repository::{
    create_mock_repository, create_sqlite_repository, BufferStats, MockScheduleRepository,
    ScheduleRepository, SharedScheduleRepository, SlotStateChanges, SqliteScheduleRepository,
};
