//! lineup - scheduling engine for a personal linear-television emulator
//!
//! Turns a catalog of programs and a set of slot rules into a gap-free
//! lineup of timed items for a channel.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`random`] - Seedable, resumable random source
//! - [`models`] - Programs, time constants and lineup items
//! - [`iterators`] - Ordered, shuffled and weighted program iterators
//! - [`pool`] - Program catalog and smart-collection filters
//! - [`slots`] - Slot definitions and their runtime wrappers
//! - [`scheduler`] - Time-slot and random-slot schedulers
//! - [`filler`] - Play-history driven filler picker
//! - [`infinite`] - Infinite schedules, generation service and buffer maintenance
//! - [`storage`] - Persistence (SQLite)
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use lineup::pool::ProgramPool;
//! use lineup::scheduler::{RunOptions, TimeSlotSchedule, TimeSlotScheduler};
//!
//! fn main() -> anyhow::Result<()> {
//!     let schedule: TimeSlotSchedule = serde_json::from_str(&std::fs::read_to_string("schedule.json")?)?;
//!     let pool: ProgramPool = serde_json::from_str(&std::fs::read_to_string("pool.json")?)?;
//!     let lineup = TimeSlotScheduler::new(&schedule, &pool).generate(&RunOptions::starting_at(0))?;
//!     println!("{} items", lineup.items.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filler;
pub mod infinite;
pub mod iterators;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod random;
pub mod scheduler;
pub mod slots;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, LineupErrorTrait, Result};
    pub use crate::filler::{ChannelFillerList, FillerPick, FillerPicker, PlayRecord};
    pub use crate::infinite::{
        BufferMaintainer, FillMode, GeneratedScheduleItem, InfiniteSchedule, InfiniteScheduleService,
        InfiniteSlot, ItemType, SlotSelection,
    };
    pub use crate::models::{ContentProgram, SlotProgram};
    pub use crate::pool::{ContentPoolProvider, PoolSource, ProgramPool};
    pub use crate::random::SeededRng;
    pub use crate::scheduler::{
        Lineup, LineupItem, RandomSlotSchedule, RandomSlotScheduler, RunOptions, SchedulerError,
        TimeSlotSchedule, TimeSlotScheduler,
    };
    pub use crate::slots::{RandomSlot, SlotDefinition, SlotKind, TimeSlot};
    pub use crate::storage::{ScheduleRepository, SqliteScheduleRepository};
}

// Direct re-exports for convenience
pub use models::{ContentProgram, SlotProgram};
