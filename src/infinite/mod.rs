//! Infinite schedules
//!
//! An infinite schedule never ends: its buffer of generated items is
//! extended ahead of now, run after run, from persisted RNG and iterator
//! state so that every extension continues exactly where the previous one
//! stopped.
//!
//! - [`state`]: definitions, persisted state and generated items
//! - [`generator`]: the pure generation function
//! - [`service`]: definition management and transactional commits
//! - [`maintenance`]: periodic buffer extension and pruning

pub mod generator;
pub mod maintenance;
pub mod service;
pub mod state;

pub use generator::{generate, GenerationInput, ResolvedPools};
pub use maintenance::{BufferMaintainer, MaintenanceOutcome, MaintenanceReport, MaintenanceSettings};
pub use service::{GenerationReport, InfiniteScheduleService, ScheduleDiagnostics, SharedPoolProvider};
pub use state::{
    FillMode, GeneratedScheduleItem, GenerationCheckpoint, GenerationResult, InfiniteSchedule, InfiniteSlot,
    ItemType, PersistedScheduleState, PersistedSlotState, SlotSelection,
};
