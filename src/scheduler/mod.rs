//! Lineup schedulers
//!
//! This module turns slot-based channel schedules into concrete, gap-free
//! program lineups. Both schedulers share the slot wrapper from
//! [`crate::slots`] and the run builder in [`run`].
//!
//! # Modules
//!
//! - [`time_slot`] - slots pinned to offsets within a repeating day or week
//! - [`random_slot`] - weighted-random floating slots with cooldowns
//! - [`run`] - one slot's uninterrupted stretch of programs, filler and flex
//! - [`lineup`] - output types
//! - [`validation`] - schedule checks performed before generation
//! - [`error`] - [`SchedulerError`]
//!
//! # Reproducibility
//!
//! Every run is driven by a single [`SeededRng`](crate::random::SeededRng).
//! A lineup records its seed, the number of words discarded before it began,
//! and the stream position when it finished. Generating again with the same
//! seed and discard count, program pool and play history yields the identical
//! lineup; discarding `final_use_count` words continues the stream.
//!
//! ```ignore
//! use lineup::scheduler::{RunOptions, TimeSlotSchedule, TimeSlotScheduler};
//!
//! let lineup = TimeSlotScheduler::new(&schedule, &pool)
//!     .generate(&RunOptions::starting_at(now_ms).with_seed(vec![7, 7, 7]))?;
//! assert!(lineup.is_contiguous());
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod lineup;
pub mod random_slot;
pub mod run;
pub mod time_slot;
pub mod validation;

pub use error::{SchedulerError, SchedulerResult};
pub use lineup::{Lineup, LineupItem};
pub use random_slot::{RandomDistribution, RandomSlotSchedule, RandomSlotScheduler};
pub use run::{ceil_to_pad, pad_amount, FlexPreference, PadStyle};
pub use time_slot::{period_start, SchedulePeriod, TimeSlotSchedule, TimeSlotScheduler};
pub use validation::{
    validate_infinite_schedule, validate_random_slot_schedule, validate_resolved_pool,
    validate_slot_pools, validate_time_slot_schedule,
};

/// Upper bound on lineup length before generation is abandoned
pub const DEFAULT_MAX_ITEMS: usize = 50_000;

/// Parameters of a single lineup generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Requested start; schedulers may align it to a period or pad boundary
    pub start_ms: i64,
    /// Seed words; a fresh seed is generated when absent
    #[serde(default)]
    pub seed: Option<Vec<u32>>,
    #[serde(default)]
    pub discard_count: u64,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Slot id to the start of its most recent run, for cooldowns spanning runs
    #[serde(default)]
    pub last_played: HashMap<String, i64>,
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

impl RunOptions {
    pub fn starting_at(start_ms: i64) -> Self {
        Self {
            start_ms,
            seed: None,
            discard_count: 0,
            max_items: DEFAULT_MAX_ITEMS,
            last_played: HashMap::new(),
        }
    }

    pub fn with_seed(mut self, seed: Vec<u32>) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_discard(mut self, discard_count: u64) -> Self {
        self.discard_count = discard_count;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_last_played(mut self, last_played: HashMap<String, i64>) -> Self {
        self.last_played = last_played;
        self
    }
}
