//! Infinite schedule definitions, persisted state and generated items

use serde::{Deserialize, Serialize};

use crate::iterators::IteratorSnapshot;
use crate::random::{RngPosition, SeededRng};
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::slots::SlotDefinition;

// ============================================================================
// Definition
// ============================================================================

/// How long a slot keeps the channel once selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FillMode {
    /// One program per selection
    #[default]
    Fill,
    /// A fixed number of programs per run
    Count { count: u32 },
    /// Programs keep starting while the run has used less than this
    Duration { duration_ms: i64 },
}

impl FillMode {
    /// Whether a run with these counters has finished
    pub fn is_complete(&self, items: u32, duration_ms: i64) -> bool {
        match *self {
            Self::Fill => items >= 1,
            Self::Count { count } => items >= count,
            Self::Duration { duration_ms: limit } => duration_ms >= limit,
        }
    }
}

/// How the next slot of an infinite schedule is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSelection {
    /// Rotate through slots in declaration order, skipping those in cooldown
    #[default]
    RoundRobin,
    /// Weighted draw among slots not in cooldown
    Weighted,
}

impl SlotSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Weighted => "weighted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiniteSlot {
    pub slot: SlotDefinition,
    #[serde(default)]
    pub fill_mode: FillMode,
}

impl InfiniteSlot {
    pub fn new(slot: SlotDefinition, fill_mode: FillMode) -> Self {
        Self { slot, fill_mode }
    }

    pub fn id(&self) -> &str {
        &self.slot.id
    }
}

fn default_buffer_days() -> u32 {
    2
}

/// A channel schedule extended indefinitely into the future
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiniteSchedule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub pad_ms: i64,
    /// How far ahead of now the buffer is kept
    #[serde(default = "default_buffer_days")]
    pub buffer_days: u32,
    #[serde(default)]
    pub selection: SlotSelection,
    #[serde(default)]
    pub slots: Vec<InfiniteSlot>,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl InfiniteSchedule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channel_id: None,
            pad_ms: 0,
            buffer_days: default_buffer_days(),
            selection: SlotSelection::RoundRobin,
            slots: Vec::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_pad(mut self, pad_ms: i64) -> Self {
        self.pad_ms = pad_ms;
        self
    }

    pub fn with_buffer_days(mut self, buffer_days: u32) -> Self {
        self.buffer_days = buffer_days;
        self
    }

    pub fn with_selection(mut self, selection: SlotSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_slot(mut self, slot: InfiniteSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn slot(&self, slot_id: &str) -> Option<&InfiniteSlot> {
        self.slots.iter().find(|s| s.id() == slot_id)
    }
}

// ============================================================================
// Persisted State
// ============================================================================

/// Per-slot state carried between generation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSlotState {
    pub schedule_id: String,
    pub slot_id: String,
    pub rng_seed: Vec<u32>,
    /// Words consumed from the seed so far
    pub rng_use_count: u64,
    pub iterator_position: usize,
    /// Program ids in play order; dropped when the pool size changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_order: Option<Vec<String>>,
    /// Programs played in the current run
    #[serde(default)]
    pub fill_items: u32,
    /// Time used by programs in the current run
    #[serde(default)]
    pub fill_duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scheduled_at_ms: Option<i64>,
}

impl PersistedSlotState {
    /// State for a newly created slot, with a fresh seed
    pub fn fresh(schedule_id: impl Into<String>, slot_id: impl Into<String>) -> Self {
        Self::with_seed(schedule_id, slot_id, SeededRng::generate_seed())
    }

    pub fn with_seed(schedule_id: impl Into<String>, slot_id: impl Into<String>, seed: Vec<u32>) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            slot_id: slot_id.into(),
            rng_seed: seed,
            rng_use_count: 0,
            iterator_position: 0,
            shuffle_order: None,
            fill_items: 0,
            fill_duration_ms: 0,
            last_scheduled_at_ms: None,
        }
    }

    pub fn rng_position(&self) -> RngPosition {
        RngPosition {
            seed: self.rng_seed.clone(),
            use_count: self.rng_use_count,
        }
    }

    pub fn iterator_snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot {
            position: self.iterator_position,
            order: self.shuffle_order.clone(),
        }
    }

    /// Start over from a new seed, forgetting iterator and run progress
    pub fn reseed(&mut self, seed: Vec<u32>) {
        *self = Self::with_seed(std::mem::take(&mut self.schedule_id), std::mem::take(&mut self.slot_id), seed);
    }
}

/// Per-schedule state carried between generation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedScheduleState {
    pub schedule_id: String,
    /// Slot of the most recent selection; its run may still be open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_slot_id: Option<String>,
    /// Next slot index to try for round-robin selection
    #[serde(default)]
    pub rotation_cursor: usize,
    /// Where the next generation run resumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_cursor_ms: Option<i64>,
    pub selection_seed: Vec<u32>,
    #[serde(default)]
    pub selection_use_count: u64,
    #[serde(default)]
    pub next_sequence_index: u64,
}

impl PersistedScheduleState {
    pub fn fresh(schedule_id: impl Into<String>) -> Self {
        Self::with_seed(schedule_id, SeededRng::generate_seed())
    }

    pub fn with_seed(schedule_id: impl Into<String>, seed: Vec<u32>) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            last_slot_id: None,
            rotation_cursor: 0,
            generation_cursor_ms: None,
            selection_seed: seed,
            selection_use_count: 0,
            next_sequence_index: 0,
        }
    }
}

// ============================================================================
// Generated Items
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Content,
    Filler,
    Redirect,
    Flex,
    Offline,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Filler => "filler",
            Self::Redirect => "redirect",
            Self::Flex => "flex",
            Self::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> SchedulerResult<Self> {
        match s {
            "content" => Ok(Self::Content),
            "filler" => Ok(Self::Filler),
            "redirect" => Ok(Self::Redirect),
            "flex" => Ok(Self::Flex),
            "offline" => Ok(Self::Offline),
            other => Err(SchedulerError::invalid_config("item_type", format!("unknown item type '{other}'"))),
        }
    }

    /// Whether the item shows nothing from the catalog
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Flex | Self::Offline | Self::Redirect)
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one generated item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScheduleItem {
    pub schedule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_channel_id: Option<String>,
    pub item_type: ItemType,
    pub start_time_ms: i64,
    pub duration_ms: i64,
    pub sequence_index: u64,
}

impl GeneratedScheduleItem {
    pub fn end_time_ms(&self) -> i64 {
        self.start_time_ms + self.duration_ms
    }
}

/// Everything one generation run produced, for the caller to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub schedule_id: String,
    pub from_ms: i64,
    pub to_ms: i64,
    pub items: Vec<GeneratedScheduleItem>,
    /// New state of every slot the run touched
    pub slot_states: Vec<PersistedSlotState>,
    pub schedule_state: PersistedScheduleState,
    /// State the run started from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<GenerationCheckpoint>,
}

/// Complete schedule and slot state at an item boundary
///
/// Every committed run stores the state it started from, so a buffer cut
/// later can be rewound by replaying from the nearest earlier checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCheckpoint {
    pub schedule_id: String,
    pub at_ms: i64,
    pub schedule_state: PersistedScheduleState,
    pub slot_states: Vec<PersistedSlotState>,
}

impl GenerationResult {
    /// End of the last generated item, or `from_ms` when nothing was generated
    pub fn end_ms(&self) -> i64 {
        self.items
            .last()
            .map(GeneratedScheduleItem::end_time_ms)
            .unwrap_or(self.from_ms)
    }
}
