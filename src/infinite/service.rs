//! Infinite schedule service
//!
//! Orchestrates definitions, persisted state and generation on top of the
//! storage and content-pool ports. Generation itself is a pure function
//! ([`generate`]); this layer loads its inputs, resolves pools, and applies
//! the result in a single repository transaction.
//!
//! Only one generation per schedule may be in flight at a time; a second
//! concurrent request for the same schedule fails fast instead of racing on
//! the persisted RNG and iterator positions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::generator::{generate, GenerationInput, ResolvedPools};
use super::state::{
    GeneratedScheduleItem, GenerationCheckpoint, GenerationResult, InfiniteSchedule, PersistedScheduleState,
    PersistedSlotState,
};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{ContentProgram, DAY_MS};
use crate::pool::{ContentPoolProvider, PoolSource};
use crate::random::{SeededRng, SEED_WORDS};
use crate::scheduler::error::SchedulerError;
use crate::scheduler::{validate_infinite_schedule, validate_resolved_pool, DEFAULT_MAX_ITEMS};
use crate::storage::{BufferStats, SharedScheduleRepository, SlotStateChanges};

/// Shared content pool provider
pub type SharedPoolProvider = Arc<dyn ContentPoolProvider>;

// ============================================================================
// Reports
// ============================================================================

/// Outcome of a committed generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub schedule_id: String,
    pub from_ms: i64,
    pub to_ms: i64,
    pub item_count: usize,
    /// Buffer end after the run
    pub end_ms: i64,
}

/// Persisted state and buffer figures for one schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDiagnostics {
    pub schedule_id: String,
    pub item_count: usize,
    pub buffer_start_ms: Option<i64>,
    pub buffer_end_ms: Option<i64>,
    pub schedule_state: Option<PersistedScheduleState>,
    pub slot_states: Vec<PersistedSlotState>,
    /// Slots of the definition without persisted state
    pub missing_slot_states: Vec<String>,
    /// Persisted states whose slot no longer exists
    pub orphaned_slot_states: Vec<String>,
}

// ============================================================================
// In-flight guard
// ============================================================================

/// Removes the schedule from the in-flight set when dropped
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    schedule_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.schedule_id);
        }
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct InfiniteScheduleService {
    repo: SharedScheduleRepository,
    pools: SharedPoolProvider,
    max_items: usize,
    default_buffer_days: u32,
    in_flight: Mutex<HashSet<String>>,
}

impl InfiniteScheduleService {
    pub fn new(repo: SharedScheduleRepository, pools: SharedPoolProvider) -> Self {
        Self {
            repo,
            pools,
            max_items: DEFAULT_MAX_ITEMS,
            default_buffer_days: 2,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Cap on items produced by a single generation run
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Buffer length used when a schedule sets `buffer_days` to 0
    pub fn with_default_buffer_days(mut self, days: u32) -> Self {
        self.default_buffer_days = days;
        self
    }

    pub fn repository(&self) -> &SharedScheduleRepository {
        &self.repo
    }

    /// Whether a generation for this schedule is currently running
    pub fn is_in_flight(&self, schedule_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(schedule_id))
            .unwrap_or(false)
    }

    fn acquire(&self, schedule_id: &str) -> Result<InFlightGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| Error::other("in-flight set lock poisoned"))?;
        if !set.insert(schedule_id.to_string()) {
            return Err(SchedulerError::generation_failed(format!(
                "generation already in flight for schedule {schedule_id}"
            ))
            .into());
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            schedule_id: schedule_id.to_string(),
        })
    }

    fn buffer_ms(&self, schedule: &InfiniteSchedule) -> i64 {
        let days = if schedule.buffer_days > 0 {
            schedule.buffer_days
        } else {
            self.default_buffer_days
        };
        i64::from(days) * DAY_MS
    }

    // ------------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------------

    pub fn get_schedule(&self, id: &str) -> Result<InfiniteSchedule> {
        self.repo
            .get_schedule(id)?
            .ok_or_else(|| SchedulerError::not_found("schedule", id).into())
    }

    pub fn list_schedules(&self) -> Result<Vec<InfiniteSchedule>> {
        self.repo.list_schedules()
    }

    /// Store a new schedule and create state for every slot
    pub fn create_schedule(&self, mut schedule: InfiniteSchedule, now_ms: i64) -> Result<InfiniteSchedule> {
        validate_infinite_schedule(&schedule)?;
        if self.repo.get_schedule(&schedule.id)?.is_some() {
            return Err(SchedulerError::invalid_config("id", format!("schedule '{}' already exists", schedule.id)).into());
        }
        schedule.created_at_ms = now_ms;
        schedule.updated_at_ms = now_ms;

        let changes = SlotStateChanges {
            schedule_state: Some(PersistedScheduleState::fresh(&schedule.id)),
            added: schedule
                .slots
                .iter()
                .map(|s| PersistedSlotState::fresh(&schedule.id, s.id()))
                .collect(),
            removed: Vec::new(),
        };
        self.repo.save_schedule(&schedule, &changes)?;

        tracing::info!(schedule_id = %schedule.id, slots = schedule.slots.len(), "Infinite schedule created");
        Ok(schedule)
    }

    /// Replace a schedule definition
    ///
    /// New slots and slots whose kind changed get fresh state; state of
    /// removed slots is deleted. Everything else keeps its position.
    pub fn update_schedule(&self, mut schedule: InfiniteSchedule, now_ms: i64) -> Result<InfiniteSchedule> {
        validate_infinite_schedule(&schedule)?;
        let existing = self.get_schedule(&schedule.id)?;
        let states: HashMap<String, PersistedSlotState> = self
            .repo
            .load_slot_states(&schedule.id)?
            .into_iter()
            .map(|s| (s.slot_id.clone(), s))
            .collect();

        let added = schedule
            .slots
            .iter()
            .filter(|slot| {
                let kind_changed = existing
                    .slot(slot.id())
                    .is_some_and(|old| old.slot.kind != slot.slot.kind);
                kind_changed || !states.contains_key(slot.id())
            })
            .map(|slot| PersistedSlotState::fresh(&schedule.id, slot.id()))
            .collect::<Vec<_>>();
        let removed = states
            .keys()
            .filter(|id| schedule.slot(id).is_none())
            .cloned()
            .collect::<Vec<_>>();

        schedule.created_at_ms = existing.created_at_ms;
        schedule.updated_at_ms = now_ms;
        let changes = SlotStateChanges {
            schedule_state: Some(PersistedScheduleState::fresh(&schedule.id)),
            added,
            removed,
        };
        self.repo.save_schedule(&schedule, &changes)?;

        tracing::info!(
            schedule_id = %schedule.id,
            added = changes.added.len(),
            removed = changes.removed.len(),
            "Infinite schedule updated"
        );
        Ok(schedule)
    }

    pub fn delete_schedule(&self, id: &str) -> Result<bool> {
        let deleted = self.repo.delete_schedule(id)?;
        if deleted {
            tracing::info!(schedule_id = %id, "Infinite schedule deleted");
        }
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------------

    async fn resolve(&self, source: &PoolSource, slot_id: &str) -> Result<Vec<ContentProgram>> {
        match self.pools.resolve(source).await {
            Ok(programs) => Ok(programs),
            Err(e) if e.is_degradable() => {
                tracing::warn!(slot_id = %slot_id, source = %source.key(), error = %e, "Pool degraded to empty");
                metrics::record_degradation("empty_pool");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the content and filler pools of every slot
    pub async fn resolve_pools(&self, schedule: &InfiniteSchedule) -> Result<ResolvedPools> {
        let mut pools = ResolvedPools::default();
        for slot in &schedule.slots {
            let definition = &slot.slot;
            if let Some(source) = definition.kind.pool_source() {
                let programs = self.resolve(&source, slot.id()).await?;
                validate_resolved_pool(definition, &programs)?;
                pools.content.insert(slot.id().to_string(), programs);
            }
            for filler in &definition.fillers {
                if pools.fillers.contains_key(&filler.list_id) {
                    continue;
                }
                let source = PoolSource::FillerList {
                    list_id: filler.list_id.clone(),
                };
                let programs = self.resolve(&source, slot.id()).await?;
                pools.fillers.insert(filler.list_id.clone(), programs);
            }
        }
        Ok(pools)
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Load the persisted state, creating anything missing
    fn load_state(
        &self,
        schedule: &InfiniteSchedule,
    ) -> Result<(PersistedScheduleState, HashMap<String, PersistedSlotState>)> {
        let schedule_state = match self.repo.load_schedule_state(&schedule.id)? {
            Some(state) => state,
            None => {
                let state = PersistedScheduleState::fresh(&schedule.id);
                self.repo.save_schedule_state(&state)?;
                state
            }
        };

        let mut slot_states: HashMap<String, PersistedSlotState> = self
            .repo
            .load_slot_states(&schedule.id)?
            .into_iter()
            .map(|s| (s.slot_id.clone(), s))
            .collect();
        for slot in &schedule.slots {
            if !slot_states.contains_key(slot.id()) {
                let state = PersistedSlotState::fresh(&schedule.id, slot.id());
                self.repo.save_slot_state(&state)?;
                slot_states.insert(slot.id().to_string(), state);
            }
        }
        Ok((schedule_state, slot_states))
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_with(
        &self,
        schedule: &InfiniteSchedule,
        schedule_state: &PersistedScheduleState,
        slot_states: &HashMap<String, PersistedSlotState>,
        pools: &ResolvedPools,
        from_ms: i64,
        to_ms: i64,
        mode: &str,
    ) -> Result<GenerationResult> {
        let _timer = metrics::start_generation_timer(mode);
        let input = GenerationInput {
            schedule,
            schedule_state,
            slot_states,
            pools,
            max_items: self.max_items,
        };
        Ok(generate(input, from_ms, to_ms)?)
    }

    async fn run_generation(
        &self,
        schedule: &InfiniteSchedule,
        schedule_state: &PersistedScheduleState,
        slot_states: &HashMap<String, PersistedSlotState>,
        from_ms: i64,
        to_ms: i64,
        mode: &str,
    ) -> Result<GenerationResult> {
        let pools = self.resolve_pools(schedule).await?;
        self.generate_with(schedule, schedule_state, slot_states, &pools, from_ms, to_ms, mode)
    }

    /// Generate and persist items for a schedule
    ///
    /// The default window starts at the buffer end (or `now_ms` when the
    /// buffer is empty or stale) and ends `buffer_days` after `now_ms`.
    pub async fn generate_and_commit(
        &self,
        schedule_id: &str,
        now_ms: i64,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<GenerationReport> {
        let _guard = self.acquire(schedule_id)?;
        let schedule = self.get_schedule(schedule_id)?;
        let (schedule_state, slot_states) = self.load_state(&schedule)?;

        let buffer_end = self.repo.buffer_end_time(schedule_id)?;
        let from_ms = from_ms.unwrap_or_else(|| buffer_end.map_or(now_ms, |end| end.max(now_ms)));
        let to_ms = to_ms.unwrap_or(now_ms + self.buffer_ms(&schedule));

        if to_ms <= from_ms {
            tracing::debug!(schedule_id = %schedule_id, from_ms, to_ms, "Buffer already covers window");
            return Ok(GenerationReport {
                schedule_id: schedule_id.to_string(),
                from_ms,
                to_ms,
                item_count: 0,
                end_ms: buffer_end.unwrap_or(from_ms),
            });
        }

        tracing::info!(schedule_id = %schedule_id, from_ms, to_ms, "Generating schedule items");
        let result = self
            .run_generation(&schedule, &schedule_state, &slot_states, from_ms, to_ms, "commit")
            .await?;
        self.repo.commit_generation(&result)?;
        record_item_metrics(&result.items);

        tracing::info!(
            schedule_id = %schedule_id,
            items = result.items.len(),
            end_ms = result.end_ms(),
            "Generation committed"
        );
        Ok(GenerationReport {
            schedule_id: schedule_id.to_string(),
            from_ms,
            to_ms,
            item_count: result.items.len(),
            end_ms: result.end_ms(),
        })
    }

    /// Generate from the persisted state without writing anything
    pub async fn preview(&self, schedule_id: &str, from_ms: i64, to_ms: i64) -> Result<Vec<GeneratedScheduleItem>> {
        let schedule = self.get_schedule(schedule_id)?;
        let schedule_state = self
            .repo
            .load_schedule_state(schedule_id)?
            .unwrap_or_else(|| PersistedScheduleState::fresh(schedule_id));
        let slot_states: HashMap<String, PersistedSlotState> = self
            .repo
            .load_slot_states(schedule_id)?
            .into_iter()
            .map(|s| (s.slot_id.clone(), s))
            .collect();

        let result = self
            .run_generation(&schedule, &schedule_state, &slot_states, from_ms, to_ms, "preview")
            .await?;
        Ok(result.items)
    }

    /// Generate for an unsaved definition
    ///
    /// The definition gets a throwaway id and every state is derived from
    /// `seed`, so the same seed previews the same items. Without a seed a
    /// fresh one is drawn.
    pub async fn preview_definition(
        &self,
        schedule: &InfiniteSchedule,
        from_ms: i64,
        to_ms: i64,
        seed: Option<Vec<u32>>,
    ) -> Result<Vec<GeneratedScheduleItem>> {
        validate_infinite_schedule(schedule)?;
        let mut ephemeral = schedule.clone();
        ephemeral.id = format!("preview-{}", uuid::Uuid::new_v4());

        let seed = seed.unwrap_or_else(SeededRng::generate_seed);
        let mut seeds = SeededRng::from_seed(&seed);
        let schedule_state = PersistedScheduleState::with_seed(&ephemeral.id, derive_seed(&mut seeds));
        let slot_states: HashMap<String, PersistedSlotState> = ephemeral
            .slots
            .iter()
            .map(|slot| {
                let state = PersistedSlotState::with_seed(&ephemeral.id, slot.id(), derive_seed(&mut seeds));
                (slot.id().to_string(), state)
            })
            .collect();

        let result = self
            .run_generation(&ephemeral, &schedule_state, &slot_states, from_ms, to_ms, "preview")
            .await?;
        Ok(result
            .items
            .into_iter()
            .map(|mut item| {
                item.schedule_id = schedule.id.clone();
                item
            })
            .collect())
    }

    /// Regenerate the buffer
    ///
    /// With `clear`, items starting at or after `now_ms` are dropped and the
    /// persisted state is rewound to the end of the last kept item, so new
    /// items continue exactly where the kept ones stop. With nothing kept
    /// the schedule starts over from its seeds at `now_ms`.
    pub async fn regenerate(&self, schedule_id: &str, now_ms: i64, clear: bool) -> Result<GenerationReport> {
        if !clear {
            self.get_schedule(schedule_id)?;
            return self.generate_and_commit(schedule_id, now_ms, None, None).await;
        }

        let _guard = self.acquire(schedule_id)?;
        let schedule = self.get_schedule(schedule_id)?;
        let (current_state, current_slots) = self.load_state(&schedule)?;
        let pools = self.resolve_pools(&schedule).await?;

        let kept: Vec<GeneratedScheduleItem> = self
            .repo
            .items_in_range(schedule_id, i64::MIN, now_ms)?
            .into_iter()
            .filter(|item| item.start_time_ms < now_ms)
            .collect();

        let Rewound {
            mut schedule_state,
            slot_states,
            carried,
            end_ms,
        } = if kept.is_empty() {
            let (schedule_state, slot_states) = restart_state(&current_state, &current_slots);
            Rewound {
                schedule_state,
                slot_states,
                carried: Vec::new(),
                end_ms: now_ms,
            }
        } else {
            self.rewind(&schedule, &pools, &kept, &current_state, &current_slots)?
        };
        let mut slot_states =
            reconcile_seeds(&schedule, &mut schedule_state, slot_states, &current_state, &current_slots);

        let from_ms = end_ms.max(now_ms);
        let to_ms = now_ms + self.buffer_ms(&schedule);
        let mut result = if to_ms > from_ms {
            self.generate_with(&schedule, &schedule_state, &slot_states, &pools, from_ms, to_ms, "regenerate")?
        } else {
            GenerationResult {
                schedule_id: schedule_id.to_string(),
                from_ms,
                to_ms,
                items: Vec::new(),
                slot_states: Vec::new(),
                schedule_state: schedule_state.clone(),
                checkpoint: Some(GenerationCheckpoint {
                    schedule_id: schedule_id.to_string(),
                    at_ms: from_ms,
                    schedule_state: schedule_state.clone(),
                    slot_states: slot_states.values().cloned().collect(),
                }),
            }
        };

        // Rest of the step the last kept item belongs to
        if !carried.is_empty() {
            result.items.splice(0..0, carried);
        }

        // Untouched slots were rewound as well, so every state is written
        for state in std::mem::take(&mut result.slot_states) {
            slot_states.insert(state.slot_id.clone(), state);
        }
        let mut all_states: Vec<PersistedSlotState> = slot_states.into_values().collect();
        all_states.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
        result.slot_states = all_states;

        self.repo.commit_regeneration(now_ms, &result)?;
        record_item_metrics(&result.items);

        tracing::info!(
            schedule_id = %schedule_id,
            kept = kept.len(),
            items = result.items.len(),
            end_ms = result.end_ms(),
            "Buffer regenerated"
        );
        Ok(GenerationReport {
            schedule_id: schedule_id.to_string(),
            from_ms,
            to_ms,
            item_count: result.items.len(),
            end_ms: result.end_ms(),
        })
    }

    /// State at the end of the last kept item
    ///
    /// Replays from the newest checkpoint at or before that point, or from
    /// the seeds at the oldest kept item when no checkpoint exists. A step
    /// always runs to its pad boundary, so when the cut splits a content item
    /// from its filler the remainder of the step is carried over.
    fn rewind(
        &self,
        schedule: &InfiniteSchedule,
        pools: &ResolvedPools,
        kept: &[GeneratedScheduleItem],
        current_state: &PersistedScheduleState,
        current_slots: &HashMap<String, PersistedSlotState>,
    ) -> Result<Rewound> {
        let (Some(first), Some(last)) = (kept.first(), kept.last()) else {
            let (schedule_state, slot_states) = restart_state(current_state, current_slots);
            return Ok(Rewound {
                schedule_state,
                slot_states,
                carried: Vec::new(),
                end_ms: 0,
            });
        };
        let boundary = last.end_time_ms();

        let (start_ms, mut schedule_state, mut slot_states) =
            match self.repo.latest_checkpoint(&schedule.id, boundary)? {
                Some(checkpoint) => {
                    let slots: HashMap<String, PersistedSlotState> = checkpoint
                        .slot_states
                        .into_iter()
                        .map(|s| (s.slot_id.clone(), s))
                        .collect();
                    (checkpoint.at_ms, checkpoint.schedule_state, slots)
                }
                None => {
                    let (mut state, slots) = restart_state(current_state, current_slots);
                    state.next_sequence_index = first.sequence_index;
                    (first.start_time_ms, state, slots)
                }
            };

        let mut carried = Vec::new();
        let mut end_ms = boundary;
        if boundary > start_ms {
            let replay = self.generate_with(schedule, &schedule_state, &slot_states, pools, start_ms, boundary, "replay")?;
            end_ms = replay.end_ms();
            let (replayed, rest): (Vec<GeneratedScheduleItem>, Vec<GeneratedScheduleItem>) =
                replay.items.into_iter().partition(|item| item.start_time_ms < boundary);
            carried = rest;

            let expected: Vec<&GeneratedScheduleItem> =
                kept.iter().filter(|item| item.start_time_ms >= start_ms).collect();
            let reproduced =
                replayed.len() == expected.len() && replayed.iter().zip(&expected).all(|(a, b)| a == *b);
            if !reproduced {
                tracing::warn!(
                    schedule_id = %schedule.id,
                    start_ms,
                    boundary,
                    "Replay differs from kept items, continuing from replayed state"
                );
            }
            schedule_state = replay.schedule_state;
            for state in replay.slot_states {
                slot_states.insert(state.slot_id.clone(), state);
            }
        }

        let mut next_sequence = last.sequence_index + 1;
        for item in &mut carried {
            item.sequence_index = next_sequence;
            next_sequence += 1;
        }
        schedule_state.generation_cursor_ms = Some(end_ms);
        schedule_state.next_sequence_index = next_sequence;
        Ok(Rewound {
            schedule_state,
            slot_states,
            carried,
            end_ms,
        })
    }

    /// Give every slot and the selection stream a fresh seed
    ///
    /// Iterator positions and open runs restart; the generation cursor and
    /// sequence numbering continue.
    pub fn reset_seeds(&self, schedule_id: &str) -> Result<()> {
        let _guard = self.acquire(schedule_id)?;
        let schedule = self.get_schedule(schedule_id)?;
        let (schedule_state, mut slot_states) = self.load_state(&schedule)?;

        let mut reset = PersistedScheduleState::fresh(schedule_id);
        reset.generation_cursor_ms = schedule_state.generation_cursor_ms;
        reset.next_sequence_index = schedule_state.next_sequence_index;
        for state in slot_states.values_mut() {
            state.reseed(SeededRng::generate_seed());
        }
        let slot_states: Vec<PersistedSlotState> = slot_states.into_values().collect();

        // The new seeds take over at the cursor
        let at_ms = reset.generation_cursor_ms.unwrap_or(0);
        let checkpoint = reset.generation_cursor_ms.map(|at_ms| GenerationCheckpoint {
            schedule_id: schedule_id.to_string(),
            at_ms,
            schedule_state: reset.clone(),
            slot_states: slot_states.clone(),
        });
        let result = GenerationResult {
            schedule_id: schedule_id.to_string(),
            from_ms: at_ms,
            to_ms: at_ms,
            items: Vec::new(),
            slot_states,
            schedule_state: reset,
            checkpoint,
        };
        self.repo.commit_generation(&result)?;

        tracing::info!(schedule_id = %schedule_id, slots = result.slot_states.len(), "Seeds reset");
        Ok(())
    }

    pub fn diagnostics(&self, schedule_id: &str) -> Result<ScheduleDiagnostics> {
        let schedule = self.get_schedule(schedule_id)?;
        let BufferStats {
            item_count,
            first_start_ms,
            end_ms,
        } = self.repo.buffer_stats(schedule_id)?;
        let slot_states = self.repo.load_slot_states(schedule_id)?;

        let known: HashSet<&str> = slot_states.iter().map(|s| s.slot_id.as_str()).collect();
        let missing_slot_states = schedule
            .slots
            .iter()
            .filter(|s| !known.contains(s.id()))
            .map(|s| s.id().to_string())
            .collect();
        let orphaned_slot_states = slot_states
            .iter()
            .filter(|s| schedule.slot(&s.slot_id).is_none())
            .map(|s| s.slot_id.clone())
            .collect();

        Ok(ScheduleDiagnostics {
            schedule_id: schedule_id.to_string(),
            item_count,
            buffer_start_ms: first_start_ms,
            buffer_end_ms: end_ms,
            schedule_state: self.repo.load_schedule_state(schedule_id)?,
            slot_states,
            missing_slot_states,
            orphaned_slot_states,
        })
    }
}

/// Persisted state rewound to the end of the kept items
struct Rewound {
    schedule_state: PersistedScheduleState,
    slot_states: HashMap<String, PersistedSlotState>,
    /// Replayed items past the cut that finish the last kept step
    carried: Vec<GeneratedScheduleItem>,
    end_ms: i64,
}

/// State that replays a schedule from its seeds
fn restart_state(
    current_state: &PersistedScheduleState,
    current_slots: &HashMap<String, PersistedSlotState>,
) -> (PersistedScheduleState, HashMap<String, PersistedSlotState>) {
    let mut state = PersistedScheduleState::with_seed(&current_state.schedule_id, current_state.selection_seed.clone());
    state.next_sequence_index = current_state.next_sequence_index;
    let slots = current_slots
        .iter()
        .map(|(id, slot_state)| {
            let mut restarted = slot_state.clone();
            restarted.reseed(slot_state.rng_seed.clone());
            (id.clone(), restarted)
        })
        .collect();
    (state, slots)
}

/// Keep rewound positions only where the seed is still the current one.
///
/// Seeds replaced after the checkpoint (reset, or a slot whose kind
/// changed) start over on the new seed; slots no longer defined are
/// dropped.
fn reconcile_seeds(
    schedule: &InfiniteSchedule,
    schedule_state: &mut PersistedScheduleState,
    mut rewound: HashMap<String, PersistedSlotState>,
    current_state: &PersistedScheduleState,
    current_slots: &HashMap<String, PersistedSlotState>,
) -> HashMap<String, PersistedSlotState> {
    if schedule_state.selection_seed != current_state.selection_seed {
        schedule_state.selection_seed = current_state.selection_seed.clone();
        schedule_state.selection_use_count = 0;
    }
    schedule
        .slots
        .iter()
        .filter_map(|slot| {
            let current = current_slots.get(slot.id())?;
            let state = match rewound.remove(slot.id()) {
                Some(state) if state.rng_seed == current.rng_seed => state,
                _ => {
                    let mut restarted = current.clone();
                    restarted.reseed(current.rng_seed.clone());
                    restarted
                }
            };
            Some((slot.id().to_string(), state))
        })
        .collect()
}

fn derive_seed(rng: &mut SeededRng) -> Vec<u32> {
    (0..SEED_WORDS)
        .map(|_| rng.integer(0, i64::from(u32::MAX)) as u32)
        .collect()
}

fn record_item_metrics(items: &[GeneratedScheduleItem]) {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.item_type.as_str()).or_default() += 1;
    }
    for (item_type, count) in counts {
        metrics::record_items_generated(item_type, count);
    }
}
