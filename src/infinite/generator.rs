//! Infinite schedule generation
//!
//! A pure function of the schedule, its persisted state and the resolved
//! content pools. It never touches storage; the returned
//! [`GenerationResult`] carries the items and state deltas for the caller
//! to commit in one transaction.

use std::collections::HashMap;

use super::state::{
    FillMode, GeneratedScheduleItem, GenerationCheckpoint, GenerationResult, InfiniteSchedule, ItemType,
    PersistedScheduleState, PersistedSlotState, SlotSelection,
};
use crate::iterators::{restore_content_iterator, IterationState, ProgramIterator};
use crate::models::{ContentProgram, SlotProgram, MINUTE_MS};
use crate::random::SeededRng;
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::scheduler::random_slot::{select_round_robin, select_weighted, Candidate, Selection};
use crate::scheduler::run::{ceil_to_pad, pad_amount};
use crate::slots::{content_iterator_for, pool_tag, FillerPlacement, IteratorArena, SlotDefinition, SlotImpl, SlotKind};

/// Item length used when a slot has nothing to play and no pad is set
const EMPTY_SLOT_MS: i64 = 30 * MINUTE_MS;

/// Content pools resolved ahead of generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPools {
    /// Slot id to the programs its content source resolved to
    pub content: HashMap<String, Vec<ContentProgram>>,
    /// Filler list id to its programs
    pub fillers: HashMap<String, Vec<ContentProgram>>,
}

/// Everything generation reads
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub schedule: &'a InfiniteSchedule,
    pub schedule_state: &'a PersistedScheduleState,
    pub slot_states: &'a HashMap<String, PersistedSlotState>,
    pub pools: &'a ResolvedPools,
    pub max_items: usize,
}

struct SlotRuntime {
    slot: SlotImpl,
    fill_mode: FillMode,
    rng: SeededRng,
    state: PersistedSlotState,
    touched: bool,
}

impl SlotRuntime {
    fn run_complete(&self) -> bool {
        self.fill_mode
            .is_complete(self.state.fill_items, self.state.fill_duration_ms)
    }

    fn open_run(&mut self, cursor: i64) {
        self.state.fill_items = 0;
        self.state.fill_duration_ms = 0;
        self.state.last_scheduled_at_ms = Some(cursor);
    }

    fn close_run(&mut self) {
        match self.fill_mode {
            FillMode::Fill => self.state.fill_items = self.state.fill_items.max(1),
            FillMode::Count { count } => self.state.fill_items = self.state.fill_items.max(count),
            FillMode::Duration { duration_ms } => {
                self.state.fill_duration_ms = self.state.fill_duration_ms.max(duration_ms)
            }
        }
    }

    fn record(&mut self, duration_ms: i64) {
        self.state.fill_items = self.state.fill_items.saturating_add(1);
        self.state.fill_duration_ms += duration_ms;
    }
}

/// Appends items at a running cursor with increasing sequence indices
struct Emitter<'a> {
    schedule_id: &'a str,
    cursor: i64,
    next_sequence: u64,
    items: Vec<GeneratedScheduleItem>,
    max_items: usize,
}

impl Emitter<'_> {
    fn push(
        &mut self,
        item_type: ItemType,
        slot_id: Option<&str>,
        program_id: Option<&str>,
        redirect_channel_id: Option<&str>,
        duration_ms: i64,
    ) -> SchedulerResult<()> {
        if duration_ms <= 0 {
            return Ok(());
        }
        if self.items.len() >= self.max_items {
            return Err(SchedulerError::generation_failed(format!(
                "generation exceeded {} items",
                self.max_items
            )));
        }
        self.items.push(GeneratedScheduleItem {
            schedule_id: self.schedule_id.to_string(),
            slot_id: slot_id.map(str::to_string),
            program_id: program_id.map(str::to_string),
            redirect_channel_id: redirect_channel_id.map(str::to_string),
            item_type,
            start_time_ms: self.cursor,
            duration_ms,
            sequence_index: self.next_sequence,
        });
        self.next_sequence += 1;
        self.cursor += duration_ms;
        Ok(())
    }

    fn push_flex(&mut self, slot_id: Option<&str>, duration_ms: i64) -> SchedulerResult<()> {
        self.push(ItemType::Flex, slot_id, None, None, duration_ms)
    }
}

/// Content iterator for a slot, resumed from its persisted position
fn resume_iterator(
    definition: &SlotDefinition,
    programs: Vec<ContentProgram>,
    state: &PersistedSlotState,
    rng: &mut SeededRng,
) -> Box<dyn ProgramIterator> {
    if programs.is_empty() || definition.kind.is_offline() {
        return content_iterator_for(definition, programs, rng);
    }
    restore_content_iterator(
        programs,
        definition.order,
        definition.direction,
        pool_tag(&definition.kind),
        &state.iterator_snapshot(),
        rng,
    )
}

/// Generate items covering `[from_ms, to_ms)`.
///
/// The last item may run past `to_ms`; the next run resumes at
/// `schedule_state.generation_cursor_ms`. An open count or duration run is
/// continued before a new slot is selected.
pub fn generate(input: GenerationInput<'_>, from_ms: i64, to_ms: i64) -> SchedulerResult<GenerationResult> {
    let schedule = input.schedule;
    if to_ms <= from_ms {
        return Err(SchedulerError::generation_failed(format!(
            "empty generation window [{from_ms}, {to_ms})"
        )));
    }

    let mut schedule_state = input.schedule_state.clone();
    let mut emitter = Emitter {
        schedule_id: &schedule.id,
        cursor: from_ms,
        next_sequence: schedule_state.next_sequence_index,
        items: Vec::new(),
        max_items: input.max_items,
    };

    let mut checkpoint = GenerationCheckpoint {
        schedule_id: schedule.id.clone(),
        at_ms: from_ms,
        schedule_state: schedule_state.clone(),
        slot_states: Vec::new(),
    };

    if schedule.slots.is_empty() {
        emitter.push(ItemType::Offline, None, None, None, to_ms - from_ms)?;
        schedule_state.generation_cursor_ms = Some(emitter.cursor);
        schedule_state.next_sequence_index = emitter.next_sequence;
        return Ok(GenerationResult {
            schedule_id: schedule.id.clone(),
            from_ms,
            to_ms,
            items: emitter.items,
            slot_states: Vec::new(),
            schedule_state,
            checkpoint: Some(checkpoint),
        });
    }

    let mut arena = IteratorArena::new();
    let mut runtimes = Vec::with_capacity(schedule.slots.len());
    for infinite_slot in &schedule.slots {
        let definition = &infinite_slot.slot;
        let state = input
            .slot_states
            .get(&definition.id)
            .cloned()
            .unwrap_or_else(|| PersistedSlotState::fresh(&schedule.id, &definition.id));
        let mut rng = SeededRng::restore(&state.rng_position());
        let programs = input.pools.content.get(&definition.id).cloned().unwrap_or_default();

        // Each slot owns its iterator so its position persists independently
        let slot = arena.attach_slot(
            definition.clone(),
            format!("slot:{}", definition.id),
            || Ok(resume_iterator(definition, programs, &state, &mut rng)),
            |filler| Ok(input.pools.fillers.get(&filler.list_id).cloned().unwrap_or_default()),
        )?;

        runtimes.push(SlotRuntime {
            slot,
            fill_mode: infinite_slot.fill_mode,
            rng,
            state,
            touched: false,
        });
    }

    checkpoint.slot_states = runtimes.iter().map(|r| r.state.clone()).collect();

    let mut selection_rng =
        SeededRng::with_discard(&schedule_state.selection_seed, schedule_state.selection_use_count);
    let pad = schedule.pad_ms.max(0);
    let slot_count = runtimes.len();

    while emitter.cursor < to_ms {
        let cursor = emitter.cursor;

        // Offline runs may end off the pad grid
        let gap = pad_amount(cursor, pad);
        if gap > 0 {
            emitter.push_flex(None, gap)?;
            continue;
        }

        let open = schedule_state
            .last_slot_id
            .as_deref()
            .and_then(|id| runtimes.iter().position(|r| r.slot.id() == id))
            .filter(|&idx| !runtimes[idx].run_complete());

        let idx = match open {
            Some(idx) => idx,
            None => {
                let candidates: Vec<Candidate> = runtimes
                    .iter()
                    .map(|r| {
                        Candidate::new(
                            r.slot.definition.weight,
                            r.state.last_scheduled_at_ms,
                            r.slot.definition.cooldown_ms,
                        )
                    })
                    .collect();
                let selection = match schedule.selection {
                    SlotSelection::RoundRobin => {
                        let previous = (schedule_state.rotation_cursor + slot_count - 1) % slot_count;
                        select_round_robin(&candidates, cursor, Some(previous))
                    }
                    SlotSelection::Weighted => select_weighted(&candidates, cursor, false, &mut selection_rng),
                };

                match selection {
                    Selection::Chosen(idx) => {
                        let runtime = &mut runtimes[idx];
                        runtime.open_run(cursor);
                        schedule_state.last_slot_id = Some(runtime.slot.id().to_string());
                        schedule_state.rotation_cursor = (idx + 1) % slot_count;
                        idx
                    }
                    Selection::Wait(wait) => {
                        let resume = ceil_to_pad(cursor + wait.max(1), pad).min(to_ms);
                        tracing::debug!(schedule_id = %schedule.id, cursor, wait, "All slots in cooldown");
                        emitter.push_flex(None, resume - cursor)?;
                        continue;
                    }
                }
            }
        };

        let runtime = &mut runtimes[idx];
        runtime.touched = true;
        play_step(runtime, &mut arena, &mut emitter, pad)?;
    }

    schedule_state.selection_use_count = selection_rng.use_count();
    schedule_state.generation_cursor_ms = Some(emitter.cursor);
    schedule_state.next_sequence_index = emitter.next_sequence;

    let slot_states = runtimes
        .into_iter()
        .filter(|r| r.touched)
        .map(|mut r| {
            let snapshot = arena.get(r.slot.content_iterator()).snapshot();
            r.state.rng_use_count = r.rng.use_count();
            r.state.iterator_position = snapshot.position;
            r.state.shuffle_order = snapshot.order;
            r.state
        })
        .collect();

    Ok(GenerationResult {
        schedule_id: schedule.id.clone(),
        from_ms,
        to_ms,
        items: emitter.items,
        slot_states,
        schedule_state,
        checkpoint: Some(checkpoint),
    })
}

/// Emit the next item of a slot's run, then fill up to the pad boundary
fn play_step(
    runtime: &mut SlotRuntime,
    arena: &mut IteratorArena,
    emitter: &mut Emitter<'_>,
    pad: i64,
) -> SchedulerResult<()> {
    let slot_id = runtime.slot.id().to_string();

    if let SlotKind::Flex | SlotKind::Redirect { .. } = runtime.slot.definition.kind {
        let mut length = match runtime.fill_mode {
            FillMode::Duration { duration_ms } => duration_ms - runtime.state.fill_duration_ms,
            FillMode::Fill | FillMode::Count { .. } => pad,
        };
        if length <= 0 {
            length = EMPTY_SLOT_MS;
        }
        match &runtime.slot.definition.kind {
            SlotKind::Redirect { channel_id } => {
                emitter.push(ItemType::Redirect, Some(slot_id.as_str()), None, Some(channel_id.as_str()), length)?
            }
            _ => emitter.push_flex(Some(slot_id.as_str()), length)?,
        }
        runtime.record(length);
        return Ok(());
    }

    let state = IterationState::new(i64::MAX, emitter.cursor);
    let program = runtime
        .slot
        .current(arena, &state, &mut runtime.rng)
        .filter(|p| p.duration_ms() > 0);

    let Some(program) = program else {
        tracing::warn!(slot_id = %slot_id, "Slot content pool is empty, emitting flex");
        crate::metrics::record_degradation("empty_pool");
        emitter.push_flex(Some(slot_id.as_str()), if pad > 0 { pad } else { EMPTY_SLOT_MS })?;
        runtime.close_run();
        return Ok(());
    };

    runtime.slot.advance(arena, &mut runtime.rng);
    let item_type = match program {
        SlotProgram::Filler { .. } => ItemType::Filler,
        _ => ItemType::Content,
    };
    let program_id = program.program().map(|p| p.id.as_str());
    emitter.push(item_type, Some(slot_id.as_str()), program_id, None, program.duration_ms())?;
    runtime.record(program.duration_ms());

    let mut gap = pad_amount(emitter.cursor, pad);
    while gap > 0 {
        let state = IterationState::new(gap, emitter.cursor);
        let filler = runtime
            .slot
            .pick_filler(FillerPlacement::Post, arena, &state, &mut runtime.rng)
            .or_else(|| {
                runtime
                    .slot
                    .pick_filler(FillerPlacement::Fallback, arena, &state, &mut runtime.rng)
            });
        let Some(filler) = filler else { break };
        let duration = filler.duration_ms();
        emitter.push(
            ItemType::Filler,
            Some(slot_id.as_str()),
            filler.program().map(|p| p.id.as_str()),
            None,
            duration,
        )?;
        gap -= duration;
    }
    emitter.push_flex(Some(slot_id.as_str()), gap)?;
    Ok(())
}
