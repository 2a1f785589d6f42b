// Slot wrapper: binds a slot definition to its iterators

use std::collections::HashMap;

use crate::iterators::{
    build_content_iterator, FlexIterator, IterationState, PoolTag, ProgramIterator,
    StaticIterator, WeightedFillerIterator,
};
use crate::models::{ContentProgram, SlotProgram};
use crate::pool::{PoolSource, ProgramPool};
use crate::random::SeededRng;
use crate::scheduler::error::SchedulerResult;

use super::types::{FillerPlacement, SlotDefinition, SlotFiller, SlotKind};

// ============================================================================
// Iterator Arena
// ============================================================================

/// Handle to an iterator owned by an [`IteratorArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorId(usize);

/// Owns every iterator of one scheduling run.
///
/// Iterators are registered under a key; slots registering the same key get
/// the same iterator, so they advance through one shared position.
#[derive(Default)]
pub struct IteratorArena {
    iterators: Vec<Box<dyn ProgramIterator>>,
    by_key: HashMap<String, IteratorId>,
}

impl IteratorArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the iterator registered under `key`, building it on first use
    pub fn get_or_insert_with(
        &mut self,
        key: String,
        build: impl FnOnce() -> SchedulerResult<Box<dyn ProgramIterator>>,
    ) -> SchedulerResult<IteratorId> {
        if let Some(id) = self.by_key.get(&key) {
            return Ok(*id);
        }
        let id = IteratorId(self.iterators.len());
        self.iterators.push(build()?);
        self.by_key.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: IteratorId) -> &dyn ProgramIterator {
        self.iterators[id.0].as_ref()
    }

    pub fn get_mut(&mut self, id: IteratorId) -> &mut dyn ProgramIterator {
        self.iterators[id.0].as_mut()
    }

    pub fn len(&self) -> usize {
        self.iterators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterators.is_empty()
    }

    /// Register a slot, building its content iterator and one weighted
    /// iterator per attached filler list
    pub fn attach_slot(
        &mut self,
        definition: SlotDefinition,
        content_key: String,
        content: impl FnOnce() -> SchedulerResult<Box<dyn ProgramIterator>>,
        mut filler_programs: impl FnMut(&SlotFiller) -> SchedulerResult<Vec<ContentProgram>>,
    ) -> SchedulerResult<SlotImpl> {
        let content = self.get_or_insert_with(content_key, content)?;

        let mut fillers = Vec::with_capacity(definition.fillers.len());
        for filler in &definition.fillers {
            let iterator = self.get_or_insert_with(filler.iterator_key(), || {
                let programs = filler_programs(filler)?;
                Ok(Box::new(WeightedFillerIterator::new(
                    programs,
                    filler.weighting,
                    filler.order.preference(),
                    PoolTag::Filler(filler.list_id.clone()),
                )) as Box<dyn ProgramIterator>)
            })?;
            fillers.push(AttachedFiller {
                placements: filler.placements.clone(),
                iterator,
            });
        }

        Ok(SlotImpl {
            definition,
            content,
            fillers,
        })
    }
}

// ============================================================================
// Slot
// ============================================================================

#[derive(Debug, Clone)]
struct AttachedFiller {
    placements: Vec<FillerPlacement>,
    iterator: IteratorId,
}

/// A slot ready for scheduling
#[derive(Debug, Clone)]
pub struct SlotImpl {
    pub definition: SlotDefinition,
    content: IteratorId,
    fillers: Vec<AttachedFiller>,
}

impl SlotImpl {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn content_iterator(&self) -> IteratorId {
        self.content
    }

    /// Peek at the slot's next program
    pub fn current(
        &self,
        arena: &mut IteratorArena,
        state: &IterationState,
        rng: &mut SeededRng,
    ) -> Option<SlotProgram> {
        arena.get_mut(self.content).current(state, rng)
    }

    /// Consume the program returned by [`SlotImpl::current`]
    pub fn advance(&self, arena: &mut IteratorArena, rng: &mut SeededRng) {
        arena.get_mut(self.content).next(rng);
    }

    pub fn has_filler(&self, placement: FillerPlacement) -> bool {
        self.fillers.iter().any(|f| f.placements.contains(&placement))
    }

    /// Pick one filler for `placement` that fits `state.slot_duration_ms`.
    ///
    /// Lists are tried in declaration order; the first fitting item wins
    /// and is consumed.
    pub fn pick_filler(
        &self,
        placement: FillerPlacement,
        arena: &mut IteratorArena,
        state: &IterationState,
        rng: &mut SeededRng,
    ) -> Option<SlotProgram> {
        if state.slot_duration_ms <= 0 {
            return None;
        }

        for filler in self.fillers.iter().filter(|f| f.placements.contains(&placement)) {
            let iterator = arena.get_mut(filler.iterator);
            if let Some(program) = iterator.current(state, rng) {
                let duration = program.duration_ms();
                if duration > 0 && duration <= state.slot_duration_ms {
                    iterator.next(rng);
                    return Some(program);
                }
            }
        }
        None
    }
}

// ============================================================================
// Building from a pool
// ============================================================================

/// Build the content iterator a slot kind calls for
pub fn content_iterator_for(
    definition: &SlotDefinition,
    programs: Vec<ContentProgram>,
    rng: &mut SeededRng,
) -> Box<dyn ProgramIterator> {
    match &definition.kind {
        SlotKind::Flex => Box::new(FlexIterator),
        SlotKind::Redirect { channel_id } => Box::new(StaticIterator::redirect(channel_id.clone())),
        kind => {
            if programs.is_empty() {
                tracing::warn!(slot_id = %definition.id, kind = kind.as_str(), "Slot content pool is empty, degrading to flex");
                crate::metrics::record_degradation("empty_pool");
            }
            build_content_iterator(
                programs,
                definition.order,
                definition.direction,
                pool_tag(kind),
                rng,
            )
        }
    }
}

/// How programs from a slot kind's pool are tagged
pub fn pool_tag(kind: &SlotKind) -> PoolTag {
    match kind {
        SlotKind::CustomShow { custom_show_id } => PoolTag::CustomShow(custom_show_id.clone()),
        SlotKind::Filler { filler_list_id } => PoolTag::Filler(filler_list_id.clone()),
        _ => PoolTag::Content,
    }
}

/// Build every slot of a schedule against one pool.
///
/// Slots on the same source and ordering share an iterator, as do
/// identical filler attachments.
pub fn build_slots<'a>(
    definitions: impl IntoIterator<Item = &'a SlotDefinition>,
    pool: &ProgramPool,
    rng: &mut SeededRng,
) -> SchedulerResult<(IteratorArena, Vec<SlotImpl>)> {
    let mut arena = IteratorArena::new();
    let mut slots = Vec::new();

    for definition in definitions {
        let slot = arena.attach_slot(
            definition.clone(),
            definition.iterator_key(),
            || {
                let programs = match definition.kind.pool_source() {
                    Some(source) => pool.resolve_source(&source)?,
                    None => Vec::new(),
                };
                Ok(content_iterator_for(definition, programs, rng))
            },
            |filler| {
                pool.resolve_source(&PoolSource::FillerList {
                    list_id: filler.list_id.clone(),
                })
            },
        )?;
        slots.push(slot);
    }

    Ok((arena, slots))
}
