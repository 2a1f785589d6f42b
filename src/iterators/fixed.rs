//! Iterators that always yield the same item

use super::{IterationState, ProgramIterator};
use crate::models::SlotProgram;
use crate::random::SeededRng;

/// Always yields the same program (redirects)
#[derive(Debug, Clone)]
pub struct StaticIterator {
    program: SlotProgram,
}

impl StaticIterator {
    pub fn new(program: SlotProgram) -> Self {
        Self { program }
    }

    /// Redirect to another channel
    pub fn redirect(channel_id: impl Into<String>) -> Self {
        Self::new(SlotProgram::Redirect {
            channel_id: channel_id.into(),
            duration_ms: 0,
        })
    }
}

impl ProgramIterator for StaticIterator {
    fn current(&mut self, _state: &IterationState, _rng: &mut SeededRng) -> Option<SlotProgram> {
        Some(self.program.clone())
    }

    fn next(&mut self, _rng: &mut SeededRng) {}

    fn reset(&mut self) {}

    fn len(&self) -> usize {
        1
    }
}

/// Flex stretched to whatever time the caller asks for
#[derive(Debug, Clone, Copy, Default)]
pub struct FlexIterator;

impl ProgramIterator for FlexIterator {
    fn current(&mut self, state: &IterationState, _rng: &mut SeededRng) -> Option<SlotProgram> {
        Some(SlotProgram::Flex {
            duration_ms: state.slot_duration_ms.max(0),
        })
    }

    fn next(&mut self, _rng: &mut SeededRng) {}

    fn reset(&mut self) {}

    fn len(&self) -> usize {
        1
    }
}
