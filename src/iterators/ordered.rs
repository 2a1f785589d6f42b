//! Sorted, wrapping iteration

use super::ordering::{sort_programs, Direction, SlotOrder};
use super::{IterationState, IteratorSnapshot, PoolTag, ProgramIterator};
use crate::models::{ContentProgram, SlotProgram};
use crate::random::SeededRng;

/// Walks a pool sorted once at construction; position wraps modulo pool size
#[derive(Debug, Clone)]
pub struct OrderedIterator {
    programs: Vec<ContentProgram>,
    position: usize,
    tag: PoolTag,
}

impl OrderedIterator {
    pub fn new(
        mut programs: Vec<ContentProgram>,
        order: SlotOrder,
        direction: Direction,
        tag: PoolTag,
    ) -> Self {
        sort_programs(&mut programs, order, direction);
        Self {
            programs,
            position: 0,
            tag,
        }
    }
}

impl ProgramIterator for OrderedIterator {
    fn current(&mut self, _state: &IterationState, _rng: &mut SeededRng) -> Option<SlotProgram> {
        self.programs.get(self.position).map(|p| self.tag.wrap(p))
    }

    fn next(&mut self, _rng: &mut SeededRng) {
        if !self.programs.is_empty() {
            self.position = (self.position + 1) % self.programs.len();
        }
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn len(&self) -> usize {
        self.programs.len()
    }

    fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot {
            position: self.position,
            order: None,
        }
    }

    fn restore(&mut self, snapshot: &IteratorSnapshot) -> bool {
        if self.programs.is_empty() {
            self.position = 0;
            return snapshot.position == 0;
        }
        self.position = snapshot.position % self.programs.len();
        true
    }
}
