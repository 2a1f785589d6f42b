//! Lineup output of the time-slot and random-slot schedulers

use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use crate::models::SlotProgram;

/// One entry of a lineup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupItem {
    pub start_ms: i64,
    pub duration_ms: i64,
    /// Slot that produced the item; `None` for padding between slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    pub program: SlotProgram,
}

impl LineupItem {
    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.duration_ms
    }

    pub fn kind(&self) -> &'static str {
        match self.program {
            SlotProgram::Content { .. } | SlotProgram::CustomShow { .. } => "content",
            SlotProgram::Filler { .. } => "filler",
            SlotProgram::Redirect { .. } => "redirect",
            SlotProgram::Flex { .. } => "flex",
        }
    }

    pub fn is_flex(&self) -> bool {
        matches!(self.program, SlotProgram::Flex { .. })
    }
}

/// Ordered, contiguous program lineup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    pub start_time_ms: i64,
    pub items: Vec<LineupItem>,
    /// Seed words the run was generated from
    pub seed: Vec<u32>,
    /// Words discarded before the run started; with `seed` this reproduces it
    pub discard_count: u64,
    /// Stream position when the run finished; a follow-up run discarding
    /// this many words continues the same stream
    pub final_use_count: u64,
}

impl Lineup {
    pub fn end_ms(&self) -> i64 {
        self.items
            .last()
            .map(LineupItem::end_ms)
            .unwrap_or(self.start_time_ms)
    }

    /// Items carrying catalog content (not filler, flex or redirect)
    pub fn content(&self) -> impl Iterator<Item = &LineupItem> {
        self.items.iter().filter(|i| i.kind() == "content")
    }

    /// Whether every item starts exactly where the previous one ended
    pub fn is_contiguous(&self) -> bool {
        let mut cursor = self.start_time_ms;
        for item in &self.items {
            if item.start_ms != cursor || item.duration_ms <= 0 {
                return false;
            }
            cursor = item.end_ms();
        }
        true
    }
}

/// Appends items at a running cursor, merging adjacent flex
#[derive(Debug)]
pub(crate) struct LineupBuilder {
    start_ms: i64,
    cursor: i64,
    items: Vec<LineupItem>,
    max_items: usize,
}

impl LineupBuilder {
    pub(crate) fn new(start_ms: i64, max_items: usize) -> Self {
        Self {
            start_ms,
            cursor: start_ms,
            items: Vec::new(),
            max_items,
        }
    }

    pub(crate) fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Append a program; zero-length items are dropped
    pub(crate) fn push(&mut self, program: SlotProgram, slot_id: Option<&str>) -> SchedulerResult<()> {
        let duration_ms = program.duration_ms();
        if duration_ms <= 0 {
            return Ok(());
        }

        if let SlotProgram::Flex { .. } = program {
            if let Some(last) = self.items.last_mut() {
                if let SlotProgram::Flex { duration_ms: ref mut merged } = last.program {
                    *merged += duration_ms;
                    last.duration_ms += duration_ms;
                    self.cursor += duration_ms;
                    return Ok(());
                }
            }
        }

        if self.items.len() >= self.max_items {
            return Err(SchedulerError::generation_failed(format!(
                "lineup exceeded {} items",
                self.max_items
            )));
        }

        self.items.push(LineupItem {
            start_ms: self.cursor,
            duration_ms,
            slot_id: slot_id.map(str::to_string),
            program,
        });
        self.cursor += duration_ms;
        Ok(())
    }

    pub(crate) fn push_flex(&mut self, duration_ms: i64) -> SchedulerResult<()> {
        self.push(SlotProgram::Flex { duration_ms }, None)
    }

    pub(crate) fn finish(self, seed: Vec<u32>, discard_count: u64, final_use_count: u64) -> Lineup {
        Lineup {
            start_time_ms: self.start_ms,
            items: self.items,
            seed,
            discard_count,
            final_use_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentProgram, MINUTE_MS};

    fn content(minutes: i64) -> SlotProgram {
        SlotProgram::Content {
            program: ContentProgram::movie("m", "M", minutes * MINUTE_MS),
        }
    }

    #[test]
    fn test_adjacent_flex_merged() {
        let mut builder = LineupBuilder::new(0, 100);
        builder.push(content(25), Some("s")).unwrap();
        builder.push_flex(2 * MINUTE_MS).unwrap();
        builder.push_flex(3 * MINUTE_MS).unwrap();
        builder.push(content(30), Some("s")).unwrap();

        let lineup = builder.finish(vec![1], 0, 0);
        assert_eq!(lineup.items.len(), 3);
        assert_eq!(lineup.items[1].duration_ms, 5 * MINUTE_MS);
        assert_eq!(lineup.items[1].program.duration_ms(), 5 * MINUTE_MS);
        assert_eq!(lineup.items[2].start_ms, 30 * MINUTE_MS);
        assert!(lineup.is_contiguous());
        assert_eq!(lineup.end_ms(), 60 * MINUTE_MS);
    }

    #[test]
    fn test_zero_length_dropped() {
        let mut builder = LineupBuilder::new(10, 100);
        builder.push_flex(0).unwrap();
        assert_eq!(builder.cursor(), 10);
        assert!(builder.finish(vec![], 0, 0).items.is_empty());
    }

    #[test]
    fn test_item_cap() {
        let mut builder = LineupBuilder::new(0, 1);
        builder.push(content(1), None).unwrap();
        // Flex merges into nothing here, so it needs a fresh entry
        let err = builder.push_flex(MINUTE_MS).unwrap_err();
        assert!(matches!(err, SchedulerError::GenerationFailed { .. }));
    }

    #[test]
    fn test_kind_labels() {
        let item = LineupItem {
            start_ms: 0,
            duration_ms: 1,
            slot_id: None,
            program: SlotProgram::Flex { duration_ms: 1 },
        };
        assert_eq!(item.kind(), "flex");
        assert!(item.is_flex());
    }
}
