//! Building one slot's run
//!
//! A run is what a slot contributes each time it gets airtime: optional head
//! filler, a sequence of program units (pre filler + program + post filler,
//! padded to the configured multiple), optional fallback filler and tail
//! filler, with unused time turned into flex.

use serde::{Deserialize, Serialize};

use crate::iterators::IterationState;
use crate::models::{SlotProgram, SLACK_MS};
use crate::random::SeededRng;
use crate::slots::{FillerPlacement, IteratorArena, SlotImpl};

/// Where unused slot time goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexPreference {
    /// Spread over the run's programs in pad multiples
    #[default]
    Distribute,
    /// Appended after the last program
    End,
}

/// What gets padded to the pad multiple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadStyle {
    /// Every program unit
    #[default]
    Episode,
    /// Only the end of the run
    Slot,
}

/// How much a run may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunLimit {
    /// Pack programs into this much time
    Budget(i64),
    /// Play this many programs
    Count(u32),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunParams {
    pub start_ms: i64,
    pub limit: RunLimit,
    pub pad_ms: i64,
    pub pad_style: PadStyle,
    pub flex: FlexPreference,
}

/// Items of one run, in play order
#[derive(Debug, Clone, Default)]
pub(crate) struct Run {
    pub items: Vec<SlotProgram>,
    pub program_count: usize,
}

impl Run {
    pub(crate) fn duration_ms(&self) -> i64 {
        self.items.iter().map(SlotProgram::duration_ms).sum()
    }
}

#[derive(Debug, Default)]
struct Unit {
    items: Vec<SlotProgram>,
    pad_ms: i64,
}

/// Padding needed to bring `duration_ms` up to a multiple of `pad_ms`.
///
/// Residues within [`SLACK_MS`] of either edge are left alone.
pub fn pad_amount(duration_ms: i64, pad_ms: i64) -> i64 {
    if pad_ms <= 0 {
        return 0;
    }
    let residue = duration_ms.rem_euclid(pad_ms);
    if residue > SLACK_MS && pad_ms - residue > SLACK_MS {
        pad_ms - residue
    } else {
        0
    }
}

/// Round `ts` up to the next multiple of `pad_ms`
pub fn ceil_to_pad(ts: i64, pad_ms: i64) -> i64 {
    if pad_ms <= 0 {
        return ts;
    }
    let residue = ts.rem_euclid(pad_ms);
    if residue == 0 {
        ts
    } else {
        ts + pad_ms - residue
    }
}

pub(crate) fn build_run(
    slot: &SlotImpl,
    arena: &mut IteratorArena,
    rng: &mut SeededRng,
    params: RunParams,
) -> Run {
    let budget = match params.limit {
        RunLimit::Budget(ms) => Some(ms.max(0)),
        RunLimit::Count(_) => None,
    };
    let max_programs = match params.limit {
        RunLimit::Count(n) => n as usize,
        RunLimit::Budget(_) => usize::MAX,
    };
    // Room for head/tail filler when the run has no time budget
    let open_room = params.pad_ms.max(0);

    let mut used = 0i64;
    let mut head = None;
    let mut units: Vec<Unit> = Vec::new();

    if slot.has_filler(FillerPlacement::Head) {
        let room = budget.unwrap_or(open_room);
        let state = IterationState::new(room, params.start_ms);
        if let Some(filler) = slot.pick_filler(FillerPlacement::Head, arena, &state, rng) {
            used += filler.duration_ms();
            head = Some(filler);
        }
    }

    while units.len() < max_programs {
        let remaining = budget.map(|b| b - used);
        if remaining.is_some_and(|r| r <= 0) {
            break;
        }

        let state = IterationState::new(remaining.unwrap_or(open_room), params.start_ms + used);
        let Some(program) = slot.current(arena, &state, rng) else {
            break;
        };

        if program.is_offline() {
            let stretched = remaining.unwrap_or(open_room);
            if units.is_empty() && stretched > 0 {
                slot.advance(arena, rng);
                used += stretched;
                units.push(Unit {
                    items: vec![program.stretched(stretched)],
                    pad_ms: 0,
                });
            }
            break;
        }

        let duration = program.duration_ms();
        if duration <= 0 {
            slot.advance(arena, rng);
            break;
        }
        // The first program always plays; later ones only when they fit
        if !units.is_empty() && remaining.is_some_and(|r| duration > r) {
            break;
        }
        slot.advance(arena, rng);

        let mut unit = Unit::default();
        let mut unit_len = duration;

        if slot.has_filler(FillerPlacement::Pre) {
            let room = match budget {
                Some(b) => b - used - unit_len,
                None => pad_amount(unit_len, params.pad_ms),
            };
            let state = IterationState::new(room, params.start_ms + used);
            if let Some(filler) = slot.pick_filler(FillerPlacement::Pre, arena, &state, rng) {
                unit_len += filler.duration_ms();
                unit.items.push(filler);
            }
        }

        unit.items.push(program);

        if slot.has_filler(FillerPlacement::Post) {
            let room = match budget {
                Some(b) => b - used - unit_len,
                None => pad_amount(unit_len, params.pad_ms),
            };
            let state = IterationState::new(room, params.start_ms + used + unit_len);
            if let Some(filler) = slot.pick_filler(FillerPlacement::Post, arena, &state, rng) {
                unit_len += filler.duration_ms();
                unit.items.push(filler);
            }
        }

        let mut pad = match params.pad_style {
            PadStyle::Episode => pad_amount(unit_len, params.pad_ms),
            PadStyle::Slot => 0,
        };
        if let Some(b) = budget {
            if used + unit_len <= b {
                pad = pad.min(b - used - unit_len);
            }
        }

        used += unit_len + pad;
        unit.pad_ms = pad;
        units.push(unit);
    }

    let mut tail = None;
    if slot.has_filler(FillerPlacement::Tail) {
        let room = budget.map_or(open_room, |b| b - used);
        let state = IterationState::new(room, params.start_ms + used);
        if let Some(filler) = slot.pick_filler(FillerPlacement::Tail, arena, &state, rng) {
            used += filler.duration_ms();
            tail = Some(filler);
        }
    }

    let mut fallback = Vec::new();
    if let Some(b) = budget {
        if slot.has_filler(FillerPlacement::Fallback) {
            while b - used > 0 {
                let state = IterationState::new(b - used, params.start_ms + used);
                match slot.pick_filler(FillerPlacement::Fallback, arena, &state, rng) {
                    Some(filler) => {
                        used += filler.duration_ms();
                        fallback.push(filler);
                    }
                    None => break,
                }
            }
        }
    }

    let mut end_flex = 0;
    if let Some(b) = budget {
        let leftover = b - used;
        if leftover > 0 {
            if units.is_empty() || params.flex == FlexPreference::End {
                end_flex = leftover;
            } else {
                distribute_flex(&mut units, leftover, params.pad_ms);
            }
        }
    } else if params.pad_style == PadStyle::Slot {
        end_flex = pad_amount(used, params.pad_ms);
    }

    let program_count = units.len();
    let mut items = Vec::new();
    items.extend(head);
    for unit in units {
        items.extend(unit.items);
        if unit.pad_ms > 0 {
            items.push(SlotProgram::Flex {
                duration_ms: unit.pad_ms,
            });
        }
    }
    items.extend(fallback);
    if end_flex > 0 {
        items.push(SlotProgram::Flex {
            duration_ms: end_flex,
        });
    }
    items.extend(tail);

    Run {
        items,
        program_count,
    }
}

/// Spread `leftover` over the units in whole pad multiples.
///
/// The sub-pad remainder goes to the last unit; multiples that do not
/// divide evenly go to the units with the least padding first.
fn distribute_flex(units: &mut [Unit], leftover: i64, pad_ms: i64) {
    if units.is_empty() || leftover <= 0 {
        return;
    }

    let step = if pad_ms > 0 { pad_ms } else { 1 };
    let multiples = leftover / step;
    let remainder = leftover % step;
    let count = units.len() as i64;
    let per_unit = multiples / count;
    let extra = (multiples % count) as usize;

    let mut by_pad: Vec<usize> = (0..units.len()).collect();
    by_pad.sort_by_key(|&i| (units[i].pad_ms, i));

    for unit in units.iter_mut() {
        unit.pad_ms += per_unit * step;
    }
    for &i in by_pad.iter().take(extra) {
        units[i].pad_ms += step;
    }
    if let Some(last) = units.last_mut() {
        last.pad_ms += remainder;
    }
}
