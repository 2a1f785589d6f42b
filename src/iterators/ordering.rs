//! Sort keys for ordered iteration

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{ContentProgram, ProgramKind};

/// Order in which a slot walks its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOrder {
    /// Natural order: season/episode, track number, release date
    #[default]
    Next,
    Shuffle,
    /// Sorted, then rotated to a random starting point
    OrderedShuffle,
    Alphanumeric,
    Chronological,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort `programs` in place for the given order.
///
/// `Shuffle` leaves the pool untouched. `OrderedShuffle` sorts by the
/// natural (`Next`) key.
pub fn sort_programs(programs: &mut [ContentProgram], order: SlotOrder, direction: Direction) {
    let compare: fn(&ContentProgram, &ContentProgram) -> Ordering = match order {
        SlotOrder::Shuffle => return,
        SlotOrder::Next | SlotOrder::OrderedShuffle => compare_natural,
        SlotOrder::Alphanumeric => compare_title,
        SlotOrder::Chronological => compare_release,
    };

    programs.sort_by(compare);
    if direction == Direction::Desc {
        programs.reverse();
    }
}

fn compare_natural(a: &ContentProgram, b: &ContentProgram) -> Ordering {
    let by_kind = match (a.kind, b.kind) {
        (ProgramKind::Episode, ProgramKind::Episode) => a
            .show_id
            .cmp(&b.show_id)
            .then(a.season.unwrap_or(0).cmp(&b.season.unwrap_or(0)))
            .then(a.episode.unwrap_or(0).cmp(&b.episode.unwrap_or(0))),
        (ProgramKind::Track, ProgramKind::Track) => a
            .show_id
            .cmp(&b.show_id)
            .then(a.track_number.unwrap_or(0).cmp(&b.track_number.unwrap_or(0))),
        _ => compare_dates(a.release_date_ms, b.release_date_ms),
    };
    by_kind.then_with(|| compare_title(a, b))
}

fn compare_title(a: &ContentProgram, b: &ContentProgram) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

fn compare_release(a: &ContentProgram, b: &ContentProgram) -> Ordering {
    compare_dates(a.release_date_ms, b.release_date_ms).then_with(|| compare_title(a, b))
}

/// Dated programs first, missing dates last
fn compare_dates(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
