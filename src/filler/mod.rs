//! Runtime filler selection
//!
//! Used when a channel needs one filler item to cover a gap of known length
//! right now, outside any pre-built lineup. Selection works directly on the
//! channel's play history (see [`crate::storage::PlayHistoryRepository`])
//! instead of iterator state:
//!
//! 1. Lists are considered in declaration order; each one that has an
//!    eligible program enters a weighted draw against the lists before it.
//! 2. Within the winning list, programs compete on a score combining how
//!    long ago they were played with their duration.
//! 3. When nothing is eligible the result reports how long to wait until
//!    something comes off cooldown.

pub mod picker;

pub use picker::{
    norm_d, norm_s, ChannelFillerList, FillerPick, FillerPicker, PlayRecord, MAX_SAFE_INTEGER,
};
