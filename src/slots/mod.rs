//! Slot definitions and the slot wrapper
//!
//! - [`types`] - serializable slot configuration (kind, weight, cooldown,
//!   ordering, attached filler lists, duration specs)
//! - [`slot_impl`] - [`SlotImpl`] binds a definition to iterators owned by
//!   an [`IteratorArena`] and exposes "current program", "advance" and
//!   "pick filler"

pub mod slot_impl;
pub mod types;

pub use slot_impl::{build_slots, content_iterator_for, pool_tag, IteratorArena, IteratorId, SlotImpl};
pub use types::{
    FillerOrder, FillerPlacement, RandomSlot, SlotDefinition, SlotDuration, SlotFiller, SlotKind,
    TimeSlot,
};
