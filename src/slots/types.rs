// Slot configuration types

use serde::{Deserialize, Serialize};

use crate::iterators::{Direction, DurationWeighting, SlotOrder, WeightPreference};
use crate::pool::PoolSource;

// ============================================================================
// Slot Kind
// ============================================================================

/// What a slot plays
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SlotKind {
    Movie,
    Show { show_id: String },
    CustomShow { custom_show_id: String },
    Filler { filler_list_id: String },
    Redirect { channel_id: String },
    Flex,
    SmartCollection { collection_id: String },
}

impl SlotKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show { .. } => "show",
            Self::CustomShow { .. } => "custom-show",
            Self::Filler { .. } => "filler",
            Self::Redirect { .. } => "redirect",
            Self::Flex => "flex",
            Self::SmartCollection { .. } => "smart-collection",
        }
    }

    /// Content source, `None` for redirect and flex
    pub fn pool_source(&self) -> Option<PoolSource> {
        match self {
            Self::Movie => Some(PoolSource::Movies),
            Self::Show { show_id } => Some(PoolSource::Show {
                show_id: show_id.clone(),
            }),
            Self::CustomShow { custom_show_id } => Some(PoolSource::CustomShow {
                custom_show_id: custom_show_id.clone(),
            }),
            Self::Filler { filler_list_id } => Some(PoolSource::FillerList {
                list_id: filler_list_id.clone(),
            }),
            Self::SmartCollection { collection_id } => Some(PoolSource::SmartCollection {
                collection_id: collection_id.clone(),
            }),
            Self::Redirect { .. } | Self::Flex => None,
        }
    }

    /// Redirect and flex have no intrinsic length
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Redirect { .. } | Self::Flex)
    }
}

// ============================================================================
// Slot Filler
// ============================================================================

/// Where a slot's filler is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerPlacement {
    /// Once before the slot's run
    Head,
    /// Before every program
    Pre,
    /// After every program
    Post,
    /// Once after the slot's run
    Tail,
    /// Fills time left over before flex is distributed
    Fallback,
}

/// Draw order for a slot's filler list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerOrder {
    #[default]
    Uniform,
    ShufflePreferShort,
    ShufflePreferLong,
}

impl FillerOrder {
    pub fn preference(self) -> WeightPreference {
        match self {
            Self::Uniform => WeightPreference::Uniform,
            Self::ShufflePreferShort => WeightPreference::PreferShort,
            Self::ShufflePreferLong => WeightPreference::PreferLong,
        }
    }
}

/// Filler list attached to a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFiller {
    pub list_id: String,
    pub placements: Vec<FillerPlacement>,
    #[serde(default)]
    pub order: FillerOrder,
    #[serde(default)]
    pub weighting: DurationWeighting,
}

impl SlotFiller {
    pub fn new(list_id: impl Into<String>, placements: &[FillerPlacement]) -> Self {
        Self {
            list_id: list_id.into(),
            placements: placements.to_vec(),
            order: FillerOrder::Uniform,
            weighting: DurationWeighting::Linear,
        }
    }

    pub fn with_order(mut self, order: FillerOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_weighting(mut self, weighting: DurationWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn covers(&self, placement: FillerPlacement) -> bool {
        self.placements.contains(&placement)
    }

    /// Key for sharing one weighted iterator between slots
    pub fn iterator_key(&self) -> String {
        format!("filler:{}:{:?}:{:?}", self.list_id, self.order, self.weighting)
    }
}

// ============================================================================
// Slot Definition
// ============================================================================

fn default_weight() -> f64 {
    1.0
}

/// Configuration shared by every slot type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub id: String,
    pub kind: SlotKind,
    /// Relative weight for random selection
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Minimum time between two selections of this slot
    #[serde(default)]
    pub cooldown_ms: i64,
    #[serde(default)]
    pub order: SlotOrder,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub fillers: Vec<SlotFiller>,
}

impl SlotDefinition {
    pub fn new(id: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            id: id.into(),
            kind,
            weight: 1.0,
            cooldown_ms: 0,
            order: SlotOrder::Next,
            direction: Direction::Asc,
            fillers: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_cooldown(mut self, cooldown_ms: i64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_order(mut self, order: SlotOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_filler(mut self, filler: SlotFiller) -> Self {
        self.fillers.push(filler);
        self
    }

    /// Key for the iterator serving this slot's content.
    ///
    /// Slots with the same source and ordering share one iterator, so two
    /// slots on the same show continue each other's episodes.
    pub fn iterator_key(&self) -> String {
        let target = match (&self.kind, self.kind.pool_source()) {
            (_, Some(source)) => source.key(),
            (SlotKind::Redirect { channel_id }, None) => format!("redirect:{channel_id}"),
            _ => "flex".to_string(),
        };
        format!("{target}:{:?}:{:?}", self.order, self.direction)
    }
}

// ============================================================================
// Durations and Placement
// ============================================================================

/// How long a random slot's run lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SlotDuration {
    /// Pack programs into a fixed time budget
    Fixed { duration_ms: i64 },
    /// Play a fixed number of programs
    Dynamic { program_count: u32 },
}

/// Slot anchored at an offset into the schedule period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_offset_ms: i64,
    pub slot: SlotDefinition,
}

impl TimeSlot {
    pub fn new(start_offset_ms: i64, slot: SlotDefinition) -> Self {
        Self {
            start_offset_ms,
            slot,
        }
    }
}

/// Floating slot competing for airtime by weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSlot {
    pub slot: SlotDefinition,
    pub duration: SlotDuration,
}

impl RandomSlot {
    pub fn new(slot: SlotDefinition, duration: SlotDuration) -> Self {
        Self { slot, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_kind_serde() {
        let kind = SlotKind::CustomShow {
            custom_show_id: "cs1".into(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"custom-show\""));

        let parsed: SlotKind = serde_json::from_str(r#"{"type":"smart-collection","collection_id":"c"}"#).unwrap();
        assert_eq!(parsed.as_str(), "smart-collection");
    }

    #[test]
    fn test_definition_defaults() {
        let def: SlotDefinition = serde_json::from_str(r#"{"id":"s","kind":{"type":"movie"}}"#).unwrap();
        assert_eq!(def.weight, 1.0);
        assert_eq!(def.cooldown_ms, 0);
        assert_eq!(def.order, SlotOrder::Next);
        assert!(def.fillers.is_empty());
    }

    #[test]
    fn test_iterator_key_shares_by_source_and_order() {
        let a = SlotDefinition::new("a", SlotKind::Show { show_id: "x".into() });
        let b = SlotDefinition::new("b", SlotKind::Show { show_id: "x".into() });
        let c = SlotDefinition::new("c", SlotKind::Show { show_id: "x".into() }).with_order(SlotOrder::Shuffle);
        assert_eq!(a.iterator_key(), b.iterator_key());
        assert_ne!(a.iterator_key(), c.iterator_key());
    }

    #[test]
    fn test_offline_kinds_have_no_source() {
        assert!(SlotKind::Flex.pool_source().is_none());
        assert!(SlotKind::Redirect { channel_id: "c".into() }.is_offline());
        assert!(!SlotKind::Movie.is_offline());
    }

    #[test]
    fn test_slot_duration_serde() {
        let parsed: SlotDuration = serde_json::from_str(r#"{"mode":"dynamic","program_count":3}"#).unwrap();
        assert_eq!(parsed, SlotDuration::Dynamic { program_count: 3 });
    }
}
