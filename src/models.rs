// Core data structures shared by iterators, schedulers and the generator

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Time constants (milliseconds)
// ============================================================================

pub const SECOND_MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const WEEK_MS: i64 = 7 * DAY_MS;

/// Tolerance used when comparing program edges, pad residues and cooldowns
pub const SLACK_MS: i64 = 9_999;

// ============================================================================
// Content Programs
// ============================================================================

/// Kind of playable content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    Movie,
    Episode,
    Track,
    MusicVideo,
    OtherVideo,
}

impl ProgramKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Episode => "episode",
            Self::Track => "track",
            Self::MusicVideo => "music_video",
            Self::OtherVideo => "other_video",
        }
    }

    /// Parse from string
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Some(Self::Movie),
            "episode" => Some(Self::Episode),
            "track" => Some(Self::Track),
            "music_video" | "musicvideo" => Some(Self::MusicVideo),
            "other_video" | "othervideo" => Some(Self::OtherVideo),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A playable item from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProgram {
    pub id: String,
    pub title: String,
    pub duration_ms: i64,
    pub kind: ProgramKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    /// Original air / release date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date_ms: Option<i64>,
}

impl ContentProgram {
    /// Create a program with no grouping or sort metadata
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: ProgramKind,
        duration_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_ms,
            kind,
            show_id: None,
            season: None,
            episode: None,
            track_number: None,
            release_date_ms: None,
        }
    }

    /// Create an episode of a show
    pub fn episode(
        id: impl Into<String>,
        show_id: impl Into<String>,
        season: u32,
        episode: u32,
        duration_ms: i64,
    ) -> Self {
        let show_id = show_id.into();
        let mut program = Self::new(
            id,
            format!("{show_id} S{season:02}E{episode:02}"),
            ProgramKind::Episode,
            duration_ms,
        );
        program.show_id = Some(show_id);
        program.season = Some(season);
        program.episode = Some(episode);
        program
    }

    /// Create a movie
    pub fn movie(id: impl Into<String>, title: impl Into<String>, duration_ms: i64) -> Self {
        Self::new(id, title, ProgramKind::Movie, duration_ms)
    }

    /// Set release date
    pub fn with_release_date(mut self, release_date_ms: i64) -> Self {
        self.release_date_ms = Some(release_date_ms);
        self
    }

    /// Set track number
    pub fn with_track_number(mut self, track: u32) -> Self {
        self.track_number = Some(track);
        self
    }

    /// Set show grouping
    pub fn with_show(mut self, show_id: impl Into<String>) -> Self {
        self.show_id = Some(show_id.into());
        self
    }
}

// ============================================================================
// Slot Programs
// ============================================================================

/// What a slot yields for the next position in a lineup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotProgram {
    Content {
        program: ContentProgram,
    },
    CustomShow {
        custom_show_id: String,
        program: ContentProgram,
    },
    Filler {
        list_id: String,
        program: ContentProgram,
    },
    Redirect {
        channel_id: String,
        duration_ms: i64,
    },
    Flex {
        duration_ms: i64,
    },
}

impl SlotProgram {
    /// Duration of this item
    pub fn duration_ms(&self) -> i64 {
        match self {
            Self::Content { program }
            | Self::CustomShow { program, .. }
            | Self::Filler { program, .. } => program.duration_ms,
            Self::Redirect { duration_ms, .. } | Self::Flex { duration_ms } => *duration_ms,
        }
    }

    /// Flex and redirect items have no intrinsic length and stretch to fit
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Redirect { .. } | Self::Flex { .. })
    }

    /// Underlying catalog program, if any
    pub fn program(&self) -> Option<&ContentProgram> {
        match self {
            Self::Content { program }
            | Self::CustomShow { program, .. }
            | Self::Filler { program, .. } => Some(program),
            Self::Redirect { .. } | Self::Flex { .. } => None,
        }
    }

    /// Return a copy stretched (or shrunk) to `duration_ms`.
    ///
    /// Only offline items change; catalog programs keep their own length.
    pub fn stretched(&self, duration_ms: i64) -> Self {
        match self {
            Self::Redirect { channel_id, .. } => Self::Redirect {
                channel_id: channel_id.clone(),
                duration_ms,
            },
            Self::Flex { .. } => Self::Flex { duration_ms },
            other => other.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
