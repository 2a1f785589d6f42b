//! Error types for the scheduling engine

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Referenced schedule, slot or channel does not exist
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Schedule definition rejected before any state mutation
    InvalidConfiguration {
        field: String,
        reason: String,
    },

    /// A slot's content pool resolved to zero eligible items
    EmptyPool {
        slot_id: String,
    },

    /// Smart-collection search filter could not be parsed
    UnparseableFilter {
        filter: String,
        reason: String,
    },

    /// Generation aborted
    GenerationFailed {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => {
                write!(f, "{} not found: {}", entity, id)
            }
            Self::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration in '{}': {}", field, reason)
            }
            Self::EmptyPool { slot_id } => {
                write!(f, "Content pool for slot '{}' is empty", slot_id)
            }
            Self::UnparseableFilter { filter, reason } => {
                write!(f, "Unparseable filter '{}': {}", filter, reason)
            }
            Self::GenerationFailed { reason } => {
                write!(f, "Failed to generate schedule: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an empty pool error
    pub fn empty_pool(slot_id: impl Into<String>) -> Self {
        Self::EmptyPool {
            slot_id: slot_id.into(),
        }
    }

    /// Create an unparseable filter error
    pub fn unparseable_filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnparseableFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Create a generation failure
    pub fn generation_failed(reason: impl Into<String>) -> Self {
        Self::GenerationFailed {
            reason: reason.into(),
        }
    }

    /// Degradable errors are logged and replaced by a fallback instead of
    /// being surfaced to the caller
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::EmptyPool { .. } | Self::UnparseableFilter { .. })
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::GenerationFailed { .. })
    }
}
