//! Error types shared with feed consumers
//!
//! `EventIndexError` is the failure kind surfaced when a derived record is
//! requested for an identifier the cache cannot resolve, or when a stored
//! raw value cannot be converted into its derived form.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventIndexError {
    #[error("Event result not found: {id}")]
    UnknownEventResult { id: u64 },

    #[error("Event not found: {id}")]
    UnknownEvent { id: u64 },

    #[error("Tournament not found: {id}")]
    UnknownTournament { id: u64 },

    #[error("Market group not found: {id}")]
    UnknownMarketGroup { id: u64 },

    #[error("Odds not found: {id}")]
    UnknownOdds { id: u64 },

    #[error("Invalid {field} on {entity} {id}: {value}")]
    InvalidValue {
        entity: &'static str,
        id: u64,
        field: &'static str,
        value: String,
    },

    #[error("Line number {line} out of range for odds {id}")]
    LineOutOfRange { id: u64, line: u32 },

    #[error("Cannot derive sub event result id for {id}")]
    SubIdentityOverflow { id: u64 },
}

impl EventIndexError {
    /// Identifier the failing lookup or conversion was made for.
    pub fn id(&self) -> u64 {
        match self {
            EventIndexError::UnknownEventResult { id }
            | EventIndexError::UnknownEvent { id }
            | EventIndexError::UnknownTournament { id }
            | EventIndexError::UnknownMarketGroup { id }
            | EventIndexError::UnknownOdds { id }
            | EventIndexError::InvalidValue { id, .. }
            | EventIndexError::LineOutOfRange { id, .. }
            | EventIndexError::SubIdentityOverflow { id } => *id,
        }
    }

    pub fn invalid(entity: &'static str, id: u64, field: &'static str, value: &serde_json::Value) -> Self {
        EventIndexError::InvalidValue {
            entity,
            id,
            field,
            value: value.to_string(),
        }
    }
}
