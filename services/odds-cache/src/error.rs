//! Error types for the odds cache
//!
//! Two failure domains reach callers: snapshots whose structure cannot be
//! unpacked (`UnexpectedDataError`, raised by `apply_snapshot`) and derived
//! records that cannot be produced (`EventIndexError`, raised by the
//! derivation operations). `CacheError` folds both, plus configuration
//! problems, into one type for callers that do not need to tell them apart
//! statically.

use feed_types::errors::EventIndexError;

use crate::snapshot::Slot;

/// Structural failure while unpacking a snapshot.
///
/// Raised while a phase is running; phases that completed before it keep
/// their effects on the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnexpectedDataError {
    #[error("snapshot is not a list")]
    NotAList,

    #[error("snapshot has {found} slots, expected at least {expected}")]
    MissingSlots { found: usize, expected: usize },

    #[error("{slot} slot is neither a list nor absent")]
    SlotNotAList { slot: Slot },

    #[error("{slot} entry {index} is not a list")]
    RowNotAList { slot: Slot, index: usize },

    #[error("{slot} entry {index} has no position {position}")]
    MissingField {
        slot: Slot,
        index: usize,
        position: usize,
    },

    #[error("{slot} entry {index} has a non-integer identifier at position {position}")]
    InvalidId {
        slot: Slot,
        index: usize,
        position: usize,
    },

    #[error("{slot} entry {index} has a non-integer {field} at position {position}.{nested}")]
    InvalidNestedId {
        slot: Slot,
        index: usize,
        position: usize,
        nested: usize,
        field: &'static str,
    },

    #[error("{slot} entry {index} is not an integer identifier")]
    InvalidDeletionId { slot: Slot, index: usize },

    #[error("{slot} entry {index} has a malformed {field}")]
    MalformedTuple {
        slot: Slot,
        index: usize,
        field: &'static str,
    },
}

/// Invalid construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Malformed(String),

    #[error("GMT offset {hours}h is outside -12..=14")]
    GmtOffsetOutOfRange { hours: i32 },
}

/// Discriminant of a `CacheError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnexpectedData,
    EventIndex,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Unexpected data: {0}")]
    UnexpectedData(#[from] UnexpectedDataError),

    #[error("Event index error: {0}")]
    EventIndex(#[from] EventIndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::UnexpectedData(_) => ErrorKind::UnexpectedData,
            CacheError::EventIndex(_) => ErrorKind::EventIndex,
            CacheError::Config(_) => ErrorKind::Config,
        }
    }
}
