//! Identifier types for feed entities
//!
//! Feed-assigned identifiers are plain unsigned integers, unique only within
//! one feed source. Before leaving a cache they are namespaced with the
//! source id so that several feeds can share one identifier space:
//! `global = (source << 28) + local`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feed-assigned identifier of a tournament.
pub type TournamentId = u64;
/// Feed-assigned identifier of an event (fixture).
pub type EventId = u64;
/// Feed-assigned identifier of an event result (a match as a betting market).
pub type EventResultId = u64;
/// Feed-assigned identifier of a single odds record.
pub type OddsId = u64;
/// Feed-assigned identifier of a market group.
pub type MarketGroupId = u64;

/// Number of low bits reserved for the source-local identifier.
pub const SOURCE_SHIFT: u32 = 28;

const LOCAL_MASK: u64 = (1 << SOURCE_SHIFT) - 1;

/// Identifies the feed a cache instance is consuming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(u8);

impl SourceId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for SourceId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source-namespaced numeric identifier.
///
/// Local ids wider than 28 bits spill into the source bits; the addition
/// wraps instead of failing so the mapping stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Namespace a source-local identifier.
    pub fn compose(source: SourceId, local: u64) -> Self {
        Self((u64::from(source.0) << SOURCE_SHIFT).wrapping_add(local))
    }

    /// Wrap an already namespaced value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Source part, meaningful when the local id fits in 28 bits.
    pub fn source(&self) -> SourceId {
        SourceId((self.0 >> SOURCE_SHIFT) as u8)
    }

    /// Local part, meaningful when the local id fits in 28 bits.
    pub fn local(&self) -> u64 {
        self.0 & LOCAL_MASK
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
