//! Frame type of a feed cache
//!
//! A feed publishes two disjoint frames: matches currently in play (live)
//! and matches not yet started (non-live). Each frame is cached by its own
//! instance, and the same event result id may appear in both.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Live,
    NonLive,
}

impl FrameType {
    pub fn is_live(&self) -> bool {
        matches!(self, FrameType::Live)
    }

    /// The other frame of the same feed.
    pub fn sibling(&self) -> Self {
        match self {
            FrameType::Live => FrameType::NonLive,
            FrameType::NonLive => FrameType::Live,
        }
    }
}

impl Default for FrameType {
    fn default() -> Self {
        FrameType::Live
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Live => write!(f, "live"),
            FrameType::NonLive => write!(f, "non_live"),
        }
    }
}
