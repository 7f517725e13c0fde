//! Odds Feed Cache
//!
//! Consumes periodic snapshots of a sports betting feed and produces:
//! - A per-frame store of tournaments, events, matches, live extras,
//!   odds and market groups
//! - A change report per snapshot: matches created, updated, deleted
//! - Derived match details and odds grids for publishing
//! - Deterministic capture/replay of snapshot journals
//!
//! # Architecture
//!
//! ```text
//!   Poller snapshots (live / non-live)
//!          │
//!      ┌───▼────┐
//!      │ Merge  │  ← phases, propagation, clock extrapolation
//!      └───┬────┘
//!          │
//!     ┌────▼─────┐      ┌───────────┐
//!     │  Store   │─────►│ ChangeSet │
//!     └────┬─────┘      └─────┬─────┘
//!          │                  │
//!   ┌──────▼──────────────────▼──┐
//!   │ Derivation: details + grid │
//!   └──────────────┬─────────────┘
//!                  │
//!             Publisher
//! ```

pub mod cache;
pub mod changes;
pub mod clock;
pub mod config;
pub mod derive;
pub mod details;
pub mod error;
pub mod grid;
mod merge;
pub mod odds;
pub mod replay;
pub mod snapshot;
pub mod store;

pub use cache::{FeedCache, FeedEvent, ModifiedFeedEvent};
pub use changes::{ChangeSet, UpdatedProperties};
pub use config::CacheConfig;
pub use details::EventDetails;
pub use error::{CacheError, ErrorKind, UnexpectedDataError};
pub use grid::{FetchMode, MarketKind, OddsCell, OddsGrid};
pub use snapshot::{RawSnapshot, Slot};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
