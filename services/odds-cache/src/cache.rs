//! Feed cache facade
//!
//! One `FeedCache` holds one frame of one feed. The poller hands it each
//! structured snapshot through `apply_snapshot`; the publisher reads the
//! returned change report and asks for derived records of the matches it
//! names.

use chrono::{DateTime, Utc};
use feed_types::errors::EventIndexError;
use feed_types::frame::FrameType;
use feed_types::ids::{EventResultId, GlobalId, OddsId};
use serde::Serialize;
use tracing::info;

use crate::changes::{ChangeSet, UpdatedProperties};
use crate::config::CacheConfig;
use crate::details::{event_details, EventDetails};
use crate::error::{ConfigError, UnexpectedDataError};
use crate::grid::{event_odds, FetchMode, OddsGrid};
use crate::merge::Merger;
use crate::snapshot::RawSnapshot;
use crate::store::EntityStore;

/// Full record of a newly created match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEvent {
    /// Frame-qualified id, unique across both frames of the feed.
    pub sub_event_result_id: GlobalId,
    pub event_result_id: GlobalId,
    pub details: EventDetails,
    pub odds: OddsGrid,
}

/// The changed parts of an already-published match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFeedEvent {
    pub sub_event_result_id: GlobalId,
    pub event_result_id: GlobalId,
    /// Present only when the match's details changed.
    pub details: Option<EventDetails>,
    /// Only the changed odds; empty when no odds changed.
    pub odds: OddsGrid,
}

pub struct FeedCache {
    config: CacheConfig,
    store: EntityStore,
}

impl FeedCache {
    pub fn new(config: CacheConfig) -> Self {
        info!(
            frame = %config.frame,
            source_id = %config.source_id,
            gmt_offset_hours = config.gmt_offset_hours,
            "FeedCache initialized"
        );
        Self {
            config,
            store: EntityStore::new(),
        }
    }

    /// Validate the configuration before building the cache.
    pub fn try_new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn frame(&self) -> FrameType {
        self.config.frame
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Merge a snapshot received now.
    pub fn apply_snapshot(&mut self, snapshot: &RawSnapshot) -> Result<ChangeSet, UnexpectedDataError> {
        self.apply_snapshot_at(snapshot, Utc::now())
    }

    /// Merge a snapshot received at `now`, which also drives clock
    /// extrapolation.
    pub fn apply_snapshot_at(
        &mut self,
        snapshot: &RawSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ChangeSet, UnexpectedDataError> {
        Merger::new(&mut self.store, now).apply(snapshot)
    }

    /// Drop all cached state, e.g. after the feed connection was reset.
    pub fn clear(&mut self) {
        info!(frame = %self.config.frame, "Clearing feed cache");
        self.store.clear();
    }

    pub fn get_event_details(&self, event_result_id: EventResultId) -> Result<EventDetails, EventIndexError> {
        event_details(&self.store, event_result_id, self.config.gmt_offset_hours)
    }

    pub fn get_event_odds(&self, odds_ids: &[OddsId], mode: FetchMode) -> Result<OddsGrid, EventIndexError> {
        event_odds(&self.store, odds_ids, mode)
    }

    /// Identifier distinguishing the same event result across frames: the
    /// id itself for the live frame, the id prefixed with a decimal "1" for
    /// the non-live frame.
    pub fn sub_event_result_id(&self, event_result_id: EventResultId) -> Result<u64, EventIndexError> {
        match self.config.frame {
            FrameType::Live => Ok(event_result_id),
            FrameType::NonLive => format!("1{}", event_result_id)
                .parse::<u64>()
                .map_err(|_| EventIndexError::SubIdentityOverflow { id: event_result_id }),
        }
    }

    /// Everything about a match reported as created.
    pub fn fetch_event(&self, event_result_id: EventResultId) -> Result<FeedEvent, EventIndexError> {
        let (sub_event_result_id, global_id) = self.global_ids(event_result_id)?;
        let details = self.get_event_details(event_result_id)?;
        let odds_ids = self.store.odds_for_event_result(event_result_id);
        let odds = self.get_event_odds(&odds_ids, FetchMode::Created)?;

        Ok(FeedEvent {
            sub_event_result_id,
            event_result_id: global_id,
            details,
            odds,
        })
    }

    /// The parts of a match that a change report flagged.
    pub fn fetch_modified_event(
        &self,
        event_result_id: EventResultId,
        properties: &UpdatedProperties,
    ) -> Result<ModifiedFeedEvent, EventIndexError> {
        let (sub_event_result_id, global_id) = self.global_ids(event_result_id)?;
        let details = if properties.event_details {
            Some(self.get_event_details(event_result_id)?)
        } else {
            None
        };
        let odds = if properties.event_odds.is_empty() {
            OddsGrid::new()
        } else {
            self.get_event_odds(&properties.event_odds, FetchMode::Modified)?
        };

        Ok(ModifiedFeedEvent {
            sub_event_result_id,
            event_result_id: global_id,
            details,
            odds,
        })
    }

    fn global_ids(&self, event_result_id: EventResultId) -> Result<(GlobalId, GlobalId), EventIndexError> {
        let source = self.config.source_id;
        let sub_id = self.sub_event_result_id(event_result_id)?;
        Ok((
            GlobalId::compose(source, sub_id),
            GlobalId::compose(source, event_result_id),
        ))
    }
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
