//! Change report of one applied snapshot

use std::collections::BTreeMap;

use feed_types::ids::{EventResultId, OddsId};
use serde::Serialize;

/// What changed about an already-reported match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatedProperties {
    /// Its derived event details need re-fetching.
    pub event_details: bool,
    /// Odds records that were created or changed, in report order. An odds
    /// id mentioned twice in one snapshot appears twice.
    pub event_odds: Vec<OddsId>,
}

impl UpdatedProperties {
    pub fn is_empty(&self) -> bool {
        !self.event_details && self.event_odds.is_empty()
    }
}

/// Event results created, updated and deleted by one snapshot.
///
/// A match created in this snapshot may still carry an `event_details` mark
/// when a later phase touches it, but never odds marks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub created: Vec<EventResultId>,
    pub updated: BTreeMap<EventResultId, UpdatedProperties>,
    pub deleted: Vec<EventResultId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn was_created(&self, id: EventResultId) -> bool {
        self.created.contains(&id)
    }

    pub(crate) fn record_created(&mut self, id: EventResultId) {
        if !self.was_created(id) {
            self.created.push(id);
        }
    }

    pub(crate) fn record_deleted(&mut self, id: EventResultId) {
        self.deleted.push(id);
    }

    pub(crate) fn mark_details(&mut self, id: EventResultId) {
        self.updated.entry(id).or_default().event_details = true;
    }

    /// Odds of a match created in this snapshot are reported at creation.
    pub(crate) fn mark_odds(&mut self, id: EventResultId, odds_id: OddsId) {
        if self.was_created(id) {
            return;
        }
        self.updated.entry(id).or_default().event_odds.push(odds_id);
    }
}
