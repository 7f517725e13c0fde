//! Entity store for one feed frame
//!
//! Six id-keyed mappings hold the latest raw record of every entity the
//! feed has announced, plus a clock cache remembering when each match's
//! minute counter was last reported. Records keep their raw leaf values;
//! conversion happens only when a derived record is requested.
//!
//! All mappings are `BTreeMap`s so iteration, and therefore the state
//! checksum, is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use feed_types::ids::{
    EventId, EventResultId, MarketGroupId, OddsId, TournamentId,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::odds::{LineKey, OddsRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tournament {
    pub name: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub tournament_id: TournamentId,
    pub home_team: Value,
    pub away_team: Value,
    pub sort_code: Value,
    pub show_time_type: Value,
    pub show_time: Value,
}

/// A match as a betting market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResult {
    pub event_id: EventId,
    /// Zero when the match belongs to no market group.
    pub market_group_id: MarketGroupId,
    pub home_score: Value,
    pub away_score: Value,
    pub odds_count: Value,
}

/// Live-only match state. Keyed by the event result it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResultExtra {
    pub row_count: Value,
    pub period: Value,
    pub current_minutes: Value,
    pub total_minutes: Value,
    pub home_red_cards: Value,
    pub away_red_cards: Value,
    pub injury_time: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketGroup {
    pub name: Value,
}

/// Last feed-reported minute counter of a match and when it was received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockEntry {
    pub current_minutes: Value,
    pub cached_at: DateTime<Utc>,
}

/// Holds every entity of one frame.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pub(crate) tournaments: BTreeMap<TournamentId, Tournament>,
    pub(crate) events: BTreeMap<EventId, Event>,
    pub(crate) event_results: BTreeMap<EventResultId, EventResult>,
    pub(crate) event_result_extras: BTreeMap<EventResultId, EventResultExtra>,
    pub(crate) odds: BTreeMap<OddsId, OddsRecord>,
    pub(crate) market_groups: BTreeMap<MarketGroupId, MarketGroup>,
    pub(crate) clock_cache: BTreeMap<EventResultId, ClockEntry>,
    /// Line numbers held by stored odds, per (event result, market display).
    pub(crate) line_numbers: BTreeMap<LineKey, BTreeSet<u32>>,
}

/// Entity counts of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub tournaments: usize,
    pub events: usize,
    pub event_results: usize,
    pub event_result_extras: usize,
    pub odds: usize,
    pub market_groups: usize,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entity and clock entry.
    pub fn clear(&mut self) {
        self.tournaments.clear();
        self.events.clear();
        self.event_results.clear();
        self.event_result_extras.clear();
        self.odds.clear();
        self.market_groups.clear();
        self.clock_cache.clear();
        self.line_numbers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tournaments.is_empty()
            && self.events.is_empty()
            && self.event_results.is_empty()
            && self.event_result_extras.is_empty()
            && self.odds.is_empty()
            && self.market_groups.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            tournaments: self.tournaments.len(),
            events: self.events.len(),
            event_results: self.event_results.len(),
            event_result_extras: self.event_result_extras.len(),
            odds: self.odds.len(),
            market_groups: self.market_groups.len(),
        }
    }

    pub fn tournament(&self, id: TournamentId) -> Option<&Tournament> {
        self.tournaments.get(&id)
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn event_result(&self, id: EventResultId) -> Option<&EventResult> {
        self.event_results.get(&id)
    }

    pub fn event_result_extra(&self, id: EventResultId) -> Option<&EventResultExtra> {
        self.event_result_extras.get(&id)
    }

    pub fn odds(&self, id: OddsId) -> Option<&OddsRecord> {
        self.odds.get(&id)
    }

    pub fn market_group(&self, id: MarketGroupId) -> Option<&MarketGroup> {
        self.market_groups.get(&id)
    }

    pub fn clock_entry(&self, id: EventResultId) -> Option<&ClockEntry> {
        self.clock_cache.get(&id)
    }

    pub fn event_result_ids(&self) -> impl Iterator<Item = EventResultId> + '_ {
        self.event_results.keys().copied()
    }

    /// Events scheduled in a tournament.
    pub fn events_in_tournament(&self, tournament_id: TournamentId) -> Vec<EventId> {
        self.events
            .iter()
            .filter(|(_, event)| event.tournament_id == tournament_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Event results referencing an event.
    pub fn event_results_for_event(&self, event_id: EventId) -> Vec<EventResultId> {
        self.event_results
            .iter()
            .filter(|(_, er)| er.event_id == event_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Event results belonging to a market group.
    pub fn event_results_in_market_group(&self, market_group_id: MarketGroupId) -> Vec<EventResultId> {
        self.event_results
            .iter()
            .filter(|(_, er)| er.market_group_id == market_group_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Odds offered on an event result, in id order.
    pub fn odds_for_event_result(&self, event_result_id: EventResultId) -> Vec<OddsId> {
        self.odds
            .iter()
            .filter(|(_, odds)| odds.event_result_id == event_result_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Store a new odds record, assigning the lowest line number free for
    /// its (event result, market display) key.
    pub(crate) fn insert_new_odds(&mut self, id: OddsId, mut record: OddsRecord) -> u32 {
        let used = self.line_numbers.entry(record.line_key()).or_default();
        let line = (1..).find(|n| !used.contains(n)).unwrap_or(1);
        used.insert(line);
        record.line_number = line;
        self.odds.insert(id, record);
        line
    }

    pub(crate) fn remove_odds(&mut self, id: OddsId) -> Option<OddsRecord> {
        let record = self.odds.remove(&id)?;
        let key = record.line_key();
        if let Some(used) = self.line_numbers.get_mut(&key) {
            used.remove(&record.line_number);
            if used.is_empty() {
                self.line_numbers.remove(&key);
            }
        }
        Some(record)
    }

    /// SHA-256 over every mapping and the clock cache, hex encoded.
    pub fn state_checksum(&self) -> String {
        let mut hasher = Sha256::new();
        self.hash_into(&mut hasher);
        format!("{:x}", hasher.finalize())
    }

    pub(crate) fn hash_into(&self, hasher: &mut Sha256) {
        hash_section(hasher, "tournaments", &self.tournaments);
        hash_section(hasher, "events", &self.events);
        hash_section(hasher, "event_results", &self.event_results);
        hash_section(hasher, "event_result_extras", &self.event_result_extras);
        hash_section(hasher, "odds", &self.odds);
        hash_section(hasher, "market_groups", &self.market_groups);
        hash_section(hasher, "clock_cache", &self.clock_cache);
    }
}

fn hash_section<T: Serialize>(hasher: &mut Sha256, name: &str, records: &BTreeMap<u64, T>) {
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    for (id, record) in records {
        hasher.update(id.to_string().as_bytes());
        hasher.update(b":");
        // Records hold only JSON-representable data.
        if let Ok(encoded) = serde_json::to_vec(record) {
            hasher.update(&encoded);
        }
        hasher.update(b",");
    }
    hasher.update(b"===");
}
