//! Merge and propagation engine
//!
//! Applies one snapshot to an entity store in a fixed phase order and
//! reports which matches were created, updated or deleted:
//!
//! ```text
//! event result deletions ─► odds deletions ─► tournaments ─► events
//!        ─► event results ─► extras + clock ─► odds ─► market groups
//! ```
//!
//! Changes to a parent entity (tournament, event, market group) are
//! propagated to every match that references it. Phases are not
//! transactional: when a phase fails on malformed input, the phases before
//! it stay applied and no change report is returned.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::changes::ChangeSet;
use crate::clock::extrapolate_minutes;
use crate::error::UnexpectedDataError;
use crate::odds::OddsRecord;
use crate::snapshot::{
    decode_event, decode_event_result, decode_event_result_extra, decode_market_group,
    decode_tournament, RawSnapshot, Row, Slot,
};
use crate::store::{ClockEntry, EntityStore};

/// Applies snapshots to one store.
pub(crate) struct Merger<'a> {
    store: &'a mut EntityStore,
    now: DateTime<Utc>,
    changes: ChangeSet,
}

impl<'a> Merger<'a> {
    pub(crate) fn new(store: &'a mut EntityStore, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            changes: ChangeSet::new(),
        }
    }

    pub(crate) fn apply(mut self, snapshot: &RawSnapshot) -> Result<ChangeSet, UnexpectedDataError> {
        self.delete_event_results(snapshot)?;
        self.delete_odds(snapshot)?;
        self.upsert_tournaments(snapshot)?;
        self.upsert_events(snapshot)?;
        self.upsert_event_results(snapshot)?;
        self.upsert_event_result_extras(snapshot)?;
        self.upsert_odds(snapshot)?;
        self.upsert_market_groups(snapshot)?;

        info!(
            created = self.changes.created.len(),
            updated = self.changes.updated.len(),
            deleted = self.changes.deleted.len(),
            "Snapshot applied"
        );

        Ok(self.changes)
    }

    fn delete_event_results(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for id in snapshot.deletion_ids(Slot::EventResultDeletions)? {
            if self.store.event_results.remove(&id).is_some() {
                debug!(event_result_id = id, "Deleting event result");
                self.changes.record_deleted(id);
            }
            if self.store.event_result_extras.remove(&id).is_some() {
                debug!(event_result_id = id, "Deleting event result extra");
            }
            self.store.clock_cache.remove(&id);
        }
        Ok(())
    }

    fn delete_odds(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for id in snapshot.deletion_ids(Slot::OddsDeletions)? {
            if self.store.remove_odds(id).is_some() {
                debug!(odds_id = id, "Deleting odds");
            }
        }
        Ok(())
    }

    fn upsert_tournaments(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for (index, value) in snapshot.rows(Slot::Tournaments)?.iter().enumerate() {
            let row = Row::new(Slot::Tournaments, index, value)?;
            let (id, tournament) = decode_tournament(&row)?;
            if self.store.tournaments.insert(id, tournament).is_some() {
                debug!(tournament_id = id, "Updating tournament");
                for event_id in self.store.events_in_tournament(id) {
                    self.mark_event_details(event_id);
                }
            } else {
                debug!(tournament_id = id, "Creating tournament");
            }
        }
        Ok(())
    }

    fn upsert_events(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for (index, value) in snapshot.rows(Slot::Events)?.iter().enumerate() {
            let row = Row::new(Slot::Events, index, value)?;
            let (id, event) = decode_event(&row)?;
            if self.store.events.insert(id, event).is_some() {
                debug!(event_id = id, "Updating event");
                self.mark_event_details(id);
            } else {
                debug!(event_id = id, "Creating event");
            }
        }
        Ok(())
    }

    fn upsert_event_results(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for (index, value) in snapshot.rows(Slot::EventResults)?.iter().enumerate() {
            let row = Row::new(Slot::EventResults, index, value)?;
            let (id, event_result) = decode_event_result(&row)?;
            if self.store.event_results.insert(id, event_result).is_some() {
                debug!(event_result_id = id, "Updating event result");
                self.changes.mark_details(id);
            } else {
                debug!(event_result_id = id, "Creating event result");
                self.changes.record_created(id);
            }
        }
        Ok(())
    }

    /// Upsert extras, refresh the clock of every reported match and
    /// extrapolate the clock of every other live match. A fresh extra marks
    /// its match only if the match was stored before this snapshot; an
    /// extrapolated clock marks any stored match.
    fn upsert_event_result_extras(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        let mut clocked = BTreeSet::new();

        for (index, value) in snapshot.rows(Slot::EventResultExtras)?.iter().enumerate() {
            let row = Row::new(Slot::EventResultExtras, index, value)?;
            let (id, extra) = decode_event_result_extra(&row)?;
            let current_minutes = extra.current_minutes.clone();

            if self.store.event_result_extras.insert(id, extra).is_some() {
                debug!(event_result_id = id, "Updating event result extra");
            } else {
                debug!(event_result_id = id, "Creating event result extra");
            }
            if self.store.event_results.contains_key(&id) && !self.changes.was_created(id) {
                self.changes.mark_details(id);
            }

            self.store.clock_cache.insert(
                id,
                ClockEntry {
                    current_minutes,
                    cached_at: self.now,
                },
            );
            clocked.insert(id);
        }

        let now = self.now;
        let mut extrapolated = Vec::new();
        for (id, extra) in self.store.event_result_extras.iter_mut() {
            if clocked.contains(id) {
                continue;
            }
            let Some(entry) = self.store.clock_cache.get(id) else {
                continue;
            };
            match extrapolate_minutes(entry, &extra.total_minutes, now) {
                Some(minutes) => {
                    extra.current_minutes = minutes;
                    extrapolated.push(*id);
                }
                None => warn!(
                    event_result_id = *id,
                    current_minutes = %entry.current_minutes,
                    total_minutes = %extra.total_minutes,
                    "Cannot extrapolate non-numeric match clock"
                ),
            }
        }
        for id in extrapolated {
            if self.store.event_results.contains_key(&id) {
                self.changes.mark_details(id);
            }
        }
        Ok(())
    }

    fn upsert_odds(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for (index, value) in snapshot.rows(Slot::Odds)?.iter().enumerate() {
            let row = Row::new(Slot::Odds, index, value)?;
            row.require(2)?;
            let id = row.id(0)?;

            if let Some(record) = self.store.odds.get_mut(&id) {
                if let Some(odds_data) = row.optional_list(1, "odds data")? {
                    record.merge_odds_data(odds_data);
                }
                if let Some(prices) = row.optional_list(2, "prices")? {
                    record.merge_prices(prices);
                }
                debug!(odds_id = id, event_result_id = record.event_result_id, "Updating odds");
                let event_result_id = record.event_result_id;
                self.changes.mark_odds(event_result_id, id);
                continue;
            }

            let record = new_odds_record(&row)?;
            let event_result_id = record.event_result_id;
            let line = self.store.insert_new_odds(id, record);
            debug!(odds_id = id, event_result_id, line_number = line, "Creating odds");
            self.changes.mark_odds(event_result_id, id);
        }
        Ok(())
    }

    fn upsert_market_groups(&mut self, snapshot: &RawSnapshot) -> Result<(), UnexpectedDataError> {
        for (index, value) in snapshot.rows(Slot::MarketGroups)?.iter().enumerate() {
            let row = Row::new(Slot::MarketGroups, index, value)?;
            let (id, group) = decode_market_group(&row)?;
            if self.store.market_groups.insert(id, group).is_some() {
                debug!(market_group_id = id, "Updating market group");
                for event_result_id in self.store.event_results_in_market_group(id) {
                    self.changes.mark_details(event_result_id);
                }
            } else {
                debug!(market_group_id = id, "Creating market group");
            }
        }
        Ok(())
    }

    fn mark_event_details(&mut self, event_id: u64) {
        for event_result_id in self.store.event_results_for_event(event_id) {
            self.changes.mark_details(event_result_id);
        }
    }
}

/// A first-seen odds row must carry its full odds-data tuple and a price
/// slot (null meaning no prices yet).
fn new_odds_record(row: &Row<'_>) -> Result<OddsRecord, UnexpectedDataError> {
    row.require(3)?;
    let odds_data = row
        .optional_list(1, "odds data")?
        .ok_or_else(|| row.malformed("odds data"))?;
    let event_result_id = odds_data
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| row.invalid_nested_id(1, 0, "event result id"))?;
    let market_display_id = odds_data
        .get(1)
        .and_then(Value::as_u64)
        .ok_or_else(|| row.invalid_nested_id(1, 1, "market display id"))?;
    let prices = row.optional_list(2, "prices")?.unwrap_or_default();

    Ok(OddsRecord::new(
        event_result_id,
        market_display_id,
        odds_data.to_vec(),
        prices.to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 2, 19, 14, 0, 0).unwrap()
    }

    fn apply(store: &mut EntityStore, snapshot: &RawSnapshot, now: DateTime<Utc>) -> ChangeSet {
        Merger::new(store, now).apply(snapshot).unwrap()
    }

    fn base_snapshot() -> RawSnapshot {
        RawSnapshot::new()
            .with_slot(Slot::Tournaments, vec![json!([1, "Premier League"])])
            .with_slot(
                Slot::Events,
                vec![json!([10, 0, 1, "Arsenal", "Chelsea", "1.001", 8, "02/19/2013 22:00"])],
            )
            .with_slot(Slot::EventResults, vec![json!([100, 10, 0, 0, 0, 2])])
            .with_slot(
                Slot::EventResultExtras,
                vec![json!([100, 1, 1, 12, 45, 0, 0, 0])],
            )
            .with_slot(
                Slot::Odds,
                vec![
                    json!([1000, [100, 1, 1, 500, 0.25], [1.9, 1.95]]),
                    json!([1001, [100, 3, 1, 500, 2.5], [1.8, 2.0]]),
                ],
            )
    }

    #[test]
    fn test_first_snapshot_reports_creation_only() {
        let mut store = EntityStore::new();
        let changes = apply(&mut store, &base_snapshot(), t0());

        assert_eq!(changes.created, vec![100]);
        assert!(changes.updated.is_empty());
        assert!(changes.deleted.is_empty());
        assert_eq!(store.stats().odds, 2);
        assert_eq!(store.clock_entry(100).unwrap().cached_at, t0());
    }

    #[test]
    fn test_tournament_rename_propagates() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new().with_slot(Slot::Tournaments, vec![json!([1, "EPL"])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert!(changes.updated[&100].event_details);
        assert!(changes.created.is_empty());
    }

    #[test]
    fn test_event_update_propagates() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new().with_slot(
            Slot::Events,
            vec![json!([10, 0, 1, "Arsenal", "Chelsea", "1.001", 4, "02/19/2013 22:00"])],
        );
        let changes = apply(&mut store, &snapshot, t0());
        assert!(changes.updated[&100].event_details);
    }

    #[test]
    fn test_market_group_update_propagates() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot()
            .with_slot(Slot::EventResults, vec![json!([100, 10, 126, 0, 0, 2])])
            .with_slot(Slot::MarketGroups, vec![json!([126, "Total Corners"])]);
        apply(&mut store, &snapshot, t0());

        let snapshot =
            RawSnapshot::new().with_slot(Slot::MarketGroups, vec![json!([126, "Corners"])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert!(changes.updated[&100].event_details);
    }

    #[test]
    fn test_market_group_marks_match_created_in_same_snapshot() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot()
            .with_slot(Slot::EventResults, vec![json!([100, 10, 126, 0, 0, 2])])
            .with_slot(Slot::MarketGroups, vec![json!([126, "Total Corners"])]);
        apply(&mut store, &snapshot, t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::EventResults, vec![json!([200, 10, 126, 0, 0, 2])])
            .with_slot(Slot::Odds, vec![json!([2000, [200, 1, 1, 500, 0.5], [1.9, 1.9]])])
            .with_slot(Slot::MarketGroups, vec![json!([126, "Corners 2"])]);
        let changes = apply(&mut store, &snapshot, t0());

        assert_eq!(changes.created, vec![200]);
        assert!(changes.updated[&200].event_details);
        // Initial odds of a new match are not reported as updates.
        assert!(changes.updated[&200].event_odds.is_empty());
        assert!(changes.updated[&100].event_details);
    }

    #[test]
    fn test_first_extra_of_created_match_not_marked() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::EventResults, vec![json!([300, 10, 0, 0, 0, 2])])
            .with_slot(Slot::EventResultExtras, vec![json!([300, 1, 1, 5, 45, 0, 0, 0])]);
        let changes = apply(&mut store, &snapshot, t0());

        assert_eq!(changes.created, vec![300]);
        assert!(!changes.updated.contains_key(&300));
        assert_eq!(store.clock_entry(300).unwrap().current_minutes, json!(5));
    }

    #[test]
    fn test_tournament_rename_spares_other_tournaments() {
        let mut store = EntityStore::new();
        let snapshot = RawSnapshot::new()
            .with_slot(Slot::Tournaments, vec![json!([1, "Premier League"]), json!([2, "Serie A"])])
            .with_slot(
                Slot::Events,
                vec![
                    json!([10, 0, 1, "Arsenal", "Chelsea", "1.001", 8, "02/19/2013 22:00"]),
                    json!([20, 0, 2, "Roma", "Lazio", "2.001", 8, "02/19/2013 20:45"]),
                ],
            )
            .with_slot(
                Slot::EventResults,
                vec![json!([100, 10, 0, 0, 0, 2]), json!([101, 10, 0, 0, 0, 2]), json!([200, 20, 0, 0, 0, 2])],
            );
        apply(&mut store, &snapshot, t0());

        let snapshot = RawSnapshot::new().with_slot(Slot::Tournaments, vec![json!([1, "EPL"])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.updated.keys().copied().collect::<Vec<_>>(), vec![100, 101]);

        let snapshot = RawSnapshot::new().with_slot(
            Slot::Events,
            vec![json!([20, 0, 2, "Roma", "Lazio", "2.001", 4, "02/19/2013 20:45"])],
        );
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.updated.keys().copied().collect::<Vec<_>>(), vec![200]);
    }

    #[test]
    fn test_reapplied_snapshot_leaves_store_unchanged() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());
        let checksum = store.state_checksum();

        let changes = apply(&mut store, &base_snapshot(), t0());
        assert_eq!(store.state_checksum(), checksum);
        assert!(changes.created.is_empty());
        assert!(changes.deleted.is_empty());
        assert_eq!(changes.updated.keys().copied().collect::<Vec<_>>(), vec![100]);
        assert!(changes.updated[&100].event_details);
        assert_eq!(changes.updated[&100].event_odds, vec![1000, 1001]);
        assert_eq!(store.odds(1001).unwrap().line_number, 1);
    }

    #[test]
    fn test_extra_update_marks_details() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::EventResultExtras, vec![json!([100, 1, 1, 13, 45, 1, 0, 0])]);
        let changes = apply(&mut store, &snapshot, t0() + Duration::seconds(30));
        assert!(changes.updated[&100].event_details);
        assert_eq!(store.event_result_extra(100).unwrap().current_minutes, json!(13));
    }

    #[test]
    fn test_first_extra_of_known_match_marks_details() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot().with_slot(Slot::EventResultExtras, vec![]);
        apply(&mut store, &snapshot, t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::EventResultExtras, vec![json!([100, 1, 1, 1, 45, 0, 0, 0]), json!([555, 1, 1, 1, 45, 0, 0, 0])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert!(changes.updated[&100].event_details);
        // Extras of unknown matches are stored but not reported.
        assert!(!changes.updated.contains_key(&555));
        assert!(store.event_result_extra(555).is_some());
    }

    #[test]
    fn test_repeated_odds_reported_twice() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new().with_slot(
            Slot::Odds,
            vec![json!([1000, null, [2.0]]), json!([1001, null, [1.7]]), json!([1000, null, [null, 1.8]])],
        );
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.updated[&100].event_odds, vec![1000, 1001, 1000]);
        assert_eq!(store.odds(1000).unwrap().prices, vec![json!(2.0), json!(1.8)]);
    }

    #[test]
    fn test_unreported_clock_extrapolates() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let changes = apply(&mut store, &RawSnapshot::new(), t0() + Duration::seconds(185));
        assert!(changes.updated[&100].event_details);
        assert_eq!(store.event_result_extra(100).unwrap().current_minutes, json!(15));
        // Extrapolation keeps the last reported time.
        assert_eq!(store.clock_entry(100).unwrap().current_minutes, json!(12));
        assert_eq!(store.clock_entry(100).unwrap().cached_at, t0());
    }

    #[test]
    fn test_clock_advances_from_last_report() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot()
            .with_slot(Slot::EventResultExtras, vec![json!([100, 1, 1, 20, 45, 0, 0, 0])]);
        apply(&mut store, &snapshot, t0());

        apply(&mut store, &RawSnapshot::new(), t0() + Duration::seconds(600));
        assert_eq!(store.event_result_extra(100).unwrap().current_minutes, json!(30));

        let changes = apply(&mut store, &RawSnapshot::new(), t0() + Duration::seconds(2000));
        assert_eq!(store.event_result_extra(100).unwrap().current_minutes, json!(45));
        assert!(changes.updated[&100].event_details);
    }

    #[test]
    fn test_non_numeric_clock_left_alone() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot()
            .with_slot(Slot::EventResultExtras, vec![json!([100, 1, 1, "??", 45, 0, 0, 0])]);
        apply(&mut store, &snapshot, t0());

        let changes = apply(&mut store, &RawSnapshot::new(), t0() + Duration::minutes(5));
        assert!(changes.updated.is_empty());
        assert_eq!(store.event_result_extra(100).unwrap().current_minutes, json!("??"));
    }

    #[test]
    fn test_partial_odds_update_reports_odds() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::Odds, vec![json!([1000, null, [null, 2.05]])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.updated[&100].event_odds, vec![1000]);
        assert!(!changes.updated[&100].event_details);

        let record = store.odds(1000).unwrap();
        assert_eq!(record.prices, vec![json!(1.9), json!(2.05)]);
        assert_eq!(record.point(), Some(&json!(0.25)));
    }

    #[test]
    fn test_new_odds_on_existing_match_reported() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::Odds, vec![json!([1002, [100, 1, 1, 500, 0.75], null])]);
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.updated[&100].event_odds, vec![1002]);

        let record = store.odds(1002).unwrap();
        assert_eq!(record.line_number, 2);
        assert!(record.prices.is_empty());
    }

    #[test]
    fn test_deletion_reports_only_known_matches() {
        let mut store = EntityStore::new();
        apply(&mut store, &base_snapshot(), t0());

        let snapshot = RawSnapshot::new()
            .with_slot(Slot::EventResultDeletions, vec![json!(100), json!(999)])
            .with_slot(Slot::OddsDeletions, vec![json!(1000)]);
        let changes = apply(&mut store, &snapshot, t0());
        assert_eq!(changes.deleted, vec![100]);
        assert!(store.event_result(100).is_none());
        assert!(store.event_result_extra(100).is_none());
        assert!(store.clock_entry(100).is_none());
        assert!(store.odds(1000).is_none());
        // Odds are not cascaded by event result deletion.
        assert!(store.odds(1001).is_some());
    }

    #[test]
    fn test_failed_phase_keeps_earlier_phases() {
        let mut store = EntityStore::new();
        let snapshot = base_snapshot().with_raw_slot(Slot::Events, json!(0));

        let result = Merger::new(&mut store, t0()).apply(&snapshot);
        assert_eq!(
            result.unwrap_err(),
            UnexpectedDataError::SlotNotAList { slot: Slot::Events }
        );
        assert!(store.tournament(1).is_some());
        assert!(store.event(10).is_none());
        assert!(store.event_result(100).is_none());
    }

    #[test]
    fn test_new_odds_requires_prices_slot() {
        let mut store = EntityStore::new();
        let snapshot = RawSnapshot::new().with_slot(Slot::Odds, vec![json!([1000, [100, 1, 1, 500, 0.25]])]);
        let result = Merger::new(&mut store, t0()).apply(&snapshot);
        assert!(matches!(
            result,
            Err(UnexpectedDataError::MissingField { slot: Slot::Odds, position: 2, .. })
        ));
    }

    #[test]
    fn test_new_odds_requires_integer_references() {
        let mut store = EntityStore::new();
        let snapshot = RawSnapshot::new()
            .with_slot(Slot::Odds, vec![json!([1000, ["x", 1, 1, 500, 0.25], []])]);
        let result = Merger::new(&mut store, t0()).apply(&snapshot);
        assert!(matches!(
            result,
            Err(UnexpectedDataError::InvalidNestedId {
                slot: Slot::Odds,
                position: 1,
                nested: 0,
                field: "event result id",
                ..
            })
        ));

        let snapshot = RawSnapshot::new().with_slot(
            Slot::Odds,
            vec![json!([1000, [100, 1, 1, 500, 0.25], []]), json!([1001, [100, "ou", 1, 500, 2.5], []])],
        );
        let result = Merger::new(&mut store, t0()).apply(&snapshot);
        assert_eq!(
            result.unwrap_err(),
            UnexpectedDataError::InvalidNestedId {
                slot: Slot::Odds,
                index: 1,
                position: 1,
                nested: 1,
                field: "market display id",
            }
        );
        // Rows before the failing one stay applied.
        assert!(store.odds(1000).is_some());
    }
}
