//! Derived event details
//!
//! Joins an event result with its event, tournament, market group and live
//! extra record, converting raw values only now. Lookups and the period
//! fail with `EventIndexError`; display-only fields degrade to defaults or
//! `None` with a warning.

use chrono::{DateTime, Utc};
use feed_types::errors::EventIndexError;
use feed_types::ids::EventResultId;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::derive::{
    betting_available_in_play, event_sort_code, lenient_count, match_stage, show_time,
    MatchStageDetails, StageField,
};
use crate::store::{EntityStore, Event, EventResult, EventResultExtra};

/// Everything a consumer shows about a match besides its odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetails {
    /// Tournament name, suffixed with " - <market group>" for grouped matches.
    pub tournament_name: String,
    pub sort_code: i64,
    /// `None` when the feed sent something other than text.
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub show_time: DateTime<Utc>,
    pub betting_in_play: bool,
    pub stage: MatchStageDetails,
    /// Injury time as reported by the feed; 0 for matches not in play.
    pub reported_injury_time: Option<i64>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    /// `None` for matches not in play.
    pub home_red_cards: Option<i64>,
    pub away_red_cards: Option<i64>,
}

pub(crate) fn event_details(
    store: &EntityStore,
    event_result_id: EventResultId,
    gmt_offset_hours: i32,
) -> Result<EventDetails, EventIndexError> {
    let event_result = store
        .event_result(event_result_id)
        .ok_or(EventIndexError::UnknownEventResult { id: event_result_id })?;
    let event = store
        .event(event_result.event_id)
        .ok_or(EventIndexError::UnknownEvent {
            id: event_result.event_id,
        })?;
    let extra = store.event_result_extra(event_result_id);

    let stage = stage_details(event_result_id, extra)?;
    let tournament_name = tournament_name(store, event, event_result)?;

    let (reported_injury_time, home_red_cards, away_red_cards) = match extra {
        Some(extra) => (
            lenient_count(&extra.injury_time, "injury_time"),
            lenient_count(&extra.home_red_cards, "home_red_cards"),
            lenient_count(&extra.away_red_cards, "away_red_cards"),
        ),
        None => (Some(0), None, None),
    };

    Ok(EventDetails {
        tournament_name,
        sort_code: event_sort_code(&event.sort_code),
        home_team: team_name(&event.home_team, event_result.event_id),
        away_team: team_name(&event.away_team, event_result.event_id),
        show_time: show_time(&event.show_time, gmt_offset_hours),
        betting_in_play: betting_available_in_play(&event.show_time_type),
        stage,
        reported_injury_time,
        home_score: lenient_count(&event_result.home_score, "home_score"),
        away_score: lenient_count(&event_result.away_score, "away_score"),
        home_red_cards,
        away_red_cards,
    })
}

fn stage_details(
    event_result_id: EventResultId,
    extra: Option<&EventResultExtra>,
) -> Result<MatchStageDetails, EventIndexError> {
    let Some(extra) = extra else {
        return Ok(MatchStageDetails::not_live());
    };
    match_stage(&extra.period, &extra.current_minutes, &extra.total_minutes).map_err(|field| {
        let (name, value) = match field {
            StageField::Period => ("period", &extra.period),
            StageField::CurrentMinutes => ("current_minutes", &extra.current_minutes),
            StageField::TotalMinutes => ("total_minutes", &extra.total_minutes),
        };
        EventIndexError::invalid("event result extra", event_result_id, name, value)
    })
}

fn tournament_name(
    store: &EntityStore,
    event: &Event,
    event_result: &EventResult,
) -> Result<String, EventIndexError> {
    let tournament = store
        .tournament(event.tournament_id)
        .ok_or(EventIndexError::UnknownTournament {
            id: event.tournament_id,
        })?;
    let name = tournament.name.as_str().unwrap_or_else(|| {
        warn!(
            tournament_id = event.tournament_id,
            name = %tournament.name,
            "Non-text tournament name, using empty name"
        );
        ""
    });

    if event_result.market_group_id == 0 {
        return Ok(name.to_string());
    }

    let group = store
        .market_group(event_result.market_group_id)
        .ok_or(EventIndexError::UnknownMarketGroup {
            id: event_result.market_group_id,
        })?;
    match group.name.as_str() {
        Some(group_name) => Ok(format!("{} - {}", name, group_name)),
        None => {
            warn!(
                market_group_id = event_result.market_group_id,
                name = %group.name,
                "Non-text market group name, using tournament name"
            );
            Ok(name.to_string())
        }
    }
}

fn team_name(raw: &Value, event_id: u64) -> Option<String> {
    let name = raw.as_str().map(str::to_string);
    if name.is_none() {
        warn!(event_id, name = %raw, "Non-text team name");
    }
    name
}
