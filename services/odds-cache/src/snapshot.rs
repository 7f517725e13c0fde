//! Snapshot input and row unpacking
//!
//! A snapshot is a fixed sequence of eight slots, each either absent or a
//! list of rows. Rows are positional lists whose identifier positions are
//! validated here; every other position is handed to the store as a raw
//! value.
//!
//! Slot contents are validated lazily, when the merge phase for that slot
//! runs, so a malformed later slot does not undo earlier phases.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::UnexpectedDataError;
use crate::store::{Event, EventResult, EventResultExtra, MarketGroup, Tournament};

/// Number of slots in a snapshot.
pub const SLOT_COUNT: usize = 8;

/// Position of each slot in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Tournaments,
    Events,
    EventResults,
    EventResultExtras,
    EventResultDeletions,
    Odds,
    OddsDeletions,
    MarketGroups,
}

impl Slot {
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::Tournaments,
        Slot::Events,
        Slot::EventResults,
        Slot::EventResultExtras,
        Slot::EventResultDeletions,
        Slot::Odds,
        Slot::OddsDeletions,
        Slot::MarketGroups,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Tournaments => "tournaments",
            Slot::Events => "events",
            Slot::EventResults => "event_results",
            Slot::EventResultExtras => "event_result_extras",
            Slot::EventResultDeletions => "event_result_deletions",
            Slot::Odds => "odds",
            Slot::OddsDeletions => "odds_deletions",
            Slot::MarketGroups => "market_groups",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One structured feed snapshot, as produced by the poller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct RawSnapshot {
    slots: [Value; SLOT_COUNT],
}

impl RawSnapshot {
    /// A snapshot with every slot absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unpack the top-level list. Slots past the eighth are ignored.
    pub fn from_value(value: &Value) -> Result<Self, UnexpectedDataError> {
        let list = value.as_array().ok_or(UnexpectedDataError::NotAList)?;
        if list.len() < SLOT_COUNT {
            return Err(UnexpectedDataError::MissingSlots {
                found: list.len(),
                expected: SLOT_COUNT,
            });
        }
        let mut snapshot = Self::new();
        for (slot, value) in snapshot.slots.iter_mut().zip(list.iter()) {
            *slot = value.clone();
        }
        Ok(snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, UnexpectedDataError> {
        let value: Value = serde_json::from_str(json).map_err(|_| UnexpectedDataError::NotAList)?;
        Self::from_value(&value)
    }

    /// Builder: set a slot to a list of rows.
    pub fn with_slot(mut self, slot: Slot, rows: Vec<Value>) -> Self {
        self.slots[slot.index()] = Value::Array(rows);
        self
    }

    /// Builder: set a slot to an arbitrary raw value.
    pub fn with_raw_slot(mut self, slot: Slot, value: Value) -> Self {
        self.slots[slot.index()] = value;
        self
    }

    pub fn raw_slot(&self, slot: Slot) -> &Value {
        &self.slots[slot.index()]
    }

    /// Rows of a slot; an absent slot yields no rows.
    pub(crate) fn rows(&self, slot: Slot) -> Result<&[Value], UnexpectedDataError> {
        match &self.slots[slot.index()] {
            Value::Null => Ok(&[]),
            Value::Array(rows) => Ok(rows),
            _ => Err(UnexpectedDataError::SlotNotAList { slot }),
        }
    }

    /// Identifiers listed in a deletion slot.
    pub(crate) fn deletion_ids(&self, slot: Slot) -> Result<Vec<u64>, UnexpectedDataError> {
        self.rows(slot)?
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .as_u64()
                    .ok_or(UnexpectedDataError::InvalidDeletionId { slot, index })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| match slot {
            Value::Null => true,
            Value::Array(rows) => rows.is_empty(),
            _ => false,
        })
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.slots.to_vec())
    }
}

impl TryFrom<Value> for RawSnapshot {
    type Error = UnexpectedDataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// A positional row being unpacked, remembering where it came from.
pub(crate) struct Row<'a> {
    slot: Slot,
    index: usize,
    fields: &'a [Value],
}

impl<'a> Row<'a> {
    pub(crate) fn new(slot: Slot, index: usize, value: &'a Value) -> Result<Self, UnexpectedDataError> {
        let fields = value
            .as_array()
            .ok_or(UnexpectedDataError::RowNotAList { slot, index })?;
        Ok(Self {
            slot,
            index,
            fields,
        })
    }

    /// Fail unless the row has at least `len` positions.
    pub(crate) fn require(&self, len: usize) -> Result<(), UnexpectedDataError> {
        if self.fields.len() < len {
            return Err(self.missing(len - 1));
        }
        Ok(())
    }

    pub(crate) fn field(&self, position: usize) -> Result<&'a Value, UnexpectedDataError> {
        self.fields.get(position).ok_or_else(|| self.missing(position))
    }

    pub(crate) fn value(&self, position: usize) -> Result<Value, UnexpectedDataError> {
        self.field(position).cloned()
    }

    pub(crate) fn id(&self, position: usize) -> Result<u64, UnexpectedDataError> {
        self.field(position)?
            .as_u64()
            .ok_or(UnexpectedDataError::InvalidId {
                slot: self.slot,
                index: self.index,
                position,
            })
    }

    /// A nested tuple that may be null (unchanged); anything else is malformed.
    pub(crate) fn optional_list(
        &self,
        position: usize,
        field: &'static str,
    ) -> Result<Option<&'a [Value]>, UnexpectedDataError> {
        match self.fields.get(position) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(values)) => Ok(Some(values)),
            Some(_) => Err(self.malformed(field)),
        }
    }

    pub(crate) fn malformed(&self, field: &'static str) -> UnexpectedDataError {
        UnexpectedDataError::MalformedTuple {
            slot: self.slot,
            index: self.index,
            field,
        }
    }

    /// An identifier inside the nested tuple at `position` is not an integer.
    pub(crate) fn invalid_nested_id(
        &self,
        position: usize,
        nested: usize,
        field: &'static str,
    ) -> UnexpectedDataError {
        UnexpectedDataError::InvalidNestedId {
            slot: self.slot,
            index: self.index,
            position,
            nested,
            field,
        }
    }

    fn missing(&self, position: usize) -> UnexpectedDataError {
        UnexpectedDataError::MissingField {
            slot: self.slot,
            index: self.index,
            position,
        }
    }
}

pub(crate) fn decode_tournament(row: &Row<'_>) -> Result<(u64, Tournament), UnexpectedDataError> {
    row.require(2)?;
    Ok((row.id(0)?, Tournament { name: row.value(1)? }))
}

pub(crate) fn decode_event(row: &Row<'_>) -> Result<(u64, Event), UnexpectedDataError> {
    row.require(8)?;
    Ok((
        row.id(0)?,
        Event {
            tournament_id: row.id(2)?,
            home_team: row.value(3)?,
            away_team: row.value(4)?,
            sort_code: row.value(5)?,
            show_time_type: row.value(6)?,
            show_time: row.value(7)?,
        },
    ))
}

pub(crate) fn decode_event_result(row: &Row<'_>) -> Result<(u64, EventResult), UnexpectedDataError> {
    row.require(6)?;
    Ok((
        row.id(0)?,
        EventResult {
            event_id: row.id(1)?,
            market_group_id: row.id(2)?,
            home_score: row.value(3)?,
            away_score: row.value(4)?,
            odds_count: row.value(5)?,
        },
    ))
}

pub(crate) fn decode_event_result_extra(
    row: &Row<'_>,
) -> Result<(u64, EventResultExtra), UnexpectedDataError> {
    row.require(8)?;
    Ok((
        row.id(0)?,
        EventResultExtra {
            row_count: row.value(1)?,
            period: row.value(2)?,
            current_minutes: row.value(3)?,
            total_minutes: row.value(4)?,
            home_red_cards: row.value(5)?,
            away_red_cards: row.value(6)?,
            injury_time: row.value(7)?,
        },
    ))
}

pub(crate) fn decode_market_group(row: &Row<'_>) -> Result<(u64, MarketGroup), UnexpectedDataError> {
    row.require(2)?;
    Ok((row.id(0)?, MarketGroup { name: row.value(1)? }))
}
