//! Odds storage and partial-update merge
//!
//! An odds record carries an odds-data tuple
//! `[event_result_id, market_display_id, stake_type, stake, point]` and a
//! price tuple. Updates are partial: only the point (position 4) and the
//! first three price slots can change, and a null in an update means
//! "unchanged". The event result and market display never change after
//! creation, so the line-number key of a record is fixed.

use feed_types::ids::EventResultId;
use serde::Serialize;
use serde_json::Value;

/// Grouping key for line numbering: (event result, market display id).
pub type LineKey = (EventResultId, u64);

/// Highest line number a derived grid can show.
pub const MAX_LINES: u32 = 3;

/// Position of the point in the odds-data tuple.
pub const POINT_POSITION: usize = 4;

/// Price slots an update may overwrite.
pub const UPDATABLE_PRICE_SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsRecord {
    pub event_result_id: EventResultId,
    pub market_display_id: u64,
    pub odds_data: Vec<Value>,
    pub prices: Vec<Value>,
    /// 1-based, assigned once at creation.
    pub line_number: u32,
}

impl OddsRecord {
    pub fn new(
        event_result_id: EventResultId,
        market_display_id: u64,
        odds_data: Vec<Value>,
        prices: Vec<Value>,
    ) -> Self {
        Self {
            event_result_id,
            market_display_id,
            odds_data,
            prices,
            line_number: 0,
        }
    }

    pub fn line_key(&self) -> LineKey {
        (self.event_result_id, self.market_display_id)
    }

    pub fn point(&self) -> Option<&Value> {
        self.odds_data.get(POINT_POSITION)
    }

    pub fn price(&self, slot: usize) -> Option<&Value> {
        self.prices.get(slot)
    }

    /// Take the point from an update's odds-data tuple if it carries one.
    pub(crate) fn merge_odds_data(&mut self, update: &[Value]) -> bool {
        match update.get(POINT_POSITION) {
            Some(point) if !point.is_null() => {
                set_slot(&mut self.odds_data, POINT_POSITION, point.clone());
                true
            }
            _ => false,
        }
    }

    /// Overwrite every non-null price among the first three update slots.
    pub(crate) fn merge_prices(&mut self, update: &[Value]) -> usize {
        let mut changed = 0;
        for (slot, price) in update.iter().take(UPDATABLE_PRICE_SLOTS).enumerate() {
            if !price.is_null() {
                set_slot(&mut self.prices, slot, price.clone());
                changed += 1;
            }
        }
        changed
    }
}

fn set_slot(values: &mut Vec<Value>, index: usize, value: Value) {
    if index >= values.len() {
        values.resize(index + 1, Value::Null);
    }
    values[index] = value;
}
