//! Odds grid assembly
//!
//! A match's odds are shown as three lines by four markets. The row is the
//! odds record's line number, the column its market:
//!
//! ```text
//!          HT handicap │ FT handicap │ HT over/under │ FT over/under
//! line 1 │             │             │               │
//! line 2 │             │             │               │
//! line 3 │             │             │               │
//! ```
//!
//! Markets outside these four are ignored. In `Created` mode every line
//! that carries at least one record is padded with zero placeholders so
//! consumers see complete rows; in `Modified` mode only the records that
//! changed are filled in. A price that is missing or not a number is left
//! unset; only an unusable point fails the grid.

use feed_types::errors::EventIndexError;
use feed_types::ids::OddsId;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::derive::{as_decimal, format_point, Favourite};
use crate::odds::{OddsRecord, MAX_LINES};
use crate::store::EntityStore;

/// Market display ids the grid shows.
pub const FULL_TIME_HANDICAP: u64 = 1;
pub const FULL_TIME_OVER_UNDER: u64 = 3;
pub const HALF_TIME_HANDICAP: u64 = 7;
pub const HALF_TIME_OVER_UNDER: u64 = 9;

const ROWS: usize = MAX_LINES as usize;
const COLUMNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    HalfTimeHandicap,
    FullTimeHandicap,
    HalfTimeOverUnder,
    FullTimeOverUnder,
}

impl MarketKind {
    /// Grid column order.
    pub const COLUMNS: [MarketKind; COLUMNS] = [
        MarketKind::HalfTimeHandicap,
        MarketKind::FullTimeHandicap,
        MarketKind::HalfTimeOverUnder,
        MarketKind::FullTimeOverUnder,
    ];

    pub fn from_display_id(market_display_id: u64) -> Option<Self> {
        match market_display_id {
            FULL_TIME_HANDICAP => Some(MarketKind::FullTimeHandicap),
            FULL_TIME_OVER_UNDER => Some(MarketKind::FullTimeOverUnder),
            HALF_TIME_HANDICAP => Some(MarketKind::HalfTimeHandicap),
            HALF_TIME_OVER_UNDER => Some(MarketKind::HalfTimeOverUnder),
            _ => None,
        }
    }

    pub fn column(self) -> usize {
        match self {
            MarketKind::HalfTimeHandicap => 0,
            MarketKind::FullTimeHandicap => 1,
            MarketKind::HalfTimeOverUnder => 2,
            MarketKind::FullTimeOverUnder => 3,
        }
    }

    pub fn is_handicap(self) -> bool {
        matches!(self, MarketKind::HalfTimeHandicap | MarketKind::FullTimeHandicap)
    }
}

/// Whether a grid describes a newly created match or changes to a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Created,
    Modified,
}

/// One priced line of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OddsCell {
    Handicap {
        point: String,
        home_price: Option<Decimal>,
        away_price: Option<Decimal>,
        favourite: Favourite,
    },
    OverUnder {
        point: String,
        over_price: Option<Decimal>,
        under_price: Option<Decimal>,
    },
    /// Zero-valued filler for a market without a record on this line.
    Placeholder { market: MarketKind },
}

impl OddsCell {
    pub fn placeholder(market: MarketKind) -> Self {
        OddsCell::Placeholder { market }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, OddsCell::Placeholder { .. })
    }

    /// Both prices; zero for placeholders.
    pub fn prices(&self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            OddsCell::Handicap {
                home_price,
                away_price,
                ..
            } => (*home_price, *away_price),
            OddsCell::OverUnder {
                over_price,
                under_price,
                ..
            } => (*over_price, *under_price),
            OddsCell::Placeholder { .. } => (Some(Decimal::ZERO), Some(Decimal::ZERO)),
        }
    }
}

/// Three lines by four markets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OddsGrid {
    rows: [[Option<OddsCell>; COLUMNS]; ROWS],
}

impl OddsGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells of a line, 1-based.
    pub fn line(&self, line_number: u32) -> Option<&[Option<OddsCell>; COLUMNS]> {
        let index = usize::try_from(line_number).ok()?.checked_sub(1)?;
        self.rows.get(index)
    }

    pub fn cell(&self, line_number: u32, market: MarketKind) -> Option<&OddsCell> {
        self.line(line_number)?[market.column()].as_ref()
    }

    pub fn rows(&self) -> &[[Option<OddsCell>; COLUMNS]; ROWS] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().flatten().all(Option::is_none)
    }

    fn pad_with_placeholders(&mut self) {
        for row in self.rows.iter_mut() {
            if row.iter().all(Option::is_none) {
                continue;
            }
            for (cell, market) in row.iter_mut().zip(MarketKind::COLUMNS) {
                if cell.is_none() {
                    *cell = Some(OddsCell::placeholder(market));
                }
            }
        }
    }
}

/// Build the grid for a set of odds ids. Later ids overwrite earlier ones
/// on the same cell.
pub(crate) fn event_odds(
    store: &EntityStore,
    odds_ids: &[OddsId],
    mode: FetchMode,
) -> Result<OddsGrid, EventIndexError> {
    let mut grid = OddsGrid::new();

    for &id in odds_ids {
        let record = store.odds(id).ok_or(EventIndexError::UnknownOdds { id })?;
        let Some(market) = MarketKind::from_display_id(record.market_display_id) else {
            continue;
        };
        let row = line_index(id, record)?;
        grid.rows[row][market.column()] = Some(odds_cell(id, record, market)?);
    }

    if mode == FetchMode::Created {
        grid.pad_with_placeholders();
    }
    Ok(grid)
}

fn line_index(id: OddsId, record: &OddsRecord) -> Result<usize, EventIndexError> {
    if record.line_number == 0 || record.line_number > MAX_LINES {
        return Err(EventIndexError::LineOutOfRange {
            id,
            line: record.line_number,
        });
    }
    Ok((record.line_number - 1) as usize)
}

fn odds_cell(id: OddsId, record: &OddsRecord, market: MarketKind) -> Result<OddsCell, EventIndexError> {
    let point = record
        .point()
        .and_then(as_decimal)
        .ok_or_else(|| invalid(id, "point", record.point()))?;
    let first = price(id, record.price(0));
    let second = price(id, record.price(1));

    let formatted = format_point(point);
    Ok(if market.is_handicap() {
        OddsCell::Handicap {
            point: formatted.text,
            home_price: first,
            away_price: second,
            favourite: formatted.favourite,
        }
    } else {
        OddsCell::OverUnder {
            point: formatted.text,
            over_price: first,
            under_price: second,
        }
    })
}

fn price(id: OddsId, raw: Option<&Value>) -> Option<Decimal> {
    let raw = raw.filter(|value| !value.is_null())?;
    let price = as_decimal(raw);
    if price.is_none() {
        warn!(odds_id = id, price = %raw, "Non-numeric price, leaving it unset");
    }
    price
}

fn invalid(id: OddsId, field: &'static str, value: Option<&Value>) -> EventIndexError {
    EventIndexError::invalid("odds", id, field, value.unwrap_or(&Value::Null))
}
