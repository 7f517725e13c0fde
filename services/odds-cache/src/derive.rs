//! Derived-field computation
//!
//! Pure conversions from raw feed values to the fields consumers see.
//! The lenient conversions (sort code, show time, betting availability,
//! display counts) fall back to a default or `None` and log a warning; the
//! strict ones return `None` and leave it to the caller to raise an
//! `EventIndexError`.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Show-time-type bit: in play, shown in blue.
pub const SHOW_TIME_BLUE_LIVE: i64 = 0x8;
/// Show-time-type bit: in play, shown in red.
pub const SHOW_TIME_RED_LIVE: i64 = 0x4;
/// Show-time-type bit: kick-off date and time shown.
pub const SHOW_TIME_DATE_TIME: i64 = 0x2;
/// Show-time-type bit: kick-off date only.
pub const SHOW_TIME_DATE_STARS: i64 = 0x1;

/// Seconds from the Unix epoch to 1900-01-01 00:00 UTC.
const DEFAULT_SHOW_TIME_SECS: i64 = -2_208_988_800;

const SHOW_TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Characters of the sort-code string that are significant.
const SORT_CODE_CHARS: usize = 5;

/// Which side the handicap favours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Favourite {
    Neither = 0,
    Home = 1,
    Away = 2,
}

/// A point rendered for display together with the side it favours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPoint {
    pub text: String,
    pub favourite: Favourite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    NotLive,
    FirstHalf,
    HalfTime,
    SecondHalf,
}

/// Stage of a match with the minutes played in each half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchStageDetails {
    /// `None` when the period matches no known stage.
    pub stage: Option<MatchStage>,
    pub first_half_elapsed: Option<i64>,
    pub second_half_elapsed: Option<i64>,
    pub injury_time: Option<i64>,
}

impl MatchStageDetails {
    pub fn not_live() -> Self {
        Self {
            stage: Some(MatchStage::NotLive),
            first_half_elapsed: Some(0),
            second_half_elapsed: Some(0),
            injury_time: Some(0),
        }
    }

    fn unknown() -> Self {
        Self {
            stage: None,
            first_half_elapsed: None,
            second_half_elapsed: None,
            injury_time: None,
        }
    }
}

/// Why a stage could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageField {
    Period,
    CurrentMinutes,
    TotalMinutes,
}

/// Sentinel show time used when the raw value is unusable.
pub fn default_show_time() -> DateTime<Utc> {
    DateTime::from_timestamp(DEFAULT_SHOW_TIME_SECS, 0).unwrap_or_default()
}

/// A raw JSON number as an exact decimal.
pub fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => {
            let text = number.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }
}

/// A raw JSON number as a whole count, truncating any fraction.
pub fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .and_then(|f| Decimal::from_f64_retain(f.trunc()))
                .and_then(|d| d.to_i64())
        }),
        _ => None,
    }
}

/// A display-only count; anything non-numeric becomes `None` with a warning.
pub fn lenient_count(value: &Value, field: &'static str) -> Option<i64> {
    let count = as_count(value);
    if count.is_none() {
        warn!(field, value = %value, "Non-numeric count, leaving it unset");
    }
    count
}

/// Integer sort key from a decimal-string sort code: the first five
/// characters scaled by 1000 and truncated. Unusable input yields 0.
///
/// Only plain decimal notation is read; exponent forms such as `"1e3"`
/// yield 0.
pub fn event_sort_code(raw: &Value) -> i64 {
    let parsed = raw.as_str().and_then(|code| {
        let head: String = code.chars().take(SORT_CODE_CHARS).collect();
        Decimal::from_str(head.trim()).ok()
    });
    match parsed.and_then(|d| (d * Decimal::ONE_THOUSAND).trunc().to_i64()) {
        Some(code) => code,
        None => {
            warn!(sort_code = %raw, "Unusable event sort code, using 0");
            0
        }
    }
}

/// Render a handicap or over/under point.
///
/// Multiples of 0.5 render as a single value; quarter points render as
/// the range spanning the two adjacent half points, e.g. 0.25 is "0-0.5".
pub fn format_point(point: Decimal) -> FormattedPoint {
    let favourite = if point.is_sign_negative() && !point.is_zero() {
        Favourite::Away
    } else if point.is_zero() {
        Favourite::Neither
    } else {
        Favourite::Home
    };

    let magnitude = point.abs();
    let half = Decimal::new(5, 1);
    let quarter = Decimal::new(25, 2);

    let text = if (magnitude % half).is_zero() {
        let mut text = single_point_text(magnitude);
        if !text.ends_with('0') {
            text.push('0');
        }
        text
    } else {
        format!(
            "{}-{}",
            (magnitude - quarter).normalize(),
            (magnitude + quarter).normalize()
        )
    };

    FormattedPoint { text, favourite }
}

fn single_point_text(value: Decimal) -> String {
    let value = value.normalize();
    if value.scale() == 0 {
        format!("{}.0", value)
    } else {
        value.to_string()
    }
}

/// Whether in-play betting is open, from the show-time-type bit field.
pub fn betting_available_in_play(raw: &Value) -> bool {
    let Some(bits) = raw.as_i64() else {
        warn!(show_time_type = %raw, "Non-integer show time type, betting closed");
        return false;
    };
    if bits & (SHOW_TIME_BLUE_LIVE | SHOW_TIME_RED_LIVE) != 0 {
        true
    } else if bits & (SHOW_TIME_DATE_TIME | SHOW_TIME_DATE_STARS) != 0 {
        false
    } else {
        warn!(show_time_type = bits, "Unknown show time type, betting closed");
        false
    }
}

/// Kick-off time in UTC from the feed's `M/D/YYYY H:M` wall-clock string.
///
/// Text after the minutes is ignored. Anything unparseable yields the
/// 1900-01-01 sentinel.
pub fn show_time(raw: &Value, gmt_offset_hours: i32) -> DateTime<Utc> {
    let parsed = raw
        .as_str()
        .and_then(|text| NaiveDateTime::parse_and_remainder(text, SHOW_TIME_FORMAT).ok())
        .and_then(|(local, _)| local.checked_sub_signed(Duration::hours(i64::from(gmt_offset_hours))));
    match parsed {
        Some(utc) => utc.and_utc(),
        None => {
            warn!(show_time = %raw, "Unparseable show time, using default");
            default_show_time()
        }
    }
}

/// Stage of a live match from its period and minute counters.
///
/// Only the fields a period needs are converted. Non-numeric minutes in
/// either half leave the elapsed time unset; the period, and both minute
/// counters past the second half, must convert or the failing field is
/// named.
pub fn match_stage(
    period: &Value,
    current_minutes: &Value,
    total_minutes: &Value,
) -> Result<MatchStageDetails, StageField> {
    let period = period.as_f64().ok_or(StageField::Period)?;

    if period == 1.0 {
        Ok(MatchStageDetails {
            stage: Some(MatchStage::FirstHalf),
            first_half_elapsed: lenient_count(current_minutes, "current_minutes"),
            second_half_elapsed: None,
            injury_time: Some(0),
        })
    } else if period == 5.0 {
        Ok(MatchStageDetails {
            stage: Some(MatchStage::HalfTime),
            first_half_elapsed: None,
            second_half_elapsed: None,
            injury_time: Some(0),
        })
    } else if period == 2.0 {
        Ok(MatchStageDetails {
            stage: Some(MatchStage::SecondHalf),
            first_half_elapsed: None,
            second_half_elapsed: lenient_count(current_minutes, "current_minutes"),
            injury_time: Some(0),
        })
    } else if period > 2.0 {
        let minutes = as_count(current_minutes).ok_or(StageField::CurrentMinutes)?;
        let total = as_count(total_minutes).ok_or(StageField::TotalMinutes)?;
        Ok(MatchStageDetails {
            stage: Some(MatchStage::SecondHalf),
            first_half_elapsed: None,
            second_half_elapsed: Some(minutes),
            injury_time: Some(minutes - total),
        })
    } else {
        Ok(MatchStageDetails::unknown())
    }
}
