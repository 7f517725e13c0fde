//! Clock extrapolation
//!
//! The feed only resends a live match's minute counter when it changes on
//! its side, which can lag. Between reports the counter is advanced from
//! the last reported value by the wall-clock time since that report,
//! capped at the match's scheduled total minutes.

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

use crate::store::ClockEntry;

/// Minutes a match clock should show at `now`.
///
/// Returns `None` when the cached minutes or the total are not numeric.
pub fn extrapolate_minutes(entry: &ClockEntry, total_minutes: &Value, now: DateTime<Utc>) -> Option<Value> {
    let cached = entry.current_minutes.as_f64()?;
    let total = total_minutes.as_f64()?;
    let elapsed_secs = (now - entry.cached_at).num_milliseconds() as f64 / 1000.0;
    let minutes = (cached + elapsed_secs / 60.0).floor().min(total);
    Some(minutes_value(minutes))
}

/// Integral minute values are stored as JSON integers.
fn minutes_value(minutes: f64) -> Value {
    if minutes.fract() == 0.0 && minutes.abs() < i64::MAX as f64 {
        Value::from(minutes as i64)
    } else {
        Number::from_f64(minutes).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use serde_json::json;

    fn entry_at(minutes: Value, at: DateTime<Utc>) -> ClockEntry {
        ClockEntry {
            current_minutes: minutes,
            cached_at: at,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 2, 19, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_advances_whole_minutes() {
        let entry = entry_at(json!(12), base_time());
        let now = base_time() + Duration::seconds(150);
        assert_eq!(extrapolate_minutes(&entry, &json!(45), now), Some(json!(14)));
    }

    #[test]
    fn test_no_elapsed_time_keeps_value() {
        let entry = entry_at(json!(20), base_time());
        assert_eq!(extrapolate_minutes(&entry, &json!(45), base_time()), Some(json!(20)));
    }

    #[test]
    fn test_capped_at_total() {
        let entry = entry_at(json!(44), base_time());
        let now = base_time() + Duration::minutes(10);
        assert_eq!(extrapolate_minutes(&entry, &json!(45), now), Some(json!(45)));
    }

    #[test]
    fn test_twenty_minutes_advance_then_cap() {
        let entry = entry_at(json!(20), base_time());
        let ten_minutes_on = base_time() + Duration::seconds(600);
        assert_eq!(extrapolate_minutes(&entry, &json!(45), ten_minutes_on), Some(json!(30)));

        let past_full_time = base_time() + Duration::seconds(2000);
        assert_eq!(extrapolate_minutes(&entry, &json!(45), past_full_time), Some(json!(45)));
    }

    #[test]
    fn test_non_numeric_values_skip() {
        let entry = entry_at(json!("12"), base_time());
        assert_eq!(extrapolate_minutes(&entry, &json!(45), base_time()), None);

        let entry = entry_at(json!(12), base_time());
        assert_eq!(extrapolate_minutes(&entry, &Value::Null, base_time()), None);
    }

    proptest! {
        #[test]
        fn prop_never_decreases_or_exceeds_total(
            cached in 0i64..90,
            total in 0i64..120,
            elapsed in 0i64..20_000,
        ) {
            prop_assume!(cached <= total);
            let entry = entry_at(json!(cached), base_time());
            let now = base_time() + Duration::seconds(elapsed);
            let minutes = extrapolate_minutes(&entry, &json!(total), now)
                .and_then(|v| v.as_i64())
                .unwrap();
            prop_assert!(minutes >= cached);
            prop_assert!(minutes <= total);
        }
    }
}
