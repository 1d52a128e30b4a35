use crate::models::TimeDim;
use crate::processor::events::PlayEvent;
use chrono::{DateTime, Datelike, Timelike, Utc};
use common::{Error, Result};
use std::collections::BTreeMap;

/// Turns epoch milliseconds into a UTC timestamp. Missing, non-numeric,
/// negative and out-of-range values are rejected.
pub fn decode_timestamp(ts: Option<i64>) -> Result<DateTime<Utc>> {
    let millis =
        ts.ok_or_else(|| Error::TimestampDecode("ts is missing or non-numeric".to_string()))?;

    if millis < 0 {
        return Err(Error::TimestampDecode(format!("ts {} is negative", millis)));
    }

    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::TimestampDecode(format!("ts {} is out of range", millis)))
}

pub fn decompose(start_time: DateTime<Utc>) -> TimeDim {
    TimeDim {
        start_time,
        hour: start_time.hour() as i32,
        day: start_time.day() as i32,
        week: start_time.iso_week().week() as i32,
        month: start_time.month() as i32,
        year: start_time.year(),
        weekday: start_time.weekday().num_days_from_monday() as i32,
    }
}

/// One row per distinct play timestamp, ordered by start_time.
pub fn build_time_table(plays: &[PlayEvent]) -> Vec<TimeDim> {
    plays
        .iter()
        .map(|play| (play.ts, play.start_time))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .map(decompose)
        .collect()
}
