use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::{BIN_COUNT, MAX_SELECTED_DAYS, MIN_SELECTED_DAYS};

use super::ChartError;
use super::bins::{TimeBin, bin_width, clamp_days_quietly, has_room_for_bins, truncate_to_hour};

/// Outcome of checking a `(selected_days, end_time)` pair. Problems are
/// reported as warnings; the normalized values are what binning will use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinParamsReport {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub clamped_days: u32,
    pub end_time: DateTime<Utc>,
}

/// Parses an RFC 3339 or epoch-millisecond end time. Instants too early to
/// hold a full bin range count as unparsable.
fn parse_end_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let ts = match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis),
    };
    ts.filter(|ts| has_room_for_bins(truncate_to_hour(*ts)))
}

/// Parses an RFC 3339 or epoch-millisecond end time, falling back to now.
pub fn resolve_end_time(raw: Option<&str>) -> DateTime<Utc> {
    match raw {
        None => Utc::now(),
        Some(raw) => parse_end_time(raw).unwrap_or_else(|| {
            warn!(end_time = raw, "unparsable end time, using current time");
            Utc::now()
        }),
    }
}

pub fn validate_bin_params(selected_days: f64, end_time: Option<&str>) -> BinParamsReport {
    validate_at(selected_days, end_time, Utc::now())
}

fn validate_at(selected_days: f64, end_time: Option<&str>, now: DateTime<Utc>) -> BinParamsReport {
    let mut warnings = Vec::new();

    let clamped_days = clamp_days_quietly(selected_days);
    if !selected_days.is_finite() {
        warnings.push(format!(
            "selected days {selected_days} is not a finite number, using {clamped_days}"
        ));
    } else if selected_days.fract() != 0.0 {
        warnings.push(format!(
            "selected days {selected_days} is not a whole number, using {clamped_days}"
        ));
    } else if selected_days < f64::from(MIN_SELECTED_DAYS)
        || selected_days > f64::from(MAX_SELECTED_DAYS)
    {
        warnings.push(format!(
            "selected days {selected_days} is outside {MIN_SELECTED_DAYS}..={MAX_SELECTED_DAYS}, will be clamped to {clamped_days}"
        ));
    }

    let end = match end_time {
        None => now,
        Some(raw) => parse_end_time(raw).unwrap_or_else(|| {
            warnings.push(format!("end time {raw:?} is not a valid timestamp, using current time"));
            now
        }),
    };
    if end > now {
        warnings.push(format!("end time {} is in the future", end.to_rfc3339()));
    }

    BinParamsReport {
        valid: warnings.is_empty(),
        warnings,
        clamped_days,
        end_time: truncate_to_hour(end),
    }
}

/// Checks the structural invariants of a bin sequence built for
/// `selected_days`: count, contiguity, equal width, and exact span.
pub fn verify_bins(bins: &[TimeBin], selected_days: u32) -> Result<(), ChartError> {
    if bins.len() != BIN_COUNT {
        return Err(ChartError::BinCount {
            expected: BIN_COUNT,
            actual: bins.len(),
        });
    }

    let days = selected_days.clamp(MIN_SELECTED_DAYS, MAX_SELECTED_DAYS);
    let width = bin_width(days);
    for (index, bin) in bins.iter().enumerate() {
        if index > 0 && bins[index - 1].end != bin.start {
            return Err(ChartError::Discontiguous { index });
        }
        let actual = bin.end - bin.start;
        if actual != width {
            return Err(ChartError::UnevenWidth {
                index,
                actual_minutes: actual.num_minutes(),
                expected_minutes: width.num_minutes(),
            });
        }
    }

    let span = bins[BIN_COUNT - 1].end - bins[0].start;
    let expected = TimeDelta::days(i64::from(days));
    if span != expected {
        return Err(ChartError::Span {
            actual_hours: span.num_hours(),
            expected_hours: expected.num_hours(),
        });
    }
    Ok(())
}
