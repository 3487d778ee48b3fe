use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::{BIN_COUNT, MAX_SELECTED_DAYS, MIN_SELECTED_DAYS};

use super::labels::format_bin_label;
use super::validate::verify_bins;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// One of the fixed output slots of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBin {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl TimeBin {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.range().contains(ts)
    }
}

/// Floors and clamps a requested day count into
/// [`MIN_SELECTED_DAYS`, `MAX_SELECTED_DAYS`]. NaN counts as below range.
/// Never fails; any adjustment is logged.
pub fn clamp_selected_days(requested: f64) -> u32 {
    let clamped = clamp_days_quietly(requested);
    if requested != f64::from(clamped) {
        warn!(requested, clamped, "selected days adjusted into supported range");
    }
    clamped
}

pub(crate) fn clamp_days_quietly(requested: f64) -> u32 {
    if requested.is_nan() {
        return MIN_SELECTED_DAYS;
    }
    requested
        .floor()
        .clamp(f64::from(MIN_SELECTED_DAYS), f64::from(MAX_SELECTED_DAYS)) as u32
}

/// Rounds down to the start of the hour.
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    // Only fails for instants at the very edge of chrono's range.
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

/// Width of every bin for an already clamped day count: one hour per
/// selected day, so 24 bins always cover `days * 24` hours.
pub fn bin_width(days: u32) -> TimeDelta {
    TimeDelta::hours(i64::from(days.min(MAX_SELECTED_DAYS)))
}

/// Computes the [`BIN_COUNT`] bins covering the `selected_days` ending at the
/// start of `end_time`'s hour (now when absent).
pub fn compute_bins(selected_days: f64, end_time: Option<DateTime<Utc>>) -> Vec<TimeBin> {
    let days = clamp_selected_days(selected_days);
    let end = match end_time.map(truncate_to_hour) {
        Some(end) if has_room_for_bins(end) => end,
        Some(end) => {
            warn!(end_time = %end, "end time too early to bin, using current time");
            truncate_to_hour(Utc::now())
        }
        None => truncate_to_hour(Utc::now()),
    };
    bins_ending_at(days, end)
}

/// Whether the widest possible bin range ending at `end` is representable.
pub(crate) fn has_room_for_bins(end: DateTime<Utc>) -> bool {
    end.checked_sub_signed(bin_width(MAX_SELECTED_DAYS) * BIN_COUNT as i32)
        .is_some()
}

fn bins_ending_at(days: u32, end: DateTime<Utc>) -> Vec<TimeBin> {
    let width = bin_width(days);
    let start = end - width * BIN_COUNT as i32;

    let bins: Vec<TimeBin> = (0..BIN_COUNT)
        .map(|index| {
            let bin_start = start + width * index as i32;
            let range = TimeRange {
                start: bin_start,
                end: bin_start + width,
            };
            TimeBin {
                index,
                start: range.start,
                end: range.end,
                label: format_bin_label(&range, days),
            }
        })
        .collect();
    debug_assert_eq!(verify_bins(&bins, days), Ok(()));
    bins
}
