use chrono::Datelike;

use crate::config::{MAX_SELECTED_DAYS, MIN_SELECTED_DAYS};

use super::bins::{TimeBin, TimeRange};

/// Axis label for one bin. Daily bins show the date (`09 Aug`), hourly bins
/// the hour (`14:00`), anything in between day-of-month and hour (`09 14:00`).
pub fn format_bin_label(range: &TimeRange, selected_days: u32) -> String {
    let format = match selected_days.clamp(MIN_SELECTED_DAYS, MAX_SELECTED_DAYS) {
        MAX_SELECTED_DAYS => "%d %b",
        MIN_SELECTED_DAYS => "%H:%M",
        _ => "%d %H:%M",
    };
    range.start.format(format).to_string()
}

pub fn axis_labels(bins: &[TimeBin], selected_days: u32) -> Vec<String> {
    bins.iter()
        .map(|bin| format_bin_label(&bin.range(), selected_days))
        .collect()
}

/// Indices of bins whose start falls on a different day-of-month than the
/// previous bin's start. Empty once every bin already spans a full day.
///
/// A bin straddling midnight does not produce a separator of its own; the
/// change is reported at the following bin.
pub fn day_separator_positions(bins: &[TimeBin], selected_days: u32) -> Vec<usize> {
    if selected_days >= MAX_SELECTED_DAYS {
        return Vec::new();
    }
    bins.windows(2)
        .filter(|pair| pair[0].start.day() != pair[1].start.day())
        .map(|pair| pair[1].index)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::charts::bins::compute_bins;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn is_hour_only(label: &str) -> bool {
        let b = label.as_bytes();
        b.len() == 5 && b[2] == b':' && label[..2].parse::<u32>().is_ok_and(|h| h < 24)
    }

    #[test]
    fn hourly_labels_for_one_day() {
        let bins = compute_bins(1.0, Some(at(2024, 8, 9, 14)));
        assert!(bins.iter().all(|b| is_hour_only(&b.label)));
        assert_eq!(bins[23].label, "13:00");
        assert_eq!(bins[0].label, "14:00");
    }

    #[test]
    fn date_labels_for_twenty_four_days() {
        let bins = compute_bins(24.0, Some(at(2024, 8, 25, 0)));
        for bin in &bins {
            let (day, month) = bin.label.split_once(' ').unwrap();
            assert_eq!(day.len(), 2);
            assert!(day.parse::<u32>().is_ok());
            assert!(month.chars().all(|c| c.is_ascii_alphabetic()));
        }
        assert_eq!(bins[0].label, "01 Aug");
        assert_eq!(bins[23].label, "24 Aug");
    }

    #[test]
    fn day_and_hour_labels_in_between() {
        let bins = compute_bins(6.0, Some(at(2024, 8, 9, 14)));
        for bin in &bins {
            let (day, hour) = bin.label.split_once(' ').unwrap();
            assert!(day.parse::<u32>().is_ok());
            assert!(is_hour_only(hour));
        }
        assert_eq!(bins[0].label, "03 14:00");
    }

    #[test]
    fn axis_labels_match_precomputed() {
        let bins = compute_bins(12.0, Some(at(2024, 8, 9, 14)));
        let labels = axis_labels(&bins, 12);
        let stored: Vec<String> = bins.iter().map(|b| b.label.clone()).collect();
        assert_eq!(labels, stored);
    }

    #[test]
    fn out_of_range_days_pick_nearest_tier() {
        let range = TimeRange {
            start: at(2024, 8, 9, 14),
            end: at(2024, 8, 9, 15),
        };
        assert_eq!(format_bin_label(&range, 0), "14:00");
        assert_eq!(format_bin_label(&range, 90), "09 Aug");
    }

    #[test]
    fn no_separators_at_max_range() {
        let bins = compute_bins(24.0, Some(at(2024, 8, 9, 14)));
        assert!(day_separator_positions(&bins, 24).is_empty());
    }

    #[test]
    fn separators_for_three_midnight_aligned_days() {
        let bins = compute_bins(3.0, Some(at(2024, 8, 9, 0)));
        let positions = day_separator_positions(&bins, 3);
        assert_eq!(positions, vec![8, 16]);
        for &i in &positions {
            assert_ne!(bins[i].start.day(), bins[i - 1].start.day());
        }
    }

    #[test]
    fn separators_for_unaligned_end() {
        let bins = compute_bins(3.0, Some(at(2024, 8, 9, 10)));
        let positions = day_separator_positions(&bins, 3);
        assert!(!positions.contains(&0));
        for &i in &positions {
            assert_ne!(bins[i].start.day(), bins[i - 1].start.day());
        }
        // Start at 10:00 on the 6th: days change at 00:00 on the 7th, 8th and 9th.
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn single_day_crosses_midnight_once() {
        let bins = compute_bins(1.0, Some(at(2024, 8, 9, 14)));
        assert_eq!(day_separator_positions(&bins, 1), vec![10]);
    }

    #[test]
    fn straddling_bin_reports_following_index() {
        // 5-hour bins from 15:00 on the 4th: bin 1 covers 20:00..01:00.
        let bins = compute_bins(5.0, Some(at(2024, 8, 9, 15)));
        let positions = day_separator_positions(&bins, 5);
        assert_eq!(bins[1].start, at(2024, 8, 4, 20));
        assert_eq!(positions[0], 2);
    }
}
