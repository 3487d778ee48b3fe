//! Behavioral constants for binning, data retention, and pruning.

use chrono::Duration;

/// Every chart is drawn from exactly this many bins, whatever the range.
pub const BIN_COUNT: usize = 24;

pub const MIN_SELECTED_DAYS: u32 = 1;
pub const MAX_SELECTED_DAYS: u32 = 24;
pub const DEFAULT_SELECTED_DAYS: u32 = 1;

/// Day counts offered by the range selector on the silo page.
pub const DAY_CHOICES: &[u32] = &[1, 3, 6, 12, 24];

/// Longest selectable range plus one day, so the oldest bin stays populated
/// between prune passes.
pub const DATA_RETENTION: Duration = Duration::days(MAX_SELECTED_DAYS as i64 + 1);
pub const PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);
