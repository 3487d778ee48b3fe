//! Time-series binning engine.
//!
//! Irregular readings are reduced to exactly [`BIN_COUNT`] equal-width,
//! contiguous bins ending at the start of the current hour. Each bin gets one
//! aggregated value per metric, an axis label, and, for ranges shorter than
//! [`MAX_SELECTED_DAYS`] days, day-separator hints for the renderer.
//!
//! [`BIN_COUNT`]: crate::config::BIN_COUNT
//! [`MAX_SELECTED_DAYS`]: crate::config::MAX_SELECTED_DAYS

pub mod aggregate;
pub mod bins;
pub mod labels;
pub mod svg;
pub mod validate;

use thiserror::Error;

pub use aggregate::{
    AggregationType, BinSeries, BinnedDataPoint, EntityBinRecord, EntityId, EntityReading,
    MetricAggregations, MetricValue, Timestamped, aggregate_entities, aggregate_into_bins,
    parse_metric_aggregations, pivot_by_bin,
};
pub use bins::{TimeBin, TimeRange, clamp_selected_days, compute_bins, truncate_to_hour};
pub use labels::{axis_labels, day_separator_positions, format_bin_label};
pub use validate::{BinParamsReport, resolve_end_time, validate_bin_params, verify_bins};

#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("unknown aggregation type: {0:?}")]
    UnknownAggregation(String),
    #[error("malformed metric spec {0:?}, expected name:aggregation")]
    MalformedMetricSpec(String),
    #[error("expected {expected} bins, got {actual}")]
    BinCount { expected: usize, actual: usize },
    #[error("bin {index} does not start where the previous bin ends")]
    Discontiguous { index: usize },
    #[error("bin {index} is {actual_minutes} minutes wide, expected {expected_minutes}")]
    UnevenWidth {
        index: usize,
        actual_minutes: i64,
        expected_minutes: i64,
    },
    #[error("bins span {actual_hours}h, expected {expected_hours}h")]
    Span {
        actual_hours: i64,
        expected_hours: i64,
    },
}
