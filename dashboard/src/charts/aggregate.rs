use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ChartError;
use super::bins::{TimeBin, TimeRange};

pub type EntityId = u32;

/// Metric name → how to reduce it within a bin.
pub type MetricAggregations = BTreeMap<String, AggregationType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Avg,
    Max,
    Min,
    Sum,
    Count,
    /// Value of the most recent reading in the bin.
    Latest,
}

impl AggregationType {
    pub const ALL: [AggregationType; 6] = [
        AggregationType::Avg,
        AggregationType::Max,
        AggregationType::Min,
        AggregationType::Sum,
        AggregationType::Count,
        AggregationType::Latest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Avg => "avg",
            AggregationType::Max => "max",
            AggregationType::Min => "min",
            AggregationType::Sum => "sum",
            AggregationType::Count => "count",
            AggregationType::Latest => "latest",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationType {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregationType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChartError::UnknownAggregation(s.to_owned()))
    }
}

/// Parses `temperature:avg,level:latest` into a metric configuration.
/// Fails on the first unknown aggregation or malformed entry.
pub fn parse_metric_aggregations(spec: &str) -> Result<MetricAggregations, ChartError> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, agg) = entry
                .split_once(':')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| ChartError::MalformedMetricSpec(entry.to_owned()))?;
            Ok((name.trim().to_owned(), agg.parse()?))
        })
        .collect()
}

/// Anything the aggregator can place on the time axis. `None` means the
/// timestamp could not be resolved and the record is skipped.
pub trait Timestamped {
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

impl<T: Timestamped + ?Sized> Timestamped for &T {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        (**self).timestamp()
    }
}

/// A reading belonging to one silo and carrying named metric values.
pub trait EntityReading: Timestamped {
    fn entity_id(&self) -> EntityId;
    fn metric(&self, name: &str) -> Option<f64>;
}

impl<T: EntityReading + ?Sized> EntityReading for &T {
    fn entity_id(&self) -> EntityId {
        (**self).entity_id()
    }

    fn metric(&self, name: &str) -> Option<f64> {
        (**self).metric(name)
    }
}

/// Aggregated value of one bin. `count == 0` means no data; `value` is then 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinnedDataPoint {
    pub bin_index: usize,
    pub value: f64,
    pub count: usize,
    pub time_range: TimeRange,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricValue {
    pub value: f64,
    pub count: usize,
}

/// All configured metrics of one silo within one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityBinRecord {
    pub entity_id: EntityId,
    pub bin_index: usize,
    pub time_range: TimeRange,
    pub label: String,
    pub metrics: BTreeMap<String, MetricValue>,
}

/// One metric across silos within one bin. Silos without data in the bin are
/// absent from `values`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSeries {
    pub bin_index: usize,
    pub time_range: TimeRange,
    pub label: String,
    pub values: BTreeMap<EntityId, f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
    latest: Option<(DateTime<Utc>, f64)>,
}

impl Accumulator {
    fn push(&mut self, ts: DateTime<Utc>, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        // Ties go to the reading seen last.
        if self.latest.is_none_or(|(seen, _)| ts >= seen) {
            self.latest = Some((ts, value));
        }
    }

    fn finish(&self, aggregation: AggregationType) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        match aggregation {
            AggregationType::Avg => self.sum / self.count as f64,
            AggregationType::Max => self.max,
            AggregationType::Min => self.min,
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.count as f64,
            AggregationType::Latest => self.latest.map_or(0.0, |(_, v)| v),
        }
    }
}

/// Index of the bin whose half-open interval holds `ts`. Bins must be
/// ordered by start.
fn locate_bin(bins: &[TimeBin], ts: DateTime<Utc>) -> Option<usize> {
    let after = bins.partition_point(|b| b.start <= ts);
    let candidate = after.checked_sub(1)?;
    bins[candidate].contains(ts).then_some(candidate)
}

/// Bin index for every record that has a resolvable timestamp inside the
/// bins. Unresolvable timestamps are counted and logged once per call.
fn assign_bins<'a, R: Timestamped>(
    data: &'a [R],
    bins: &[TimeBin],
) -> Vec<(usize, DateTime<Utc>, &'a R)> {
    let mut unresolved = 0usize;
    let assigned = data
        .iter()
        .filter_map(|record| {
            let Some(ts) = record.timestamp() else {
                unresolved += 1;
                return None;
            };
            locate_bin(bins, ts).map(|idx| (idx, ts, record))
        })
        .collect();
    if unresolved > 0 {
        warn!(unresolved, "excluded readings with unparsable timestamps");
    }
    assigned
}

fn reduce<'a, R: 'a>(
    assigned: &[(usize, DateTime<Utc>, &'a R)],
    bins: &[TimeBin],
    value_extractor: impl Fn(&R) -> Option<f64>,
    aggregation: AggregationType,
) -> Vec<MetricValue> {
    let mut accumulators = vec![Accumulator::default(); bins.len()];
    for &(idx, ts, record) in assigned {
        if let Some(value) = value_extractor(record).filter(|v| v.is_finite()) {
            accumulators[idx].push(ts, value);
        }
    }
    accumulators
        .iter()
        .map(|acc| MetricValue {
            value: acc.finish(aggregation),
            count: acc.count,
        })
        .collect()
}

/// Reduces `data` to one point per bin, in bin order.
///
/// A record contributes to a bin when its timestamp lies in the bin's
/// half-open interval and `value_extractor` yields a finite number. Empty
/// bins come back as `value = 0, count = 0`.
pub fn aggregate_into_bins<R: Timestamped>(
    data: &[R],
    bins: &[TimeBin],
    value_extractor: impl Fn(&R) -> Option<f64>,
    aggregation: AggregationType,
) -> Vec<BinnedDataPoint> {
    let assigned = assign_bins(data, bins);
    reduce(&assigned, bins, value_extractor, aggregation)
        .into_iter()
        .zip(bins)
        .map(|(mv, bin)| BinnedDataPoint {
            bin_index: bin.index,
            value: mv.value,
            count: mv.count,
            time_range: bin.range(),
            label: bin.label.clone(),
        })
        .collect()
}

/// Aggregates every configured metric for every silo present in `data`.
///
/// Output holds one record per (silo, bin), ordered by silo id then bin
/// index. Each metric is reduced independently with its own aggregation.
pub fn aggregate_entities<R: EntityReading>(
    data: &[R],
    bins: &[TimeBin],
    metrics: &MetricAggregations,
) -> Vec<EntityBinRecord> {
    let mut by_entity: BTreeMap<EntityId, Vec<&R>> = BTreeMap::new();
    for record in data {
        by_entity.entry(record.entity_id()).or_default().push(record);
    }

    let mut records = Vec::with_capacity(by_entity.len() * bins.len());
    for (entity_id, readings) in by_entity {
        let assigned = assign_bins(&readings, bins);
        let mut per_bin: Vec<BTreeMap<String, MetricValue>> = vec![BTreeMap::new(); bins.len()];
        for (name, &aggregation) in metrics {
            let values = reduce(&assigned, bins, |r: &&R| r.metric(name), aggregation);
            for (slot, mv) in per_bin.iter_mut().zip(values) {
                slot.insert(name.clone(), mv);
            }
        }
        records.extend(bins.iter().zip(per_bin).map(|(bin, values)| EntityBinRecord {
            entity_id,
            bin_index: bin.index,
            time_range: bin.range(),
            label: bin.label.clone(),
            metrics: values,
        }));
    }
    records
}

/// Regroups per-silo records into one entry per bin mapping silo id to the
/// value of `metric`. Every bin is present; silos with no data for the bin
/// are left out of its map.
pub fn pivot_by_bin(bins: &[TimeBin], records: &[EntityBinRecord], metric: &str) -> Vec<BinSeries> {
    let mut series: Vec<BinSeries> = bins
        .iter()
        .map(|bin| BinSeries {
            bin_index: bin.index,
            time_range: bin.range(),
            label: bin.label.clone(),
            values: BTreeMap::new(),
        })
        .collect();
    for record in records {
        let Some(mv) = record.metrics.get(metric).filter(|mv| mv.count > 0) else {
            continue;
        };
        if let Some(slot) = series.iter_mut().find(|s| s.bin_index == record.bin_index) {
            slot.values.insert(record.entity_id, mv.value);
        }
    }
    series
}
