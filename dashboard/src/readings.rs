use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::charts::{EntityId, EntityReading, Timestamped};

/// Timestamp as delivered by the telemetry API: an RFC 3339 instant, epoch
/// milliseconds, or free-form text that may or may not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingTimestamp {
    Instant(DateTime<Utc>),
    EpochMillis(i64),
    Text(String),
}

impl ReadingTimestamp {
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            ReadingTimestamp::Instant(ts) => Some(*ts),
            ReadingTimestamp::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms),
            ReadingTimestamp::Text(raw) => parse_text(raw),
        }
    }
}

fn parse_text(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Naive forms are taken as UTC.
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl From<DateTime<Utc>> for ReadingTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        ReadingTimestamp::Instant(ts)
    }
}

/// One sensor record for a silo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(alias = "silo_id")]
    pub entity_id: EntityId,
    pub timestamp: ReadingTimestamp,
    #[serde(default, deserialize_with = "metrics_without_nulls")]
    pub metrics: BTreeMap<String, f64>,
}

/// `null` metric values are treated as absent.
fn metrics_without_nulls<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect())
}

/// Decodes an ingest batch element by element so one malformed reading does
/// not sink the rest. Returns the decoded readings and how many were dropped.
pub fn decode_batch(batch: Vec<Value>) -> (Vec<RawReading>, usize) {
    let mut malformed = 0;
    let readings = batch
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawReading>(value) {
            Ok(reading) => Some(reading),
            Err(e) => {
                debug!(error = %e, "rejecting malformed reading");
                malformed += 1;
                None
            }
        })
        .collect();
    (readings, malformed)
}

impl Timestamped for RawReading {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.resolve()
    }
}

impl EntityReading for RawReading {
    fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// In-memory per-silo reading history, bounded by a retention period.
pub struct ReadingStore {
    readings: BTreeMap<EntityId, Vec<(DateTime<Utc>, RawReading)>>,
    retention: Duration,
}

impl ReadingStore {
    pub fn new(retention: Duration) -> Self {
        ReadingStore {
            readings: BTreeMap::new(),
            retention,
        }
    }

    /// Stores a batch of readings. Readings whose timestamp cannot be
    /// resolved are rejected and counted.
    pub fn record(&mut self, batch: Vec<RawReading>) -> IngestSummary {
        let mut summary = IngestSummary {
            accepted: 0,
            rejected: 0,
        };
        for reading in batch {
            let Some(ts) = reading.timestamp.resolve() else {
                debug!(silo = reading.entity_id, timestamp = ?reading.timestamp, "rejecting reading");
                summary.rejected += 1;
                continue;
            };
            self.readings
                .entry(reading.entity_id)
                .or_default()
                .push((ts, reading));
            summary.accepted += 1;
        }
        summary
    }

    /// Readings for the given silos with timestamps in `[start, end)`.
    pub fn query_window(
        &self,
        entity_ids: &[EntityId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&RawReading> {
        entity_ids
            .iter()
            .filter_map(|id| self.readings.get(id))
            .flatten()
            .filter(|(ts, _)| *ts >= start && *ts < end)
            .map(|(_, reading)| reading)
            .collect()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.readings.keys().copied().collect()
    }

    pub fn reading_count(&self, entity_id: EntityId) -> usize {
        self.readings.get(&entity_id).map_or(0, Vec::len)
    }

    pub fn metric_names(&self, entity_id: EntityId) -> Vec<String> {
        let Some(readings) = self.readings.get(&entity_id) else {
            return Vec::new();
        };
        readings
            .iter()
            .flat_map(|(_, r)| r.metrics.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Drops readings older than the retention period relative to `now` and
    /// forgets silos left without any. Returns how many readings were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut removed = 0;
        for history in self.readings.values_mut() {
            let before = history.len();
            history.retain(|(ts, _)| *ts >= cutoff);
            removed += before - history.len();
        }
        self.readings.retain(|_, history| !history.is_empty());
        removed
    }
}
