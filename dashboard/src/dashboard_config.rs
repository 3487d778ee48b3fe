use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::charts::{AggregationType, MetricAggregations};
use crate::config::DEFAULT_SELECTED_DAYS;

/// Layout of the silo detail page, read from a TOML file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DashboardConfig {
    #[serde(default = "default_days")]
    pub default_days: u32,
    #[serde(default = "default_charts")]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChartConfig {
    pub metric: String,
    pub aggregation: AggregationType,
    #[serde(default)]
    pub chart_type: ChartType,
}

/// Chart visualization types.
///
/// `Line` leaves empty bins as gaps; `Bar` draws no bar for them.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
}

impl ChartType {
    pub fn display_name(&self) -> &str {
        match self {
            ChartType::Line => "Line",
            ChartType::Bar => "Bar",
        }
    }
}

fn default_days() -> u32 {
    DEFAULT_SELECTED_DAYS
}

fn default_charts() -> Vec<ChartConfig> {
    vec![
        ChartConfig {
            metric: "temperature".to_owned(),
            aggregation: AggregationType::Avg,
            chart_type: ChartType::Line,
        },
        ChartConfig {
            metric: "level".to_owned(),
            aggregation: AggregationType::Latest,
            chart_type: ChartType::Bar,
        },
    ]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            default_days: default_days(),
            charts: default_charts(),
        }
    }
}

impl DashboardConfig {
    /// Metric → aggregation for every configured chart. A metric charted more
    /// than once keeps its first aggregation.
    pub fn metric_aggregations(&self) -> MetricAggregations {
        let mut metrics = MetricAggregations::new();
        for chart in &self.charts {
            metrics
                .entry(chart.metric.clone())
                .or_insert(chart.aggregation);
        }
        metrics
    }
}

/// Loads the dashboard layout. Returns `DashboardConfig::default()` if the
/// file doesn't exist; propagates other I/O and parse errors.
pub fn load(path: &Path) -> io::Result<DashboardConfig> {
    match fs::read_to_string(path) {
        Ok(content) => parse(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DashboardConfig::default()),
        Err(e) => Err(e),
    }
}

fn parse(content: &str) -> io::Result<DashboardConfig> {
    toml::from_str(content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layout_file() {
        let config = parse(
            r#"
            default_days = 6

            [[charts]]
            metric = "humidity"
            aggregation = "max"
            chart_type = "bar"

            [[charts]]
            metric = "temperature"
            aggregation = "latest"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_days, 6);
        assert_eq!(config.charts.len(), 2);
        assert_eq!(config.charts[0].chart_type, ChartType::Bar);
        assert_eq!(config.charts[1].chart_type, ChartType::Line);
        assert_eq!(
            config.metric_aggregations(),
            MetricAggregations::from([
                ("humidity".to_owned(), AggregationType::Max),
                ("temperature".to_owned(), AggregationType::Latest),
            ])
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(parse("").unwrap(), DashboardConfig::default());
    }

    #[test]
    fn unknown_aggregation_is_rejected() {
        let err = parse(
            r#"
            [[charts]]
            metric = "temperature"
            aggregation = "median"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = load(Path::new("/nonexistent/silo-dashboard.toml")).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }
}
