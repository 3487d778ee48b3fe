use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::charts::{
    AggregationType, BinParamsReport, BinSeries, BinnedDataPoint, ChartError, EntityBinRecord,
    EntityId, EntityReading, MetricAggregations, TimeBin, aggregate_entities, aggregate_into_bins,
    clamp_selected_days, compute_bins, day_separator_positions, parse_metric_aggregations,
    pivot_by_bin, resolve_end_time, validate_bin_params,
};
use crate::readings::{IngestSummary, ReadingStore, decode_batch};
use crate::settings::ChartSettings;
use crate::state::AppState;
use crate::views;

const FALLBACK_METRIC: &str = "temperature";

pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/silos/{id}/bins", get(silo_bins))
        .route("/bins", get(entity_bins))
        .route("/compare", get(compare))
        .route("/validate", get(validate))
        .route("/settings", get(get_settings).post(update_settings));

    Router::new()
        .route("/", get(views::index))
        .route("/styles.css", get(views::styles))
        .route("/readings", post(record_readings))
        .route("/silo/{id}", get(views::silo_detail::silo_detail))
        .route(
            "/fragments/silo/{id}/charts",
            get(views::silo_detail::fragment_silo_charts),
        )
        .nest("/api", api_routes)
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl From<ChartError> for ApiError {
    fn from(e: ChartError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

/// Clamped day count and bins for a request, defaulting the day count to the
/// current settings and the end time to now.
pub fn bins_for_request(
    days: Option<f64>,
    end: Option<&str>,
    settings: &ChartSettings,
) -> (u32, Vec<TimeBin>) {
    let days = clamp_selected_days(days.unwrap_or(f64::from(settings.selected_days)));
    let end = resolve_end_time(end);
    (days, compute_bins(f64::from(days), Some(end)))
}

/// Aggregation for `metric`: explicit request value, else the configured
/// one, else average.
fn aggregation_for(
    requested: Option<&str>,
    metric: &str,
    settings: &ChartSettings,
) -> Result<AggregationType, ApiError> {
    match requested {
        Some(raw) => Ok(raw.parse::<AggregationType>()?),
        None => Ok(settings
            .metrics
            .get(metric)
            .copied()
            .unwrap_or(AggregationType::Avg)),
    }
}

fn parse_silos(raw: Option<&str>, store: &ReadingStore) -> Result<Vec<EntityId>, ApiError> {
    let Some(raw) = raw else {
        return Ok(store.entity_ids());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid silo id {s:?}")))
        })
        .collect()
}

/// `[start, end)` covered by `bins`.
pub fn request_window(bins: &[TimeBin]) -> (DateTime<Utc>, DateTime<Utc>) {
    match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => {
            let now = Utc::now();
            (now, now)
        }
    }
}

pub async fn record_readings(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<Vec<serde_json::Value>>,
) -> (StatusCode, Json<IngestSummary>) {
    let (batch, malformed) = decode_batch(batch);
    let mut summary = state.readings.write().unwrap().record(batch);
    summary.rejected += malformed;
    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        "ingested readings"
    );
    (StatusCode::CREATED, Json(summary))
}

#[derive(Deserialize)]
pub struct SiloBinsQuery {
    days: Option<f64>,
    end: Option<String>,
    metric: Option<String>,
    agg: Option<String>,
}

#[derive(Serialize)]
pub struct SiloBinsResponse {
    silo_id: EntityId,
    metric: String,
    aggregation: AggregationType,
    selected_days: u32,
    day_separators: Vec<usize>,
    points: Vec<BinnedDataPoint>,
}

pub async fn silo_bins(
    Path(id): Path<EntityId>,
    Query(query): Query<SiloBinsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SiloBinsResponse>, ApiError> {
    let settings = state.settings.snapshot();
    let metric = query.metric.unwrap_or_else(|| {
        state
            .layout
            .charts
            .first()
            .map_or_else(|| FALLBACK_METRIC.to_owned(), |c| c.metric.clone())
    });
    let aggregation = aggregation_for(query.agg.as_deref(), &metric, &settings)?;
    let (days, bins) = bins_for_request(query.days, query.end.as_deref(), &settings);
    let (start, end) = request_window(&bins);

    let points = {
        let store = state.readings.read().unwrap();
        let readings = store.query_window(&[id], start, end);
        aggregate_into_bins(&readings, &bins, |r| r.metric(&metric), aggregation)
    };

    Ok(Json(SiloBinsResponse {
        silo_id: id,
        day_separators: day_separator_positions(&bins, days),
        metric,
        aggregation,
        selected_days: days,
        points,
    }))
}

#[derive(Deserialize)]
pub struct EntityBinsQuery {
    silos: Option<String>,
    metrics: Option<String>,
    days: Option<f64>,
    end: Option<String>,
}

#[derive(Serialize)]
pub struct EntityBinsResponse {
    selected_days: u32,
    metrics: MetricAggregations,
    day_separators: Vec<usize>,
    records: Vec<EntityBinRecord>,
}

pub async fn entity_bins(
    Query(query): Query<EntityBinsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<EntityBinsResponse>, ApiError> {
    let settings = state.settings.snapshot();
    let metrics = match query.metrics.as_deref() {
        Some(spec) => parse_metric_aggregations(spec)?,
        None => settings.metrics.clone(),
    };
    let (days, bins) = bins_for_request(query.days, query.end.as_deref(), &settings);
    let (start, end) = request_window(&bins);

    let records = {
        let store = state.readings.read().unwrap();
        let silos = parse_silos(query.silos.as_deref(), &store)?;
        let readings = store.query_window(&silos, start, end);
        aggregate_entities(&readings, &bins, &metrics)
    };

    Ok(Json(EntityBinsResponse {
        selected_days: days,
        metrics,
        day_separators: day_separator_positions(&bins, days),
        records,
    }))
}

#[derive(Deserialize)]
pub struct CompareQuery {
    silos: Option<String>,
    metric: Option<String>,
    agg: Option<String>,
    days: Option<f64>,
    end: Option<String>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    metric: String,
    aggregation: AggregationType,
    selected_days: u32,
    series: Vec<BinSeries>,
}

pub async fn compare(
    Query(query): Query<CompareQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<CompareResponse>, ApiError> {
    let settings = state.settings.snapshot();
    let metric = query.metric.unwrap_or_else(|| FALLBACK_METRIC.to_owned());
    let aggregation = aggregation_for(query.agg.as_deref(), &metric, &settings)?;
    let (days, bins) = bins_for_request(query.days, query.end.as_deref(), &settings);
    let (start, end) = request_window(&bins);

    let records = {
        let store = state.readings.read().unwrap();
        let silos = parse_silos(query.silos.as_deref(), &store)?;
        let readings = store.query_window(&silos, start, end);
        let metrics = MetricAggregations::from([(metric.clone(), aggregation)]);
        aggregate_entities(&readings, &bins, &metrics)
    };

    Ok(Json(CompareResponse {
        series: pivot_by_bin(&bins, &records, &metric),
        metric,
        aggregation,
        selected_days: days,
    }))
}

#[derive(Deserialize)]
pub struct ValidateQuery {
    days: Option<f64>,
    end: Option<String>,
}

pub async fn validate(
    Query(query): Query<ValidateQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<BinParamsReport> {
    let days = query
        .days
        .unwrap_or_else(|| f64::from(state.settings.snapshot().selected_days));
    Json(validate_bin_params(days, query.end.as_deref()))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<ChartSettings> {
    Json(state.settings.snapshot())
}

#[derive(Deserialize)]
pub struct SettingsUpdate {
    selected_days: Option<f64>,
    #[serde(default)]
    metrics: BTreeMap<String, String>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(data): Json<SettingsUpdate>,
) -> Result<Json<ChartSettings>, ApiError> {
    // Reject the whole update before touching the store.
    let metrics = data
        .metrics
        .into_iter()
        .map(|(name, agg)| -> Result<_, ChartError> { Ok((name, agg.parse::<AggregationType>()?)) })
        .collect::<Result<MetricAggregations, ChartError>>()?;

    let updated = state.settings.update(|settings| {
        if let Some(days) = data.selected_days {
            settings.selected_days = clamp_selected_days(days);
        }
        settings.metrics.extend(metrics);
    });
    Ok(Json(updated))
}
