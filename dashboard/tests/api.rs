use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use silo_dashboard::dashboard_config::DashboardConfig;
use silo_dashboard::routes::router;
use silo_dashboard::state::AppState;

const END: &str = "2024-08-09T14:00:00Z";

fn app() -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(DashboardConfig::default()));
    (Arc::clone(&state), router(state))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send_text(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, text) = send_text(app, request).await;
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

async fn seed(app: &Router) {
    let batch = json!([
        {"silo_id": 1, "timestamp": "2024-08-08T14:00:00Z", "metrics": {"temperature": 10.0, "level": 70.0}},
        {"silo_id": 1, "timestamp": "2024-08-08T14:00:00Z", "metrics": {"temperature": 20.0, "level": 65.0}},
        {"silo_id": 1, "timestamp": "2024-08-08T15:00:00Z", "metrics": {"temperature": 5.0}},
        {"silo_id": 2, "timestamp": 1723125600000i64, "metrics": {"temperature": 30.0}},
        {"silo_id": 2, "timestamp": "sometime tuesday", "metrics": {"temperature": 99.0}}
    ]);
    let (status, body) = send(app, post_json("/readings", batch)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"accepted": 4, "rejected": 1}));
}

#[tokio::test]
async fn malformed_readings_do_not_sink_the_batch() {
    let (_, app) = app();
    let batch = json!([
        {"silo_id": 3, "timestamp": "2024-08-08T14:00:00Z", "metrics": {"temperature": 12.0, "level": null}},
        {"silo_id": 3, "timestamp": null, "metrics": {"temperature": 99.0}},
        {"silo_id": 3, "timestamp": 1723125600000.5, "metrics": {"temperature": 99.0}},
        {"silo_id": 3, "timestamp": "2024-08-08T14:30:00Z", "metrics": {"temperature": 14.0}}
    ]);
    let (status, body) = send(&app, post_json("/readings", batch)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"accepted": 2, "rejected": 2}));

    let uri = format!("/api/silos/3/bins?days=1&end={END}&metric=temperature&agg=avg");
    let (_, body) = send(&app, get(&uri)).await;
    assert_eq!(body["points"][0]["value"], 13.0);
    assert_eq!(body["points"][0]["count"], 2);
}

#[tokio::test]
async fn end_time_at_the_edge_of_time_is_replaced() {
    let (_, app) = app();
    let (status, body) = send(&app, get("/api/silos/1/bins?days=24&end=-8334601225200000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 24);
}

#[tokio::test]
async fn silo_bins_average_per_bin() {
    let (_, app) = app();
    seed(&app).await;

    let uri = format!("/api/silos/1/bins?days=1&end={END}&metric=temperature&agg=avg");
    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 24);
    assert_eq!(points[0]["value"], 15.0);
    assert_eq!(points[0]["count"], 2);
    assert_eq!(points[0]["label"], "14:00");
    assert_eq!(points[1]["value"], 5.0);
    assert_eq!(points[1]["count"], 1);
    assert!(points[2..].iter().all(|p| p["count"] == 0 && p["value"] == 0.0));
    assert_eq!(body["day_separators"], json!([10]));
    assert_eq!(body["aggregation"], "avg");
}

#[tokio::test]
async fn silo_without_readings_gets_zero_points() {
    let (_, app) = app();
    let (status, body) = send(&app, get(&format!("/api/silos/42/bins?days=3&end={END}"))).await;
    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 24);
    assert!(points.iter().all(|p| p["count"] == 0 && p["value"] == 0.0));
}

#[tokio::test]
async fn out_of_range_days_are_clamped() {
    let (_, app) = app();
    seed(&app).await;
    let (status, body) = send(&app, get(&format!("/api/silos/1/bins?days=100&end={END}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected_days"], 24);
    assert_eq!(body["day_separators"], json!([]));
    assert_eq!(body["points"][23]["label"], "08 Aug");
}

#[tokio::test]
async fn unknown_aggregation_is_rejected() {
    let (_, app) = app();
    let (status, body) = send(&app, get("/api/silos/1/bins?agg=median")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("median"));

    let (status, _) = send(&app, get("/api/bins?metrics=temperature:mode")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entity_bins_merge_metrics_per_silo() {
    let (_, app) = app();
    seed(&app).await;

    let uri = format!("/api/bins?silos=2,1&days=1&end={END}&metrics=temperature:avg,level:latest");
    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 48);
    assert!(records[..24].iter().all(|r| r["entity_id"] == 1));
    assert!(records[24..].iter().all(|r| r["entity_id"] == 2));

    let first = &records[0]["metrics"];
    assert_eq!(first["temperature"], json!({"value": 15.0, "count": 2}));
    assert_eq!(first["level"], json!({"value": 65.0, "count": 2}));
    assert_eq!(records[24]["metrics"]["temperature"]["value"], 30.0);
}

#[tokio::test]
async fn invalid_silo_list_is_rejected() {
    let (_, app) = app();
    let (status, _) = send(&app, get("/api/bins?silos=1,two")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn compare_maps_silos_per_bin() {
    let (_, app) = app();
    seed(&app).await;

    let uri = format!("/api/compare?metric=temperature&agg=max&days=1&end={END}");
    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let series = body["series"].as_array().unwrap();
    assert_eq!(series.len(), 24);
    assert_eq!(series[0]["values"], json!({"1": 20.0, "2": 30.0}));
    assert_eq!(series[1]["values"], json!({"1": 5.0}));
    assert_eq!(series[2]["values"], json!({}));
}

#[tokio::test]
async fn validate_reports_without_failing() {
    let (_, app) = app();
    let (status, body) = send(&app, get(&format!("/api/validate?days=40&end={END}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["clamped_days"], 24);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get(&format!("/api/validate?days=6&end={END}"))).await;
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn settings_update_and_notify() {
    let (state, app) = app();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    state
        .settings
        .subscribe(move |s| sink.lock().unwrap().push(s.selected_days));

    let (status, body) = send(
        &app,
        post_json("/api/settings", json!({"selected_days": 6.7, "metrics": {"humidity": "max"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected_days"], 6);
    assert_eq!(body["metrics"]["humidity"], "max");
    assert_eq!(*seen.lock().unwrap(), vec![6]);

    let (status, _) = send(
        &app,
        post_json("/api/settings", json!({"selected_days": 2, "metrics": {"level": "median"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, get("/api/settings")).await;
    assert_eq!(body["selected_days"], 6);
    assert_eq!(*seen.lock().unwrap(), vec![6]);
}

#[tokio::test]
async fn default_days_follow_settings() {
    let (state, app) = app();
    state.settings.update(|s| s.selected_days = 12);
    let (_, body) = send(&app, get(&format!("/api/silos/1/bins?end={END}"))).await;
    assert_eq!(body["selected_days"], 12);
    assert_eq!(body["metric"], "temperature");
}

#[tokio::test]
async fn html_pages_render() {
    let (_, app) = app();
    seed(&app).await;

    let (status, html) = send_text(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("silo 1"));
    assert!(html.contains("silo 2"));

    let (status, html) = send_text(&app, get(&format!("/silo/1?days=3&end={END}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<svg"));
    assert!(html.contains("temperature (avg)"));

    let (status, css) = send_text(&app, get("/styles.css")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(css.contains("--background"));
}

#[tokio::test]
async fn chart_fragments_keep_the_requested_end_time() {
    let (_, app) = app();
    seed(&app).await;

    let (_, html) = send_text(&app, get(&format!("/silo/1?days=3&end={END}"))).await;
    // One per day choice plus the refresh trigger.
    assert_eq!(html.matches("end=1723212000000").count(), 6);

    let (_, html) = send_text(&app, get("/fragments/silo/1/charts?days=3")).await;
    assert!(!html.contains("end="));
}
