//! API route definitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::detect::{Outcome, Severity};
use crate::gateway::TimeRange;
use crate::rules::RuleSpec;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/summary", get(summary))
        // Anomalies
        .route("/anomalies", get(list_anomalies))
        .route("/anomalies/detect", post(detect_anomalies))
        .route("/anomalies/{id}", get(get_anomaly))
        .route("/anomalies/{id}/acknowledge", post(acknowledge_anomaly))
        .route("/anomalies/{id}/resolve", post(resolve_anomaly))
        // Early warnings
        .route("/warnings", get(list_warnings))
        .route("/warnings/generate", post(generate_warnings))
        .route("/warnings/{id}/acknowledge", post(acknowledge_warning))
        .route("/warnings/{id}/resolve", post(resolve_warning))
        .route("/warnings/{id}/dismiss", post(dismiss_warning))
        // Rules
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{id}", get(get_rule))
        .route("/rules/{id}/performance", get(rule_performance))
        .route("/rules/{id}/enabled", post(set_rule_enabled))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

fn list_meta(total: usize) -> Value {
    json!({
        "total": total,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": meta()
    }))
}

async fn summary(State(state): State<AppState>) -> Json<Value> {
    let summary = state.engine.summary().await;
    Json(json!({ "data": summary, "meta": meta() }))
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct AnomalyFilter {
    metric: Option<String>,
    min_severity: Option<Severity>,
}

async fn list_anomalies(State(state): State<AppState>, Query(filter): Query<AnomalyFilter>) -> Json<Value> {
    let anomalies: Vec<_> = state
        .engine
        .active_anomalies()
        .await
        .into_iter()
        .filter(|a| filter.metric.as_deref().map_or(true, |m| a.metric == m))
        .filter(|a| filter.min_severity.map_or(true, |s| a.severity >= s))
        .collect();
    let total = anomalies.len();
    Json(json!({ "data": anomalies, "meta": list_meta(total) }))
}

/// Resolves an optional `hours` override into a range ending now.
fn lookback(hours: Option<i64>) -> Result<Option<TimeRange>, ApiError> {
    let Some(h) = hours else {
        return Ok(None);
    };
    if h <= 0 {
        return Err(ApiError::BadRequest("hours must be positive".to_string()));
    }
    TimeRange::last_hours(h)
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("hours {} is out of range", h)))
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    metric: String,
    /// Lookback override; the configured lookback when absent.
    hours: Option<i64>,
}

async fn detect_anomalies(
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.metric.trim().is_empty() {
        return Err(ApiError::BadRequest("metric must not be empty".to_string()));
    }
    let range = lookback(req.hours)?;

    let found = state.engine.detect_anomalies(req.metric.trim(), range).await?;
    let total = found.len();
    Ok(Json(json!({ "data": found, "meta": list_meta(total) })))
}

async fn get_anomaly(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let anomaly = state
        .engine
        .get_anomaly(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("anomaly '{}' not found", id)))?;
    Ok(Json(json!({ "data": anomaly, "meta": meta() })))
}

#[derive(Debug, Deserialize)]
struct AcknowledgeRequest {
    user_id: String,
}

async fn acknowledge_anomaly(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.engine.acknowledge_anomaly(&id, &req.user_id).await {
        return Err(anomaly_transition_error(&state, &id, "acknowledged").await);
    }
    get_anomaly(State(state), Path(id)).await
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    resolution: String,
    #[serde(default = "default_outcome")]
    outcome: Outcome,
}

fn default_outcome() -> Outcome {
    Outcome::Resolved
}

async fn resolve_anomaly(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.engine.resolve_anomaly(&id, &req.resolution, req.outcome).await {
        return Err(anomaly_transition_error(&state, &id, "resolved").await);
    }
    get_anomaly(State(state), Path(id)).await
}

async fn anomaly_transition_error(state: &AppState, id: &str, verb: &str) -> ApiError {
    match state.engine.get_anomaly(id).await {
        None => ApiError::NotFound(format!("anomaly '{}' not found", id)),
        Some(a) => ApiError::Conflict(format!("anomaly '{}' is {} and cannot be {}", id, a.status, verb)),
    }
}

// ---------------------------------------------------------------------------
// Early warnings
// ---------------------------------------------------------------------------

async fn list_warnings(State(state): State<AppState>) -> Json<Value> {
    let warnings = state.engine.active_warnings().await;
    let total = warnings.len();
    Json(json!({ "data": warnings, "meta": list_meta(total) }))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateQuery {
    hours: Option<i64>,
}

async fn generate_warnings(
    State(state): State<AppState>,
    Query(q): Query<GenerateQuery>,
) -> Result<Json<Value>, ApiError> {
    let range = lookback(q.hours)?;
    let (warnings, report) = state.engine.warning_pass(range).await;
    Ok(Json(json!({
        "data": warnings,
        "meta": {
            "total": warnings.len(),
            "evaluated": report.evaluated,
            "failed": report.failed,
            "stored": report.stored,
        }
    })))
}

async fn acknowledge_warning(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> Result<Json<Value>, ApiError> {
    let ok = state.engine.acknowledge_warning(&id, &req.user_id).await;
    warning_transition(&state, &id, ok, "acknowledged").await
}

async fn resolve_warning(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let ok = state.engine.resolve_warning(&id).await;
    warning_transition(&state, &id, ok, "resolved").await
}

async fn dismiss_warning(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let ok = state.engine.dismiss_warning(&id).await;
    warning_transition(&state, &id, ok, "dismissed").await
}

async fn warning_transition(state: &AppState, id: &str, ok: bool, verb: &str) -> Result<Json<Value>, ApiError> {
    match (state.engine.get_warning(id).await, ok) {
        (None, _) => Err(ApiError::NotFound(format!("warning '{}' not found", id))),
        (Some(w), true) => Ok(Json(json!({ "data": w, "meta": meta() }))),
        (Some(_), false) => Err(ApiError::Conflict(format!("warning '{}' cannot be {}", id, verb))),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    let rules = state.engine.list_rules().await;
    let total = rules.len();
    Json(json!({ "data": rules, "meta": list_meta(total) }))
}

async fn create_rule(
    State(state): State<AppState>,
    Json(spec): Json<RuleSpec>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = state.engine.create_detection_rule(spec).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": { "id": id }, "meta": meta() }))))
}

async fn get_rule(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let rule = state
        .engine
        .get_rule(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("rule '{}' not found", id)))?;
    Ok(Json(json!({ "data": rule, "meta": meta() })))
}

async fn rule_performance(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let perf = state
        .engine
        .rule_performance(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("rule '{}' not found", id)))?;
    Ok(Json(json!({ "data": perf, "meta": meta() })))
}

#[derive(Debug, Deserialize)]
struct EnabledRequest {
    enabled: bool,
}

async fn set_rule_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EnabledRequest>,
) -> Result<Json<Value>, ApiError> {
    state.engine.set_rule_enabled(&id, req.enabled).await?;
    Ok(Json(json!({ "data": { "id": id, "enabled": req.enabled }, "meta": meta() })))
}
