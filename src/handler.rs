use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::analyzer::{AnalysisEntry, Analyzer};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::storage::suggestions::now_ms;

/// Shared state for every route.
pub struct AppState {
    pub analyzer: Analyzer,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub results: Vec<AnalysisEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetConfigResponse {
    pub message: String,
    pub model: String,
    pub api_key_set: bool,
}

#[derive(Debug, Serialize)]
pub struct CachedResult {
    pub command: String,
    pub suggestions: String,
}

#[derive(Debug, Serialize)]
pub struct CachedResultsResponse {
    pub cached_results: Vec<CachedResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_ok: bool,
    pub cached_entries: i64,
    pub provider: &'static str,
    pub model: String,
}

/// GET /analyze-history - Suggestions for history commands not yet cached.
pub async fn analyze_history(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<AnalyzeResponse>> {
    let results = state.analyzer.analyze().await?;
    Ok(Json(AnalyzeResponse { results }))
}

/// POST /set-config - Replace the API key and/or model at runtime.
pub async fn set_config(
    State(state): State<Arc<AppState>>,
    LoggedJson(req): LoggedJson<SetConfigRequest>,
) -> AppResult<Json<SetConfigResponse>> {
    let api_key = non_empty("api_key", req.api_key)?;
    let model = non_empty("model", req.model)?;
    let key_changed = api_key.is_some();

    let current = state.analyzer.settings().update(api_key, model);
    tracing::info!(model = %current.model, key_changed, "provider configuration updated");

    Ok(Json(SetConfigResponse {
        message: "Configuration updated successfully".to_string(),
        model: current.model.clone(),
        api_key_set: current.has_api_key(),
    }))
}

fn non_empty(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(AppError::ConfigInvalid(format!(
            "{field} must not be empty"
        ))),
        other => Ok(other),
    }
}

/// GET /get-cached-results - Every unexpired cached suggestion.
pub async fn get_cached_results(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<CachedResultsResponse>> {
    let Some(store) = state.analyzer.store() else {
        return Ok(Json(CachedResultsResponse {
            cached_results: Vec::new(),
        }));
    };

    let cached_results = store
        .list_all()
        .await?
        .into_iter()
        .map(|row| CachedResult {
            command: row.command,
            suggestions: row.suggestion,
        })
        .collect();
    Ok(Json(CachedResultsResponse { cached_results }))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (cache_ok, cached_entries) = match state.analyzer.store() {
        Some(store) => match store.count_at(now_ms()).await {
            Ok(n) => (true, n),
            Err(e) => {
                tracing::warn!(error = %e, "cache health check failed");
                (false, 0)
            }
        },
        None => (false, 0),
    };

    Json(HealthResponse {
        status: if cache_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        cache_ok,
        cached_entries,
        provider: state.analyzer.provider_name(),
        model: state.analyzer.settings().snapshot().model.clone(),
    })
}

/// Assemble all routes with CORS and the request body limit applied.
pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    // The editor extension calls from a webview origin on localhost
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/analyze-history", get(analyze_history))
        .route("/set-config", post(set_config))
        .route("/get-cached-results", get(get_cached_results))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .with_state(state)
}
