//! Token-cost analytics routes.
//!
//! Endpoints:
//! - `POST /analytics/store` appends a usage row reported by a client
//! - `GET  /analytics/summary` returns totals, averages, and a per-model breakdown
//! - `POST /analytics/reset` deletes every analytics row
//! - `GET  /analytics/download` streams the raw table as a CSV attachment

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use dealerdesk_core::domain::analytics::{
    AnalyticsAggregate, AnalyticsRecord, CostBreakdown, ModelPricing, TokenUsage,
};
use dealerdesk_db::repositories::AnalyticsRepository;

use crate::chat::{invalid_body, ApiError};

#[derive(Clone)]
pub struct AnalyticsState {
    analytics: Arc<dyn AnalyticsRepository>,
    pricing: ModelPricing,
    default_model: String,
}

impl AnalyticsState {
    pub fn new(
        analytics: Arc<dyn AnalyticsRepository>,
        pricing: ModelPricing,
        default_model: String,
    ) -> Self {
        Self { analytics, pricing, default_model }
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    #[serde(default)]
    pub token_usage: TokenUsage,
    /// Client-reported costs; recomputed from the configured pricing when
    /// omitted.
    #[serde(default)]
    pub cost: Option<CostBreakdown>,
    /// Defaults to the configured completion model when omitted.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub message: String,
    pub record: AnalyticsRecord,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub removed: u64,
}

type ErrorResponse = (StatusCode, Json<ApiError>);

fn storage_error(error: impl std::fmt::Display) -> ErrorResponse {
    error!(event_name = "analytics_request_failed", error = %error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: format!("storage failure: {error}") }),
    )
}

pub fn router(state: AnalyticsState) -> Router {
    Router::new()
        .route("/analytics/store", post(store))
        .route("/analytics/summary", get(summary))
        .route("/analytics/reset", post(reset))
        .route("/analytics/download", get(download))
        .with_state(state)
}

pub async fn store(
    State(state): State<AnalyticsState>,
    payload: Result<Json<StoreRequest>, JsonRejection>,
) -> Result<Json<StoreResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(invalid_body)?;
    let mut usage = request.token_usage;
    if usage.total_tokens <= 0 {
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
    }

    let model = request.model.unwrap_or_else(|| state.default_model.clone());
    let cost = request.cost.unwrap_or_else(|| state.pricing.cost_for(&usage));
    let record = AnalyticsRecord::from_usage(model, usage, cost);
    state.analytics.record(&record).await.map_err(storage_error)?;

    Ok(Json(StoreResponse { message: "analytics data stored".to_string(), record }))
}

pub async fn summary(
    State(state): State<AnalyticsState>,
) -> Result<Json<AnalyticsAggregate>, ErrorResponse> {
    let records = state.analytics.list_all().await.map_err(storage_error)?;
    Ok(Json(AnalyticsAggregate::from_records(&records)))
}

pub async fn reset(
    State(state): State<AnalyticsState>,
) -> Result<Json<ResetResponse>, ErrorResponse> {
    let removed = state.analytics.reset().await.map_err(storage_error)?;
    info!(event_name = "analytics_reset", removed);
    Ok(Json(ResetResponse { removed }))
}

pub async fn download(
    State(state): State<AnalyticsState>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let records = state.analytics.list_all().await.map_err(storage_error)?;

    let mut csv = String::from(
        "Date,Model,Prompt Tokens,Completion Tokens,Total Tokens,Prompt Cost,Completion Cost,Total Cost\n",
    );
    for record in &records {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            record.date.to_rfc3339(),
            csv_field(&record.model),
            record.prompt_tokens,
            record.completion_tokens,
            record.total_tokens,
            record.prompt_cost,
            record.completion_cost,
            record.total_cost,
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"analytics_data.csv\""),
        ],
        csv,
    ))
}

/// Model names come from configuration and request bodies; quote them when
/// they would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains(['"', ',', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
