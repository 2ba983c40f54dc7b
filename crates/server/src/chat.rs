//! Conversation-facing JSON routes.
//!
//! Endpoints:
//! - `POST /chat` takes one customer message; tool calls come back pending
//! - `POST /tool-call-result` runs the pending tools and finishes the turn
//! - `POST /generate-summary` summarizes a transcript on demand
//! - `GET  /get-summary/{conversation_id}` fetches a stored summary
//! - `GET  /inventory` lists the full showroom
//! - `POST /car-review-videos` looks up YouTube reviews for one vehicle

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use dealerdesk_agent::{ChatTurn, ConversationEngine, ReviewVideoSearch, SummaryGenerator};
use dealerdesk_core::domain::inventory::{InventoryFilter, Vehicle};
use dealerdesk_core::domain::message::Message;
use dealerdesk_core::domain::summary::ConversationSummary;
use dealerdesk_core::errors::ChatApiError;
use dealerdesk_db::repositories::{InventoryRepository, SummaryRepository};

#[derive(Clone)]
pub struct ChatState {
    engine: Arc<ConversationEngine>,
    summarizer: Arc<SummaryGenerator>,
    summaries: Arc<dyn SummaryRepository>,
    videos: Arc<ReviewVideoSearch>,
    inventory: Arc<dyn InventoryRepository>,
}

impl ChatState {
    pub fn new(
        engine: Arc<ConversationEngine>,
        summarizer: Arc<SummaryGenerator>,
        summaries: Arc<dyn SummaryRepository>,
        videos: Arc<ReviewVideoSearch>,
        inventory: Arc<dyn InventoryRepository>,
    ) -> Self {
        Self { engine, summarizer, summaries, videos, inventory }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Transcript from prior turns; the backend is stateless, so the
    /// frontend resends it verbatim each time.
    #[serde(default)]
    pub conversation_history: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallResultRequest {
    pub conversation_history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat_response: String,
    pub conversation_history: Vec<Message>,
    pub tool_call_detected: bool,
    pub summary: Option<ConversationSummary>,
}

impl From<ChatTurn> for ChatResponse {
    fn from(turn: ChatTurn) -> Self {
        Self {
            chat_response: turn.reply,
            conversation_history: turn.transcript,
            tool_call_detected: turn.tool_call_detected,
            summary: turn.summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolCallResultResponse {
    pub final_response: String,
    pub final_conversation_history: Vec<Message>,
    pub summary: Option<ConversationSummary>,
}

impl From<ChatTurn> for ToolCallResultResponse {
    fn from(turn: ChatTurn) -> Self {
        Self {
            final_response: turn.reply,
            final_conversation_history: turn.transcript,
            summary: turn.summary,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateSummaryRequest {
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: ConversationSummary,
}

#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    #[serde(default)]
    pub car_make: String,
    #[serde(default)]
    pub car_model: String,
    #[serde(default)]
    pub year: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ErrorResponse = (StatusCode, Json<ApiError>);

fn api_error(error: ChatApiError) -> ErrorResponse {
    if error.is_client_error() {
        warn!(event_name = "request_rejected", error = %error);
    } else {
        error!(event_name = "request_failed", error = %error);
    }
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError { error: error.to_string() }))
}

/// Missing or malformed JSON bodies are the caller's fault; surface them as
/// 400 rather than axum's default 422.
pub(crate) fn invalid_body(rejection: JsonRejection) -> ErrorResponse {
    api_error(ChatApiError::Validation(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/tool-call-result", post(tool_call_result))
        .route("/generate-summary", post(generate_summary))
        .route("/get-summary/{conversation_id}", get(get_summary))
        .route("/inventory", get(list_inventory))
        .route("/car-review-videos", post(car_review_videos))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(invalid_body)?;
    let turn = state
        .engine
        .chat(request.conversation_history, &request.message)
        .await
        .map_err(api_error)?;
    Ok(Json(ChatResponse::from(turn)))
}

pub async fn tool_call_result(
    State(state): State<ChatState>,
    payload: Result<Json<ToolCallResultRequest>, JsonRejection>,
) -> Result<Json<ToolCallResultResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(invalid_body)?;
    let turn = state
        .engine
        .resume_with_tool_results(request.conversation_history)
        .await
        .map_err(api_error)?;
    Ok(Json(ToolCallResultResponse::from(turn)))
}

/// On-demand summarization, e.g. when the customer closes the widget before
/// the assistant said goodbye. Always returns a summary; failures come back
/// as the fallback shape rather than an error status.
pub async fn generate_summary(
    State(state): State<ChatState>,
    payload: Result<Json<GenerateSummaryRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(invalid_body)?;
    let summary = state
        .summarizer
        .summarize(&request.conversation_history, request.conversation_id.as_deref())
        .await;
    Ok(Json(SummaryResponse { summary }))
}

pub async fn get_summary(
    State(state): State<ChatState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<SummaryResponse>, ErrorResponse> {
    let found = state
        .summaries
        .find_by_conversation_id(&conversation_id)
        .await
        .map_err(|error| api_error(ChatApiError::Storage(error.to_string())))?;

    match found {
        Some(summary) => Ok(Json(SummaryResponse { summary })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("no summary found for conversation `{conversation_id}`"),
            }),
        )),
    }
}

pub async fn list_inventory(
    State(state): State<ChatState>,
) -> Result<Json<InventoryResponse>, ErrorResponse> {
    let vehicles = state
        .inventory
        .search(&InventoryFilter::default())
        .await
        .map_err(|error| api_error(ChatApiError::Storage(error.to_string())))?;
    Ok(Json(InventoryResponse { count: vehicles.len(), vehicles }))
}

pub async fn car_review_videos(
    State(state): State<ChatState>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<Json<dealerdesk_agent::VideoSearchResult>, ErrorResponse> {
    let Json(request) = payload.map_err(invalid_body)?;
    let make = request.car_make.trim();
    let model = request.car_model.trim();
    if make.is_empty() || model.is_empty() {
        return Err(api_error(ChatApiError::Validation(
            "car_make and car_model are required".to_string(),
        )));
    }

    let result = state.videos.search(make, model, request.year).await;
    Ok(Json(result))
}
