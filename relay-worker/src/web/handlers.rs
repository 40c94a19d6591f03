//! Intake endpoint handlers.
//!
//! `POST /send` validates a submission, records it in the durable store and
//! places it on the pending list. Delivery happens later in the sender; the
//! submitter polls `GET /messages/:id` for the outcome.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::mail::validate_submission;
use crate::queue::{Pipeline, QueueDepths};
use crate::store::{NewRecord, RecordStore};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    pub records: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline, records: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            records,
        }
    }
}

/// Response envelope shared by the intake endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub result: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Json<Self> {
        Json(Self { status: "ok", result })
    }

    pub fn nok(result: T) -> Json<Self> {
        Json(Self { status: "nok", result })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queues: Option<QueueDepths>,
}

/// Health check endpoint with queue depths.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.depths().await {
        Ok(depths) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                queues: Some(depths),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "health_queue_unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    queues: None,
                }),
            )
        }
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Submission payload.
///
/// Missing fields deserialize as empty and are rejected by validation.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Submission endpoint.
///
/// This endpoint:
/// 1. Validates the submission, rejecting it before any mutation
/// 2. Inserts the durable record, which assigns the id
/// 3. Enqueues the message on the pending list
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "submission_unparsable");
            return (StatusCode::FORBIDDEN, ApiResponse::nok(rejection.body_text()));
        }
    };

    if let Err(e) = validate_submission(
        &request.to,
        &request.subject,
        &request.message,
        state.config.max_field_length,
    ) {
        warn!(error = %e, "submission_rejected");
        return (StatusCode::FORBIDDEN, ApiResponse::nok(e.to_string()));
    }

    let record = NewRecord::new(request.to, request.subject, request.message);
    let id = match state.records.insert(&record).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "submission_record_failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::nok(e.to_string()));
        }
    };

    let message = record.into_message(id.clone());
    let pending = &state.pipeline.names().pending;
    if let Err(e) = state.pipeline.enqueue(pending, &message).await {
        error!(message_id = %id, error = %e, "submission_enqueue_failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::nok(e.to_string()));
    }

    info!(message_id = %id, to = %message.to, "submission_accepted");

    (StatusCode::OK, ApiResponse::ok(id))
}

// =============================================================================
// Status Lookup
// =============================================================================

/// Durable record lookup for submitters polling delivery status.
pub async fn message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.records.get(&id).await {
        Ok(Some(record)) => (StatusCode::OK, ApiResponse::ok(record)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, ApiResponse::nok("Not Found")).into_response(),
        Err(e) => {
            error!(message_id = %id, error = %e, "status_lookup_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::nok(e.to_string())).into_response()
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, ApiResponse::nok("Not Found"))
}
