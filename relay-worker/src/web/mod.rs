//! Web server module for the submission intake.
//!
//! This module provides a thin web server that:
//! - Accepts outbound email submissions and validates them
//! - Records them in the durable store and enqueues them
//! - Returns the assigned id immediately
//!
//! Delivery happens asynchronously in the sender.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, message_status, not_found, send, ApiResponse, AppState, HealthResponse, SubmitRequest,
};

/// Build the intake router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/send", post(send))
        .route("/messages/:id", get(message_status))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
