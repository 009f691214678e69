//! Operator API handlers.
//!
//! Meant to be bound to localhost or an internal network; there is no
//! authentication.
//!
//! # Endpoints
//!
//! - `GET  /owners/{owner}/events`        – owner's recent events with their logs
//! - `GET  /events/{event_id}/logs`       – logs of one event
//! - `POST /events`                       – register an event
//! - `POST /events/reset`                 – return stale `processing` events to `pending`
//! - `POST /dispatcher/trigger`           – run a dispatch cycle now
//! - `POST /maintenance/{class}/pause`    – stop dispatching a class
//! - `POST /maintenance/{class}/resume`   – resume dispatching a class

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use knorten_core::dispatcher::RegisterError;
use knorten_core::entities::{Event, EventLog, EventWithLogs};
use knorten_core::store::StoreError;
use knorten_sdk::objects::admin::{EventLogResponse, EventResponse, EventWithLogsResponse};
use serde::Serialize;

use crate::state::AppState;

mod events;
mod maintenance;

/// Build the operator API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/owners/{owner}/events", get(events::list_owner_events))
        .route("/events/{event_id}/logs", get(events::list_event_logs))
        .route("/events", post(events::register_event))
        .route("/events/reset", post(events::reset_processing))
        .route("/dispatcher/trigger", post(events::trigger_dispatch))
        .route("/maintenance/{class}/pause", post(maintenance::pause_class))
        .route("/maintenance/{class}/resume", post(maintenance::resume_class))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in operator API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Store(StoreError),
    BadRequest(String),
    NotFound,
    DispatcherStopped,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
        (
            status,
            Json(ErrorBody {
                error: message.into(),
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidRecord(message) => ApiError::BadRequest(message),
            other => ApiError::Store(other),
        }
    }
}

impl From<RegisterError> for ApiError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::Store(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Operator API store error");
                Self::body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::BadRequest(message) => Self::body(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => Self::body(StatusCode::NOT_FOUND, "resource not found"),
            ApiError::DispatcherStopped => {
                tracing::error!("Operator API: dispatcher stopped");
                Self::body(StatusCode::SERVICE_UNAVAILABLE, "dispatcher stopped")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn event_to_response(e: &Event) -> EventResponse {
    EventResponse {
        id: e.id,
        event_type: e.event_type.to_string(),
        owner: e.owner.clone(),
        status: e.status.into(),
        deadline_secs: e.deadline.whole_seconds(),
        retry_count: e.retry_count,
        created_at: e.created_at.unix_timestamp(),
        updated_at: e.updated_at.unix_timestamp(),
    }
}

pub(crate) fn log_to_response(l: &EventLog) -> EventLogResponse {
    EventLogResponse {
        id: l.id,
        event_id: l.event_id,
        log_type: l.log_type.into(),
        message: l.message.clone(),
        created_at: l.created_at.unix_timestamp(),
    }
}

pub(crate) fn event_with_logs_to_response(e: &EventWithLogs) -> EventWithLogsResponse {
    EventWithLogsResponse {
        event: event_to_response(&e.event),
        logs: e.logs.iter().map(log_to_response).collect(),
    }
}
