use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use knorten_sdk::objects::EventType;
use knorten_sdk::objects::admin::{
    ListQuery, RegisterEventRequest, RegisterEventResponse, ResetResponse, clamp_limit,
};
use uuid::Uuid;

use crate::state::AppState;

use super::{ApiError, event_with_logs_to_response, log_to_response};

/// `GET /owners/{owner}/events`: the owner's most recent events, each with
/// its most recent logs.
pub async fn list_owner_events(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state
        .store()
        .logs_for_owner(&owner, clamp_limit(query.limit))
        .await?;
    let response: Vec<_> = events.iter().map(event_with_logs_to_response).collect();
    Ok(Json(response))
}

/// `GET /events/{event_id}/logs`: the event's most recent logs, newest first.
pub async fn list_event_logs(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store();
    if store.get(event_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    let logs = store
        .logs_for_event(event_id, clamp_limit(query.limit))
        .await?;
    let response: Vec<_> = logs.iter().map(log_to_response).collect();
    Ok(Json(response))
}

/// `POST /events`: register an event.
pub async fn register_event(
    State(state): State<AppState>,
    Json(request): Json<RegisterEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deadline = match request.deadline_secs {
        Some(secs) => time::Duration::seconds(secs),
        None => match request.event_type.parse::<EventType>() {
            Ok(event_type) => event_type.default_deadline(),
            Err(_) => {
                return Err(ApiError::BadRequest(format!(
                    "deadline_secs is required for event type {}",
                    request.event_type
                )));
            }
        },
    };

    let id = state
        .dispatcher
        .register_event(&request.event_type, &request.owner, deadline, &request.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(RegisterEventResponse { id })))
}

/// `POST /events/reset`: return `processing` events whose deadline has run
/// out to `pending`. Events that may still have a live worker are skipped.
pub async fn reset_processing(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let reset = state.dispatcher.reset_stale_processing().await?;
    Ok(Json(ResetResponse { reset }))
}

/// `POST /dispatcher/trigger`: run a dispatch cycle without waiting for the
/// next tick.
pub async fn trigger_dispatch(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if !state.dispatcher.trigger("operator") {
        return Err(ApiError::DispatcherStopped);
    }
    Ok(StatusCode::ACCEPTED)
}
