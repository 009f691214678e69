use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use knorten_sdk::objects::EventClass;
use knorten_sdk::objects::admin::MaintenanceResponse;

use crate::state::AppState;

use super::ApiError;

/// `POST /maintenance/{class}/pause`: stop dispatching events of a class.
pub async fn pause_class(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let class = parse_class(&class)?;
    let changed = state.dispatcher.pause_class(class).await;
    Ok(Json(maintenance_response(&state, changed).await))
}

/// `POST /maintenance/{class}/resume`: resume dispatching events of a class.
pub async fn resume_class(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let class = parse_class(&class)?;
    let changed = state.dispatcher.resume_class(class).await;
    Ok(Json(maintenance_response(&state, changed).await))
}

fn parse_class(class: &str) -> Result<EventClass, ApiError> {
    class
        .parse()
        .map_err(|e: knorten_sdk::objects::UnknownEventClass| ApiError::BadRequest(e.to_string()))
}

async fn maintenance_response(state: &AppState, changed: bool) -> MaintenanceResponse {
    let mut paused_classes: Vec<EventClass> =
        state.dispatcher.paused_classes().await.into_iter().collect();
    paused_classes.sort();
    MaintenanceResponse {
        changed,
        paused_classes,
    }
}
