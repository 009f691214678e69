//! Operator API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{EventClass, EventStatus, LogType};

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A single event, without its logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub owner: String,
    pub status: EventStatus,
    pub deadline_secs: i64,
    pub retry_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One row of an event's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub log_type: LogType,
    pub message: String,
    pub created_at: i64,
}

/// An event together with its most recent log rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWithLogsResponse {
    #[serde(flatten)]
    pub event: EventResponse,
    pub logs: Vec<EventLogResponse>,
}

/// Returned when an event has been registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEventResponse {
    pub id: Uuid,
}

/// Current maintenance state after a pause or resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceResponse {
    /// Whether the request changed anything.
    pub changed: bool,
    /// Paused classes, sorted.
    pub paused_classes: Vec<EventClass>,
}

/// Returned after `processing` events have been reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub reset: u64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Register a new event.
///
/// `deadline_secs` falls back to the type's default deadline when the type
/// is known, and is required otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEventRequest {
    pub event_type: String,
    pub owner: String,
    #[serde(default)]
    pub deadline_secs: Option<i64>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;

/// Query parameters for log and event listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Clamp a listing limit to a safe range.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIMIT)
}
