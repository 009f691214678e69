//! Durable storage of events and their logs.
//!
//! The [`EventStore`] trait is the only shared mutable resource of the
//! dispatcher: every status transition goes through it. Two backends are
//! provided:
//!
//! - [`PgEventStore`]: Postgres, used in production.
//! - [`MemoryEventStore`]: in-process, used by tests and by embedders that
//!   do not need durability.
//!
//! Both delegate candidate selection to [`select_dispatchable`] so that the
//! exclusion and priority rules are defined in exactly one place.

pub mod memory;
pub mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

use crate::entities::{Event, EventLog, EventStatus, EventWithLogs, LogType, NewEvent};
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors returned by an [`EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be interpreted
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The backend cannot serve requests right now
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Record a new event in status `new` and return its id.
    async fn insert(&self, event: NewEvent) -> Result<Uuid, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Events eligible for pickup at `now`: `new` and overdue `pending`
    /// events the filter does not pause, with at most one event per
    /// (owner, resource) and none whose (owner, resource) is already
    /// processing. See [`select_dispatchable`].
    async fn list_dispatchable(
        &self,
        filter: &DispatchFilter,
        now: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError>;

    /// Atomically move a `new`/`pending` event to `processing` if no other
    /// event with the same (owner, resource) is processing.
    ///
    /// Returns `false` when the claim lost, leaving the event untouched.
    async fn claim(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Move an event to `status` if the transition is allowed from its
    /// current state. Terminal events are never changed.
    async fn set_status(&self, id: Uuid, status: EventStatus) -> Result<bool, StoreError>;

    /// Move a `processing` event to `pending`, incrementing its retry count
    /// and extending its deadline by `extension`.
    ///
    /// Returns `false` if the event was not processing.
    async fn increment_retry_and_extend_deadline(
        &self,
        id: Uuid,
        extension: time::Duration,
    ) -> Result<bool, StoreError>;

    async fn append_log(
        &self,
        event_id: Uuid,
        log_type: LogType,
        message: &str,
    ) -> Result<(), StoreError>;

    /// The most recent `limit` logs of an event, newest first.
    async fn logs_for_event(&self, id: Uuid, limit: i64) -> Result<Vec<EventLog>, StoreError>;

    /// The owner's `limit` most recently updated events, each with its
    /// most recent `limit` logs.
    async fn logs_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<EventWithLogs>, StoreError>;

    /// The owner's `limit` most recently updated events.
    async fn events_for_owner(&self, owner: &str, limit: i64) -> Result<Vec<Event>, StoreError>;

    /// Return every `processing` event to `pending`. Used after a crash or
    /// a leadership change, when no worker is left to finish them.
    async fn reset_processing(&self) -> Result<u64, StoreError>;

    /// Return `processing` events whose deadline ran out before `now` to
    /// `pending`. A live worker gives up on its event at the deadline, so
    /// these have been abandoned.
    async fn reset_stale_processing(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

/// Which event types a dispatch pass may consider.
#[derive(Debug, Clone, Default)]
pub struct DispatchFilter {
    /// Types that must not be dispatched right now.
    pub paused_types: HashSet<String>,
    /// Types a handler exists for; `None` treats every type as known.
    pub known_types: Option<HashSet<String>>,
}

impl DispatchFilter {
    pub fn is_paused(&self, tag: &str) -> bool {
        self.paused_types.contains(tag)
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.known_types
            .as_ref()
            .is_none_or(|known| known.contains(tag))
    }
}

/// Longest deadline accepted for a new event.
pub const MAX_DEADLINE: time::Duration = time::Duration::days(1);

/// Reject events no backend should store.
pub fn validate_new_event(event: &NewEvent) -> Result<(), StoreError> {
    if event.event_type.trim().is_empty() {
        return Err(StoreError::InvalidRecord("event type is empty".to_string()));
    }
    if event.owner.trim().is_empty() {
        return Err(StoreError::InvalidRecord("owner is empty".to_string()));
    }
    if !event.deadline.is_positive() || event.deadline > MAX_DEADLINE {
        return Err(StoreError::InvalidRecord(format!(
            "deadline must be positive and at most {MAX_DEADLINE}, got {}",
            event.deadline
        )));
    }
    Ok(())
}

/// Pick the events to dispatch from the current store contents.
///
/// `processing` holds the events currently in flight; `upcoming` holds all
/// `new` and `pending` events, due or not. Rules:
///
/// 1. Overdue `pending` events come first (they already failed once), then
///    `new` events; each group oldest first.
/// 2. Events of a paused type are skipped.
/// 3. Events of an unknown type are returned so the caller can report them,
///    but never reserve their (owner, resource) or hold back a sibling.
/// 4. An event is skipped if its (owner, resource) is processing or was
///    already selected earlier in this pass.
/// 5. A `new` event is skipped if any `pending` sibling exists, due or not,
///    so retries keep their place in line.
pub fn select_dispatchable(
    processing: &[Event],
    upcoming: &[Event],
    filter: &DispatchFilter,
    now: OffsetDateTime,
) -> Vec<Event> {
    let mut taken: HashSet<(&str, &str)> = processing.iter().map(Event::exclusion_key).collect();
    let pending_keys: HashSet<(&str, &str)> = upcoming
        .iter()
        .filter(|e| e.status == EventStatus::Pending && filter.is_known(&e.event_type))
        .map(Event::exclusion_key)
        .collect();

    let overdue = upcoming
        .iter()
        .filter(|e| e.status == EventStatus::Pending && e.is_overdue(now))
        .sorted_by_key(|e| e.created_at);
    let fresh = upcoming
        .iter()
        .filter(|e| e.status == EventStatus::New)
        .sorted_by_key(|e| e.created_at);

    let mut selected = Vec::new();
    for event in overdue.chain(fresh) {
        if filter.is_paused(&event.event_type) {
            continue;
        }
        if !filter.is_known(&event.event_type) {
            selected.push(event.clone());
            continue;
        }
        let key = event.exclusion_key();
        if taken.contains(&key) {
            continue;
        }
        if event.status == EventStatus::New && pending_keys.contains(&key) {
            continue;
        }
        taken.insert(key);
        selected.push(event.clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    fn event(tag: &str, owner: &str, status: EventStatus, age_minutes: i64) -> Event {
        let at = NOW - time::Duration::minutes(age_minutes);
        Event {
            id: Uuid::now_v7(),
            event_type: tag.into(),
            owner: owner.to_string(),
            payload: serde_json::Value::Null,
            status,
            deadline: time::Duration::minutes(5),
            retry_count: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn tags(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[test]
    fn test_pending_sibling_wins_over_new() {
        let upcoming = vec![
            event("update:team", "team-a", EventStatus::Pending, 3),
            event("delete:team", "team-a", EventStatus::New, 2),
            event("create:team", "team-a", EventStatus::New, 1),
        ];
        let selected = select_dispatchable(&[], &upcoming, &DispatchFilter::default(), NOW);
        assert_eq!(tags(&selected), vec!["update:team"]);
    }

    #[test]
    fn test_processing_sibling_blocks_new_and_pending() {
        let processing = vec![event("update:jupyter", "team-a", EventStatus::Processing, 5)];
        let upcoming = vec![
            event("delete:jupyter", "team-a", EventStatus::New, 2),
            event("create:jupyter", "team-a", EventStatus::Pending, 10),
        ];
        let selected = select_dispatchable(&processing, &upcoming, &DispatchFilter::default(), NOW);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_independent_owners_run_in_parallel() {
        let processing = vec![event("update:jupyter", "team-a", EventStatus::Processing, 5)];
        let upcoming = vec![
            event("update:jupyter", "team-b", EventStatus::New, 2),
            event("create:airflow", "team-a", EventStatus::New, 1),
        ];
        let selected = select_dispatchable(&processing, &upcoming, &DispatchFilter::default(), NOW);
        assert_eq!(tags(&selected), vec!["update:jupyter", "create:airflow"]);
        assert_eq!(selected[0].owner, "team-b");
    }

    #[test]
    fn test_one_per_pair_per_pass() {
        let first = event("update:jupyter", "team-a", EventStatus::New, 2);
        let upcoming = vec![
            event("update:jupyter", "team-a", EventStatus::New, 1),
            first.clone(),
        ];
        let selected = select_dispatchable(&[], &upcoming, &DispatchFilter::default(), NOW);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, first.id);
    }

    #[test]
    fn test_pending_not_yet_due_is_held_back_but_blocks() {
        let mut waiting = event("update:team", "team-a", EventStatus::Pending, 1);
        waiting.retry_count = 1;
        let upcoming = vec![waiting, event("delete:team", "team-a", EventStatus::New, 0)];
        let selected = select_dispatchable(&[], &upcoming, &DispatchFilter::default(), NOW);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_overdue_pending_listed_before_new() {
        let mut retried = event("update:team", "team-b", EventStatus::Pending, 1);
        retried.retry_count = 0;
        let upcoming = vec![event("create:team", "team-a", EventStatus::New, 30), retried];
        let selected = select_dispatchable(&[], &upcoming, &DispatchFilter::default(), NOW);
        assert_eq!(tags(&selected), vec!["update:team", "create:team"]);
    }

    #[test]
    fn test_validate_new_event() {
        let valid = NewEvent {
            event_type: "create:team".into(),
            owner: "team-a".to_string(),
            payload: serde_json::Value::Null,
            deadline: time::Duration::minutes(5),
        };
        assert!(validate_new_event(&valid).is_ok());

        let no_owner = NewEvent {
            owner: " ".to_string(),
            ..valid.clone()
        };
        assert!(matches!(
            validate_new_event(&no_owner),
            Err(StoreError::InvalidRecord(_))
        ));

        for deadline in [
            time::Duration::seconds(-1),
            time::Duration::ZERO,
            MAX_DEADLINE + time::Duration::SECOND,
            time::Duration::seconds(1_000_000_000_000),
        ] {
            let event = NewEvent {
                deadline,
                ..valid.clone()
            };
            assert!(
                matches!(validate_new_event(&event), Err(StoreError::InvalidRecord(_))),
                "accepted deadline {deadline}"
            );
        }

        let longest = NewEvent {
            deadline: MAX_DEADLINE,
            ..valid
        };
        assert!(validate_new_event(&longest).is_ok());
    }

    #[test]
    fn test_paused_types_are_skipped() {
        let upcoming = vec![
            event("create:jupyter", "team-a", EventStatus::New, 5),
            event("create:airflow", "team-a", EventStatus::New, 4),
            event("rolloutAirflow:helm", "team-a", EventStatus::New, 3),
            event("rollbackAirflow:helm", "team-b", EventStatus::New, 2),
        ];
        let filter = DispatchFilter {
            paused_types: HashSet::from([
                "create:airflow".to_string(),
                "rolloutAirflow:helm".to_string(),
                "rollbackAirflow:helm".to_string(),
            ]),
            known_types: None,
        };
        let selected = select_dispatchable(&[], &upcoming, &filter, NOW);
        assert_eq!(tags(&selected), vec!["create:jupyter"]);
    }

    #[test]
    fn test_unknown_type_does_not_block_siblings() {
        let upcoming = vec![
            event("archive:team", "team-a", EventStatus::New, 3),
            event("create:team", "team-a", EventStatus::New, 2),
        ];
        let filter = DispatchFilter {
            paused_types: HashSet::new(),
            known_types: Some(HashSet::from(["create:team".to_string()])),
        };
        let selected = select_dispatchable(&[], &upcoming, &filter, NOW);
        assert_eq!(tags(&selected), vec!["archive:team", "create:team"]);
    }

    #[test]
    fn test_unknown_pending_does_not_hold_back_new() {
        let mut stuck = event("archive:team", "team-a", EventStatus::Pending, 10);
        stuck.retry_count = 1;
        let upcoming = vec![stuck, event("update:team", "team-a", EventStatus::New, 1)];
        let filter = DispatchFilter {
            paused_types: HashSet::new(),
            known_types: Some(HashSet::from(["update:team".to_string()])),
        };
        let selected = select_dispatchable(&[], &upcoming, &filter, NOW);
        assert_eq!(tags(&selected), vec!["archive:team", "update:team"]);
    }
}
