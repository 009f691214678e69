//! Per-event audit logging.
//!
//! An [`EventLogger`] is handed to every executor call. Besides appending a
//! row to the event's log, `error` and `fatal` also move the event's status:
//!
//! - `info`: append only.
//! - `error`: append, then return the event to `pending` with one more retry
//!   and a deadline extended by the grace period.
//! - `fatal`: append, then mark the event `failed`.
//!
//! Store failures are traced and swallowed; an executor can always log.

use crate::entities::{EventStatus, LogType};
use crate::store::EventStore;
use compact_str::CompactString;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Deadline extension applied by [`EventLogger::error`].
pub const DEFAULT_ERROR_GRACE: time::Duration = time::Duration::minutes(3);

#[derive(Clone)]
pub struct EventLogger {
    store: Arc<dyn EventStore>,
    event_id: Uuid,
    event_type: CompactString,
    grace: time::Duration,
}

impl EventLogger {
    pub fn new(
        store: Arc<dyn EventStore>,
        event_id: Uuid,
        event_type: impl Into<CompactString>,
        grace: time::Duration,
    ) -> Self {
        Self {
            store,
            event_id,
            event_type: event_type.into(),
            grace,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub async fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(event_id = %self.event_id, event_type = %self.event_type, "{message}");
        self.append(LogType::Info, &message).await;
    }

    /// Record a recoverable failure and schedule the event for retry.
    ///
    /// Only the first call while the event is `processing` changes its
    /// status; later calls just append.
    pub async fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(event_id = %self.event_id, event_type = %self.event_type, "{message}");
        self.append(LogType::Error, &message).await;

        if let Err(e) = self
            .store
            .increment_retry_and_extend_deadline(self.event_id, self.grace)
            .await
        {
            error!(
                event_id = %self.event_id,
                error = %e,
                "Failed to move event back to pending"
            );
        }
    }

    /// Record an unrecoverable failure and mark the event `failed`.
    pub async fn fatal(&self, message: impl Into<String>) {
        let message = message.into();
        error!(event_id = %self.event_id, event_type = %self.event_type, "{message}");
        self.append(LogType::Fatal, &message).await;

        if let Err(e) = self
            .store
            .set_status(self.event_id, EventStatus::Failed)
            .await
        {
            error!(
                event_id = %self.event_id,
                error = %e,
                "Failed to mark event as failed"
            );
        }
    }

    async fn append(&self, log_type: LogType, message: &str) {
        if let Err(e) = self.store.append_log(self.event_id, log_type, message).await {
            error!(
                event_id = %self.event_id,
                error = %e,
                "Failed to append event log"
            );
        }
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("event_id", &self.event_id)
            .field("event_type", &self.event_type)
            .field("grace", &self.grace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NewEvent;
    use crate::store::MemoryEventStore;

    async fn claimed_event(store: &MemoryEventStore) -> Uuid {
        let id = store
            .insert(NewEvent {
                event_type: "create:team".into(),
                owner: "team-a".to_string(),
                payload: serde_json::json!({}),
                deadline: time::Duration::minutes(5),
            })
            .await
            .unwrap();
        assert!(store.claim(id).await.unwrap());
        id
    }

    fn logger(store: &MemoryEventStore, id: Uuid) -> EventLogger {
        EventLogger::new(Arc::new(store.clone()), id, "create:team", DEFAULT_ERROR_GRACE)
    }

    #[tokio::test]
    async fn test_info_only_appends() {
        let store = MemoryEventStore::new();
        let id = claimed_event(&store).await;
        logger(&store, id).info("creating team").await;

        let logs = store.all_logs(id).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_type, LogType::Info);
        assert_eq!(logs[0].message, "creating team");
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            EventStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_error_moves_to_pending_once() {
        let store = MemoryEventStore::new();
        let id = claimed_event(&store).await;
        let log = logger(&store, id);
        log.error("api unavailable").await;
        log.error("still unavailable").await;

        let event = store.get(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.retry_count, 1);
        assert_eq!(event.deadline, time::Duration::minutes(8));
        assert_eq!(store.all_logs(id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_fails_event() {
        let store = MemoryEventStore::new();
        let id = claimed_event(&store).await;
        logger(&store, id).fatal("team slug taken").await;

        let event = store.get(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Failed);
        let logs = store.all_logs(id).await;
        assert_eq!(logs[0].log_type, LogType::Fatal);
    }
}
