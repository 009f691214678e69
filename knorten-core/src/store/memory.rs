//! In-process event store.
//!
//! Holds events and logs behind a single [`tokio::sync::RwLock`], so every
//! operation is atomic with respect to the others. Lookups are linear scans;
//! this store is meant for tests and small embedded deployments.

use super::{DispatchFilter, EventStore, StoreError, select_dispatchable, validate_new_event};
use crate::entities::{Event, EventLog, EventStatus, EventWithLogs, LogType, NewEvent};
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    /// Append-only, oldest first.
    logs: Vec<EventLog>,
}

impl Inner {
    fn event_mut(&mut self, id: Uuid) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id == id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored events in insertion order.
    pub async fn events(&self) -> Vec<Event> {
        self.inner.read().await.events.clone()
    }

    /// All stored logs of one event, oldest first.
    pub async fn all_logs(&self, event_id: Uuid) -> Vec<EventLog> {
        self.inner
            .read()
            .await
            .logs
            .iter()
            .filter(|l| l.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: NewEvent) -> Result<Uuid, StoreError> {
        validate_new_event(&event)?;
        let now = OffsetDateTime::now_utc();
        let id = Uuid::now_v7();
        self.inner.write().await.events.push(Event {
            id,
            event_type: event.event_type,
            owner: event.owner,
            payload: event.payload,
            status: EventStatus::New,
            deadline: event.deadline,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_dispatchable(
        &self,
        filter: &DispatchFilter,
        now: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read().await;
        let (processing, upcoming): (Vec<Event>, Vec<Event>) = inner
            .events
            .iter()
            .filter(|e| {
                matches!(
                    e.status,
                    EventStatus::Processing | EventStatus::New | EventStatus::Pending
                )
            })
            .cloned()
            .partition(|e| e.status == EventStatus::Processing);
        Ok(select_dispatchable(&processing, &upcoming, filter, now))
    }

    async fn claim(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(target) = inner.events.iter().find(|e| e.id == id) else {
            return Ok(false);
        };
        if !target.status.can_transition_to(EventStatus::Processing) {
            return Ok(false);
        }
        let (owner, resource) = target.exclusion_key();
        let busy = inner.events.iter().any(|e| {
            e.id != id
                && e.status == EventStatus::Processing
                && e.exclusion_key() == (owner, resource)
        });
        if busy {
            return Ok(false);
        }

        let Some(event) = inner.event_mut(id) else {
            return Ok(false);
        };
        event.status = EventStatus::Processing;
        event.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn set_status(&self, id: Uuid, status: EventStatus) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(event) = inner.event_mut(id) else {
            return Ok(false);
        };
        if !event.status.can_transition_to(status) {
            return Ok(false);
        }
        event.status = status;
        event.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn increment_retry_and_extend_deadline(
        &self,
        id: Uuid,
        extension: time::Duration,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(event) = inner.event_mut(id) else {
            return Ok(false);
        };
        if event.status != EventStatus::Processing {
            return Ok(false);
        }
        event.status = EventStatus::Pending;
        event.retry_count += 1;
        event.deadline = event.deadline.saturating_add(extension);
        event.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn append_log(
        &self,
        event_id: Uuid,
        log_type: LogType,
        message: &str,
    ) -> Result<(), StoreError> {
        self.inner.write().await.logs.push(EventLog {
            id: Uuid::now_v7(),
            event_id,
            log_type,
            message: message.to_string(),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn logs_for_event(&self, id: Uuid, limit: i64) -> Result<Vec<EventLog>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|l| l.event_id == id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn logs_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<EventWithLogs>, StoreError> {
        let events = self.events_for_owner(owner, limit).await?;
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            let logs = self.logs_for_event(event.id, limit).await?;
            out.push(EventWithLogs { event, logs });
        }
        Ok(out)
    }

    async fn events_for_owner(&self, owner: &str, limit: i64) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read().await;
        let mut events: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| e.owner == owner)
            .cloned()
            .collect();
        // Stable sort keeps the later insert first on equal timestamps.
        events.reverse();
        events.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn reset_processing(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        let mut count = 0;
        for event in inner
            .events
            .iter_mut()
            .filter(|e| e.status == EventStatus::Processing)
        {
            event.status = EventStatus::Pending;
            event.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn reset_stale_processing(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let updated_at = OffsetDateTime::now_utc();
        let mut count = 0;
        for event in inner.events.iter_mut().filter(|e| {
            e.status == EventStatus::Processing
                && e.updated_at
                    .checked_add(e.deadline)
                    .is_some_and(|expires| expires < now)
        }) {
            event.status = EventStatus::Pending;
            event.updated_at = updated_at;
            count += 1;
        }
        Ok(count)
    }
}
