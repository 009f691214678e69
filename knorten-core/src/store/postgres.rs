use super::{DispatchFilter, EventStore, StoreError, select_dispatchable, validate_new_event};
use crate::entities::event::{
    ClaimEvent, GetEventById, InsertEvent, ListEventsByOwner, ListProcessingEvents,
    ListUpcomingEvents, MarkEventPending, ResetProcessingEvents, ResetStaleProcessingEvents, SetEventStatus,
};
use crate::entities::event_log::{InsertEventLog, ListEventLogs};
use crate::entities::{Event, EventLog, EventStatus, EventWithLogs, LogType, NewEvent};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// [`EventStore`] backed by the `events` and `event_logs` tables.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    db: DatabaseProcessor,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert(&self, event: NewEvent) -> Result<Uuid, StoreError> {
        validate_new_event(&event)?;
        let id = self
            .db
            .process(InsertEvent {
                id: Uuid::now_v7(),
                event,
            })
            .await?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.db.process(GetEventById { id }).await?)
    }

    async fn list_dispatchable(
        &self,
        filter: &DispatchFilter,
        now: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError> {
        let processing = self.db.process(ListProcessingEvents).await?;
        let upcoming = self.db.process(ListUpcomingEvents).await?;
        Ok(select_dispatchable(&processing, &upcoming, filter, now))
    }

    async fn claim(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.db.process(ClaimEvent { id }).await?)
    }

    async fn set_status(&self, id: Uuid, status: EventStatus) -> Result<bool, StoreError> {
        Ok(self.db.process(SetEventStatus { id, status }).await?)
    }

    async fn increment_retry_and_extend_deadline(
        &self,
        id: Uuid,
        extension: time::Duration,
    ) -> Result<bool, StoreError> {
        Ok(self.db.process(MarkEventPending { id, extension }).await?)
    }

    async fn append_log(
        &self,
        event_id: Uuid,
        log_type: LogType,
        message: &str,
    ) -> Result<(), StoreError> {
        self.db
            .process(InsertEventLog {
                id: Uuid::now_v7(),
                event_id,
                log_type,
                message: message.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn logs_for_event(&self, id: Uuid, limit: i64) -> Result<Vec<EventLog>, StoreError> {
        Ok(self
            .db
            .process(ListEventLogs {
                event_id: id,
                limit,
            })
            .await?)
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
        Ok(self
            .db
            .process(ListEventsByOwner {
                owner: owner.to_string(),
                limit,
            })
            .await?)
    }

    async fn reset_processing(&self) -> Result<u64, StoreError> {
        Ok(self.db.process(ResetProcessingEvents).await?)
    }

    async fn reset_stale_processing(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(self.db.process(ResetStaleProcessingEvents { now }).await?)
    }
}
