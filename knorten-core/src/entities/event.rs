use crate::entities::EventStatus;
use crate::framework::DatabaseProcessor;
use crate::utils::backoff;
use compact_str::CompactString;
use kanau::processor::Processor;
use knorten_sdk::objects::resource_of;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use uuid::Uuid;

/// A durable record of one requested mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: Uuid,
    /// `<action>:<resource>` tag; free text so that tags unknown to this
    /// binary still load.
    pub event_type: CompactString,
    pub owner: String,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub deadline: time::Duration,
    pub retry_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Event {
    /// The resource part of the event's tag.
    pub fn resource(&self) -> &str {
        resource_of(&self.event_type)
    }

    /// Two events with the same key never run concurrently.
    pub fn exclusion_key(&self) -> (&str, &str) {
        (self.owner.as_str(), self.resource())
    }

    /// When a pending event becomes eligible for re-dispatch, if ever.
    pub fn due_at(&self) -> Option<OffsetDateTime> {
        backoff::next_due_at(self.updated_at, self.deadline, self.retry_count)
    }

    /// Whether a pending event is overdue at `now`.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        backoff::is_overdue(self.updated_at, self.deadline, self.retry_count, now)
    }

    pub fn decode_payload<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.payload)
    }
}

/// Data for registering a new event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: CompactString,
    pub owner: String,
    pub payload: serde_json::Value,
    pub deadline: time::Duration,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    event_type: CompactString,
    owner: String,
    payload: serde_json::Value,
    status: EventStatus,
    deadline_secs: i64,
    retry_count: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            owner: row.owner,
            payload: row.payload,
            status: row.status,
            deadline: time::Duration::seconds(row.deadline_secs),
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const EVENT_COLUMNS: &str =
    "id, type, owner, payload, status, deadline_secs, retry_count, created_at, updated_at";

#[derive(Debug, Clone)]
/// Insert a new event with status `new`.
pub struct InsertEvent {
    pub id: Uuid,
    pub event: NewEvent,
}

impl Processor<InsertEvent> for DatabaseProcessor {
    type Output = Uuid;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEvent")]
    async fn process(&self, insert: InsertEvent) -> Result<Uuid, sqlx::Error> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO events (id, type, owner, payload, status, deadline_secs)
            VALUES ($1, $2, $3, $4, 'new', $5)
            RETURNING id
            "#,
        )
        .bind(insert.id)
        .bind(insert.event.event_type.as_str())
        .bind(&insert.event.owner)
        .bind(&insert.event.payload)
        .bind(insert.event.deadline.whole_seconds())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone)]
pub struct GetEventById {
    pub id: Uuid,
}

impl Processor<GetEventById> for DatabaseProcessor {
    type Output = Option<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventById")]
    async fn process(&self, query: GetEventById) -> Result<Option<Event>, sqlx::Error> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::from))
    }
}

#[derive(Debug, Clone)]
/// Events currently being worked on.
pub struct ListProcessingEvents;

impl Processor<ListProcessingEvents> for DatabaseProcessor {
    type Output = Vec<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListProcessingEvents")]
    async fn process(&self, _query: ListProcessingEvents) -> Result<Vec<Event>, sqlx::Error> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = 'processing' ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }
}

#[derive(Debug, Clone)]
/// `new` and `pending` events, due or not, oldest first.
///
/// Not-yet-due pending events are returned too: they still block new
/// siblings from being dispatched.
pub struct ListUpcomingEvents;

impl Processor<ListUpcomingEvents> for DatabaseProcessor {
    type Output = Vec<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListUpcomingEvents")]
    async fn process(&self, _query: ListUpcomingEvents) -> Result<Vec<Event>, sqlx::Error> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE status = 'new' OR status = 'pending'
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }
}

#[derive(Debug, Clone)]
pub struct ListEventsByOwner {
    pub owner: String,
    pub limit: i64,
}

impl Processor<ListEventsByOwner> for DatabaseProcessor {
    type Output = Vec<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEventsByOwner")]
    async fn process(&self, query: ListEventsByOwner) -> Result<Vec<Event>, sqlx::Error> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE owner = $1
            ORDER BY updated_at DESC
            LIMIT $2
            "#
        ))
        .bind(&query.owner)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }
}

#[derive(Debug, Clone)]
/// Move a `new`/`pending` event to `processing`, unless another event with
/// the same owner and resource is already processing.
///
/// Returns whether this call won the claim.
pub struct ClaimEvent {
    pub id: Uuid,
}

impl Processor<ClaimEvent> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimEvent")]
    async fn process(&self, cmd: ClaimEvent) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events AS e
            SET status = 'processing', updated_at = NOW()
            WHERE e.id = $1
              AND e.status IN ('new', 'pending')
              AND NOT EXISTS (
                SELECT 1 FROM events AS s
                WHERE s.owner = e.owner
                  AND substring(s.type FROM position(':' IN s.type) + 1)
                    = substring(e.type FROM position(':' IN e.type) + 1)
                  AND s.status = 'processing'
                  AND s.id <> e.id
              )
            "#,
        )
        .bind(cmd.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Set the status of an event if the transition table allows it.
pub struct SetEventStatus {
    pub id: Uuid,
    pub status: EventStatus,
}

impl Processor<SetEventStatus> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetEventStatus")]
    async fn process(&self, cmd: SetEventStatus) -> Result<bool, sqlx::Error> {
        let sources: Vec<String> = cmd
            .status
            .allowed_sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        if sources.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status::text = ANY($3)
            "#,
        )
        .bind(cmd.status)
        .bind(cmd.id)
        .bind(&sources)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Move a `processing` event to `pending`, bump its retry count and extend
/// its deadline.
pub struct MarkEventPending {
    pub id: Uuid,
    pub extension: time::Duration,
}

impl Processor<MarkEventPending> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkEventPending")]
    async fn process(&self, cmd: MarkEventPending) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = 'pending',
                retry_count = retry_count + 1,
                deadline_secs = LEAST(deadline_secs, 9223372036854775807 - $2) + $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.extension.whole_seconds())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Return every `processing` event to `pending`.
pub struct ResetProcessingEvents;

impl Processor<ResetProcessingEvents> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ResetProcessingEvents")]
    async fn process(&self, _cmd: ResetProcessingEvents) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = 'pending', updated_at = NOW()
            WHERE status = 'processing'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Return `processing` events whose deadline ran out before `now` to `pending`.
pub struct ResetStaleProcessingEvents {
    pub now: OffsetDateTime,
}

impl Processor<ResetStaleProcessingEvents> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ResetStaleProcessingEvents")]
    async fn process(&self, cmd: ResetStaleProcessingEvents) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = 'pending', updated_at = NOW()
            WHERE status = 'processing'
              AND updated_at + deadline_secs * INTERVAL '1 second' < $1
            "#,
        )
        .bind(cmd.now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
