use crate::entities::{Event, LogType};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of an event's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventLog {
    pub id: Uuid,
    pub event_id: Uuid,
    pub log_type: LogType,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// An event with its most recent log rows, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWithLogs {
    pub event: Event,
    pub logs: Vec<EventLog>,
}

#[derive(Debug, Clone)]
pub struct InsertEventLog {
    pub id: Uuid,
    pub event_id: Uuid,
    pub log_type: LogType,
    pub message: String,
}

impl Processor<InsertEventLog> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEventLog")]
    async fn process(&self, insert: InsertEventLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO event_logs (id, event_id, log_type, message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(insert.id)
        .bind(insert.event_id)
        .bind(insert.log_type)
        .bind(&insert.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// The most recent `limit` log rows of an event, newest first.
pub struct ListEventLogs {
    pub event_id: Uuid,
    pub limit: i64,
}

impl Processor<ListEventLogs> for DatabaseProcessor {
    type Output = Vec<EventLog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEventLogs")]
    async fn process(&self, query: ListEventLogs) -> Result<Vec<EventLog>, sqlx::Error> {
        let logs = sqlx::query_as::<_, EventLog>(
            r#"
            SELECT id, event_id, log_type, message, created_at
            FROM event_logs
            WHERE event_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(query.event_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}
