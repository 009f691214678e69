//! Execution of one claimed event.

use crate::entities::{Event, EventStatus};
use crate::executors::Outcome;
use crate::logger::EventLogger;
use crate::registry::{Handler, HandlerError};
use crate::store::EventStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Everything a worker needs besides the event and its handler.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub store: Arc<dyn EventStore>,
    pub error_grace: time::Duration,
    pub max_retries: i32,
    pub limiter: Option<Arc<Semaphore>>,
}

/// Run `handler` for an event that is already `processing` and record the
/// result.
///
/// The handler runs in its own task under a timeout equal to the event's
/// deadline; a timeout or a panic does not leave the event stuck in
/// `processing`.
pub(crate) async fn run(ctx: WorkerContext, handler: Arc<dyn Handler>, event: Event) {
    let _permit = match &ctx.limiter {
        Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                error!(event_id = %event.id, "Worker limiter closed");
                return;
            }
        },
        None => None,
    };

    let logger = EventLogger::new(
        ctx.store.clone(),
        event.id,
        event.event_type.clone(),
        ctx.error_grace,
    );
    logger
        .info(format!("dispatching event {}", event.event_type))
        .await;

    let mut task = tokio::spawn({
        let handler = Arc::clone(&handler);
        let event = event.clone();
        let logger = logger.clone();
        async move { handler.handle(&event, &logger).await }
    });

    let limit = event.deadline.unsigned_abs();
    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(Ok(Outcome::Done))) => complete(&ctx, &event).await,
        Ok(Ok(Ok(Outcome::Retry))) => retry_or_fail(&ctx, &event, &logger, None).await,
        Ok(Ok(Ok(Outcome::Fatal(reason)))) => logger.fatal(reason).await,
        Ok(Ok(Err(HandlerError::MalformedPayload(e)))) => {
            logger.fatal(format!("malformed payload: {e}")).await
        }
        Ok(Ok(Err(e @ HandlerError::Unsupported(_)))) => logger.fatal(e.to_string()).await,
        Ok(Err(join_error)) => {
            logger
                .fatal(format!("executor aborted: {join_error}"))
                .await
        }
        Err(_) => {
            task.abort();
            let reason = format!("event timed out after {}s", limit.as_secs());
            retry_or_fail(&ctx, &event, &logger, Some(reason)).await
        }
    }
}

async fn complete(ctx: &WorkerContext, event: &Event) {
    match ctx.store.set_status(event.id, EventStatus::Completed).await {
        Ok(true) => info!(event_id = %event.id, event_type = %event.event_type, "Event completed"),
        Ok(false) => debug!(event_id = %event.id, "Event already left processing, not completing"),
        Err(e) => error!(event_id = %event.id, error = %e, "Failed to mark event as completed"),
    }
}

/// Return the event to `pending`, or fail it once it has used up its
/// retries. `reason` is logged as an error row when given.
async fn retry_or_fail(
    ctx: &WorkerContext,
    event: &Event,
    logger: &EventLogger,
    reason: Option<String>,
) {
    if event.retry_count >= ctx.max_retries {
        logger
            .fatal(format!("reached max retries ({})", ctx.max_retries))
            .await;
        return;
    }

    if let Some(reason) = reason {
        logger.error(reason).await;
        return;
    }

    match ctx
        .store
        .increment_retry_and_extend_deadline(event.id, ctx.error_grace)
        .await
    {
        Ok(true) => debug!(
            event_id = %event.id,
            retry_count = event.retry_count + 1,
            "Event returned to pending"
        ),
        Ok(false) => debug!(event_id = %event.id, "Event already left processing"),
        Err(e) => error!(event_id = %event.id, error = %e, "Failed to return event to pending"),
    }
}
