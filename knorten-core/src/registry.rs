//! Maps event type tags to the handlers that execute them.
//!
//! The registry is built once at startup with [`WorkerRegistry::builder`]
//! and shared immutably afterwards, so lookups never lock.

use crate::entities::Event;
use crate::executors::Outcome;
use crate::logger::EventLogger;
use async_trait::async_trait;
use compact_str::CompactString;
use knorten_sdk::objects::{EventClass, EventType};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// Errors a handler reports instead of an [`Outcome`].
///
/// All of them fail the event: retrying cannot fix them.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload does not match the type the handler expects
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The handler was registered for a tag it does not implement
    #[error("unsupported event type: {0}")]
    Unsupported(CompactString),
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &Event, logger: &EventLogger) -> Result<Outcome, HandlerError>;
}

/// Decodes the payload into `P` and passes it to an async closure.
pub struct PayloadHandler<P, F> {
    f: F,
    _payload: PhantomData<fn() -> P>,
}

impl<P, F> PayloadHandler<P, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F, Fut> Handler for PayloadHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P, EventLogger) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    async fn handle(&self, event: &Event, logger: &EventLogger) -> Result<Outcome, HandlerError> {
        let payload: P = event.decode_payload()?;
        Ok((self.f)(payload, logger.clone()).await)
    }
}

struct Entry {
    class: EventClass,
    handler: Arc<dyn Handler>,
}

pub struct WorkerRegistry {
    entries: HashMap<CompactString, Entry>,
}

impl WorkerRegistry {
    pub fn builder() -> WorkerRegistryBuilder {
        WorkerRegistryBuilder::default()
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Handler>> {
        self.entries.get(tag).map(|e| Arc::clone(&e.handler))
    }

    pub fn class_of(&self, tag: &str) -> Option<EventClass> {
        self.entries.get(tag).map(|e| e.class)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered tag.
    pub fn tags(&self) -> HashSet<String> {
        self.entries.keys().map(|tag| tag.to_string()).collect()
    }

    /// Every registered tag whose class is in `classes`, sorted.
    pub fn types_in_classes(&self, classes: &HashSet<EventClass>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| classes.contains(&e.class))
            .map(|(tag, _)| tag.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: BTreeSet<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        f.debug_struct("WorkerRegistry").field("tags", &tags).finish()
    }
}

#[derive(Default)]
pub struct WorkerRegistryBuilder {
    entries: HashMap<CompactString, Entry>,
}

impl WorkerRegistryBuilder {
    /// Register `handler` for `tag`. A later registration for the same tag
    /// replaces the earlier one.
    pub fn register(
        mut self,
        tag: impl Into<CompactString>,
        class: EventClass,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.entries.insert(tag.into(), Entry { class, handler });
        self
    }

    pub fn register_type(self, event_type: EventType, handler: Arc<dyn Handler>) -> Self {
        self.register(event_type.as_str(), event_type.class(), handler)
    }

    pub fn build(self) -> WorkerRegistry {
        WorkerRegistry {
            entries: self.entries,
        }
    }
}
