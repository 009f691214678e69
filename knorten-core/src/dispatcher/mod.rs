//! The dispatch loop.
//!
//! The dispatcher is responsible for:
//! - Waking up on a trigger, a fixed tick or a change of paused classes
//! - Skipping the cycle unless this instance is the leader
//! - Asking the store for dispatchable events, minus paused types
//! - Claiming each candidate and spawning a worker for it
//!
//! Workers run detached; shutting the loop down does not cancel them.

mod leader;
mod worker;

pub use leader::{AlwaysLeader, LeaderElection, LeaderError, LeaderFlag};

use crate::config::{DispatcherConfig, PausedClasses};
use crate::entities::{EventStatus, NewEvent};
use crate::events::{
    DispatchTrigger, DispatchTriggerReceiver, DispatchTriggerSender, dispatch_trigger_channel,
};
use crate::registry::WorkerRegistry;
use crate::store::{DispatchFilter, EventStore, StoreError};
use compact_str::CompactString;
use knorten_sdk::objects::{EventClass, EventType};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use worker::WorkerContext;

/// Errors that abort one dispatch cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("leader election error: {0}")]
    Leader(#[from] LeaderError),
}

/// Errors returned when registering an event.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The payload could not be serialized to JSON
    #[error("payload serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct Dispatcher {
    store: Arc<dyn EventStore>,
    registry: Arc<WorkerRegistry>,
    config: DispatcherConfig,
    paused: PausedClasses,
    leader: Arc<dyn LeaderElection>,
    was_leader: AtomicBool,
    limiter: Option<Arc<Semaphore>>,
    trigger_rx: DispatchTriggerReceiver,
}

impl Dispatcher {
    /// Create a dispatcher and the handle used to feed it.
    pub fn new(
        store: Arc<dyn EventStore>,
        registry: Arc<WorkerRegistry>,
        config: DispatcherConfig,
    ) -> (Self, DispatcherHandle) {
        let (trigger_tx, trigger_rx) = dispatch_trigger_channel();
        let paused = PausedClasses::default();
        let limiter = config
            .max_concurrent_workers
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let handle = DispatcherHandle {
            store: store.clone(),
            paused: paused.clone(),
            trigger_tx,
        };
        let dispatcher = Self {
            store,
            registry,
            config,
            paused,
            leader: Arc::new(AlwaysLeader),
            was_leader: AtomicBool::new(false),
            limiter,
            trigger_rx,
        };
        (dispatcher, handle)
    }

    pub fn with_leader_election(mut self, leader: Arc<dyn LeaderElection>) -> Self {
        self.leader = leader;
        self
    }

    /// Run the dispatch loop until `shutdown_rx` turns `true`.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            tick_interval = ?self.config.tick_interval,
            handlers = self.registry.len(),
            "Dispatcher started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut paused_watcher = self.paused.subscribe();

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Dispatcher received shutdown signal");
                        break;
                    }
                    continue;
                }

                Some(trigger) = self.trigger_rx.recv() => {
                    // Coalesce triggers queued while the last cycle ran.
                    let mut coalesced = 0usize;
                    while self.trigger_rx.try_recv().is_ok() {
                        coalesced += 1;
                    }
                    debug!(hint = %trigger.hint, coalesced, "Dispatch triggered");
                }

                Ok(()) = paused_watcher.changed() => {
                    debug!("Paused classes changed");
                }

                _ = ticker.tick() => {}
            }

            self.dispatch_cycle().await;
        }

        info!("Dispatcher shutdown complete");
    }

    async fn dispatch_cycle(&self) {
        match self.dispatch_cycle_at(OffsetDateTime::now_utc()).await {
            Ok(spawned) if !spawned.is_empty() => {
                debug!(count = spawned.len(), "Dispatched events");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Dispatch cycle failed"),
        }
    }

    /// Run a single dispatch cycle as if the current time were `now`.
    ///
    /// Returns the handles of the spawned workers. Dropping them detaches
    /// the workers.
    pub async fn dispatch_cycle_at(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<JoinHandle<()>>, DispatchError> {
        if !self.check_leadership().await? {
            return Ok(Vec::new());
        }

        let paused = self.paused.snapshot().await;
        let filter = DispatchFilter {
            paused_types: self.registry.types_in_classes(&paused).into_iter().collect(),
            known_types: Some(self.registry.tags()),
        };
        let candidates = self.store.list_dispatchable(&filter, now).await?;

        let ctx = WorkerContext {
            store: self.store.clone(),
            error_grace: self.config.error_grace,
            max_retries: self.config.max_retries,
            limiter: self.limiter.clone(),
        };

        let mut spawned = Vec::with_capacity(candidates.len());
        for mut event in candidates {
            let Some(handler) = self.registry.get(&event.event_type) else {
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "No handler registered for event type, leaving event untouched"
                );
                continue;
            };

            match self.store.claim(event.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(event_id = %event.id, "Event claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    error!(event_id = %event.id, error = %e, "Failed to claim event");
                    continue;
                }
            }

            debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                owner = %event.owner,
                retry_count = event.retry_count,
                "Dispatching event"
            );
            event.status = EventStatus::Processing;
            spawned.push(tokio::spawn(worker::run(ctx.clone(), handler, event)));
        }

        Ok(spawned)
    }

    /// Whether this instance may dispatch. On becoming leader, events left
    /// `processing` by a previous leader are returned to `pending` first.
    async fn check_leadership(&self) -> Result<bool, DispatchError> {
        let leader = self.leader.is_leader().await?;
        let was_leader = self.was_leader.load(Ordering::SeqCst);

        if leader && !was_leader {
            let reset = self.store.reset_processing().await?;
            info!(reset, "Acquired leadership");
            self.was_leader.store(true, Ordering::SeqCst);
        } else if !leader && was_leader {
            info!("Lost leadership");
            self.was_leader.store(false, Ordering::SeqCst);
        }

        Ok(leader)
    }
}

/// Public entry point to a running [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    store: Arc<dyn EventStore>,
    paused: PausedClasses,
    trigger_tx: DispatchTriggerSender,
}

impl DispatcherHandle {
    /// Record a new event and trigger a dispatch cycle.
    ///
    /// Fails with [`StoreError::InvalidRecord`] for an empty type or owner
    /// or a negative deadline.
    pub async fn register_event(
        &self,
        event_type: &str,
        owner: &str,
        deadline: time::Duration,
        payload: &impl Serialize,
    ) -> Result<Uuid, RegisterError> {
        let payload = serde_json::to_value(payload)?;
        let id = self
            .store
            .insert(NewEvent {
                event_type: event_type.into(),
                owner: owner.to_string(),
                payload,
                deadline,
            })
            .await?;

        info!(event_id = %id, event_type, owner, "Event registered");
        self.trigger(event_type);
        Ok(id)
    }

    /// Record a new event with the type's default deadline.
    pub async fn register(
        &self,
        event_type: EventType,
        owner: &str,
        payload: &impl Serialize,
    ) -> Result<Uuid, RegisterError> {
        self.register_event(
            event_type.as_str(),
            owner,
            event_type.default_deadline(),
            payload,
        )
        .await
    }

    /// Request a dispatch cycle without waiting for the next tick.
    ///
    /// Never blocks. Returns `false` once the dispatcher has stopped.
    pub fn trigger(&self, hint: impl Into<CompactString>) -> bool {
        match self.trigger_tx.try_send(DispatchTrigger { hint: hint.into() }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Dispatcher stopped, trigger dropped");
                false
            }
        }
    }

    /// Returns whether the class was not already paused.
    pub async fn pause_class(&self, class: EventClass) -> bool {
        let changed = self.paused.pause(class).await;
        if changed {
            info!(class = %class, "Event class paused");
        }
        changed
    }

    /// Returns whether the class was paused.
    pub async fn resume_class(&self, class: EventClass) -> bool {
        let changed = self.paused.resume(class).await;
        if changed {
            info!(class = %class, "Event class resumed");
        }
        changed
    }

    pub async fn set_paused_classes(&self, classes: impl IntoIterator<Item = EventClass>) {
        self.paused.replace(classes).await;
    }

    pub async fn paused_classes(&self) -> HashSet<EventClass> {
        self.paused.snapshot().await
    }

    /// Return `processing` events past their deadline to `pending` and
    /// trigger a cycle.
    ///
    /// Events still within their deadline may have a live worker and are
    /// left alone, so a reset never starts a second concurrent run.
    pub async fn reset_stale_processing(&self) -> Result<u64, StoreError> {
        let count = self
            .store
            .reset_stale_processing(OffsetDateTime::now_utc())
            .await?;
        info!(count, "Reset stale processing events");
        self.trigger("reset");
        Ok(count)
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        self.store.clone()
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
