//! Runtime pause switches for event classes.
//!
//! `PausedClasses` wraps the set of paused [`EventClass`]es behind
//! `Arc<RwLock<_>>` and bumps a watch-channel version on every change, so
//! the dispatcher can react to a resume without waiting for its next tick.

use knorten_sdk::objects::EventClass;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

#[derive(Clone)]
pub struct PausedClasses {
    inner: Arc<PausedClassesInner>,
}

struct PausedClassesInner {
    classes: RwLock<HashSet<EventClass>>,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when the paused set changes.
pub struct PausedClassesWatcher {
    version_rx: watch::Receiver<u64>,
}

impl PausedClasses {
    pub fn new(initial: impl IntoIterator<Item = EventClass>) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(PausedClassesInner {
                classes: RwLock::new(initial.into_iter().collect()),
                version_tx,
            }),
        }
    }

    /// Returns whether the class was not already paused.
    pub async fn pause(&self, class: EventClass) -> bool {
        let changed = self.inner.classes.write().await.insert(class);
        if changed {
            self.notify();
        }
        changed
    }

    /// Returns whether the class was paused.
    pub async fn resume(&self, class: EventClass) -> bool {
        let changed = self.inner.classes.write().await.remove(&class);
        if changed {
            self.notify();
        }
        changed
    }

    /// Replace the whole set, e.g. after a configuration reload.
    pub async fn replace(&self, classes: impl IntoIterator<Item = EventClass>) {
        let next: HashSet<EventClass> = classes.into_iter().collect();
        let mut guard = self.inner.classes.write().await;
        if *guard == next {
            return;
        }
        *guard = next;
        drop(guard);
        self.notify();
    }

    pub async fn is_paused(&self, class: EventClass) -> bool {
        self.inner.classes.read().await.contains(&class)
    }

    pub async fn snapshot(&self) -> HashSet<EventClass> {
        self.inner.classes.read().await.clone()
    }

    pub fn subscribe(&self) -> PausedClassesWatcher {
        PausedClassesWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }

    fn notify(&self) {
        self.inner.version_tx.send_modify(|v| *v += 1);
    }
}

impl Default for PausedClasses {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for PausedClasses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PausedClasses")
            .field("version", &*self.inner.version_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl PausedClassesWatcher {
    /// Wait until the paused set changes.
    ///
    /// Returns `Err` once every [`PausedClasses`] handle has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pause_resume() {
        let paused = PausedClasses::new([EventClass::Airflow]);
        assert!(paused.is_paused(EventClass::Airflow).await);
        assert!(!paused.pause(EventClass::Airflow).await);
        assert!(paused.pause(EventClass::Jupyter).await);
        assert!(paused.resume(EventClass::Airflow).await);
        assert!(!paused.resume(EventClass::Airflow).await);
        assert_eq!(paused.snapshot().await, HashSet::from([EventClass::Jupyter]));
    }

    #[tokio::test]
    async fn test_watcher_sees_changes_only() {
        let paused = PausedClasses::default();
        let mut watcher = paused.subscribe();

        paused.replace(Vec::new()).await;
        let idle = tokio::time::timeout(Duration::from_millis(20), watcher.changed()).await;
        assert!(idle.is_err());

        paused.pause(EventClass::Compute).await;
        tokio::time::timeout(Duration::from_secs(1), watcher.changed())
            .await
            .unwrap()
            .unwrap();
    }
}
