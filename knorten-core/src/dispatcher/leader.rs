//! Leadership gate for the dispatch loop.
//!
//! Only the leader dispatches. The election itself lives outside this
//! crate (a Kubernetes lease, an advisory lock, ...); the dispatcher only
//! asks whether it currently holds leadership.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaderError {
    /// The election backend could not be reached
    #[error("leader election unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LeaderElection: Send + Sync {
    async fn is_leader(&self) -> Result<bool, LeaderError>;
}

/// Single-instance deployments: always the leader.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLeader;

#[async_trait]
impl LeaderElection for AlwaysLeader {
    async fn is_leader(&self) -> Result<bool, LeaderError> {
        Ok(true)
    }
}

/// Leadership flag set by an external elector.
#[derive(Debug, Clone, Default)]
pub struct LeaderFlag {
    leader: Arc<AtomicBool>,
}

impl LeaderFlag {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: Arc::new(AtomicBool::new(leader)),
        }
    }

    pub fn set(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeaderElection for LeaderFlag {
    async fn is_leader(&self) -> Result<bool, LeaderError> {
        Ok(self.leader.load(Ordering::SeqCst))
    }
}
