//! Runtime configuration for the dispatcher.
//!
//! These types hold validated values; parsing the configuration file is
//! the server crate's job.

mod maintenance;

pub use maintenance::{PausedClasses, PausedClassesWatcher};

use crate::logger::DEFAULT_ERROR_GRACE;
use std::time::Duration;

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Interval between dispatch cycles when nothing triggers one.
    pub tick_interval: Duration,
    /// Deadline extension applied whenever an event goes back to `pending`.
    pub error_grace: time::Duration,
    /// Retries after which an event is failed instead of retried again.
    pub max_retries: i32,
    /// Cap on concurrently running executor calls. `None` means unbounded.
    pub max_concurrent_workers: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            error_grace: DEFAULT_ERROR_GRACE,
            max_retries: 5,
            max_concurrent_workers: None,
        }
    }
}
