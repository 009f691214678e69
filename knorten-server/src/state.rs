//! Application state shared across all request handlers.

use knorten_core::dispatcher::DispatcherHandle;
use knorten_core::store::EventStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Entry point to the running dispatcher.
    pub dispatcher: DispatcherHandle,
}

impl AppState {
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        self.dispatcher.store()
    }
}
