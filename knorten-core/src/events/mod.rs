//! Internal wake-up channel of the dispatcher.

use compact_str::CompactString;
use tokio::sync::mpsc;

/// Buffer size of the trigger channel.
///
/// Triggers are coalesced: one queued trigger already guarantees another
/// dispatch cycle, so a full buffer simply drops the extra ones.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Request for an immediate dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTrigger {
    /// What caused the trigger, for tracing only.
    pub hint: CompactString,
}

pub type DispatchTriggerSender = mpsc::Sender<DispatchTrigger>;
pub type DispatchTriggerReceiver = mpsc::Receiver<DispatchTrigger>;

pub fn dispatch_trigger_channel() -> (DispatchTriggerSender, DispatchTriggerReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
