pub mod event;
pub mod event_log;

pub use event::{Event, NewEvent};
pub use event_log::{EventLog, EventWithLogs};

use knorten_sdk::objects::{EventStatus as SdkEventStatus, LogType as SdkLogType};

/// Event status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `knorten_sdk::objects::EventStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "event_status")]
pub enum EventStatus {
    New,
    Processing,
    Pending,
    Completed,
    Failed,
}

impl EventStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventStatus::New => "new",
            EventStatus::Processing => "processing",
            EventStatus::Pending => "pending",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` are never left once reached.
    pub const fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Failed)
    }

    /// States an event may be in for a transition into `self` to be accepted.
    pub const fn allowed_sources(self) -> &'static [EventStatus] {
        match self {
            EventStatus::New => &[],
            EventStatus::Processing => &[EventStatus::New, EventStatus::Pending],
            EventStatus::Pending => &[EventStatus::Processing],
            EventStatus::Completed | EventStatus::Failed => {
                &[EventStatus::Processing, EventStatus::Pending]
            }
        }
    }

    pub fn can_transition_to(self, to: EventStatus) -> bool {
        to.allowed_sources().contains(&self)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventStatus> for SdkEventStatus {
    fn from(value: EventStatus) -> Self {
        match value {
            EventStatus::New => SdkEventStatus::New,
            EventStatus::Processing => SdkEventStatus::Processing,
            EventStatus::Pending => SdkEventStatus::Pending,
            EventStatus::Completed => SdkEventStatus::Completed,
            EventStatus::Failed => SdkEventStatus::Failed,
        }
    }
}

impl From<SdkEventStatus> for EventStatus {
    fn from(value: SdkEventStatus) -> Self {
        match value {
            SdkEventStatus::New => EventStatus::New,
            SdkEventStatus::Processing => EventStatus::Processing,
            SdkEventStatus::Pending => EventStatus::Pending,
            SdkEventStatus::Completed => EventStatus::Completed,
            SdkEventStatus::Failed => EventStatus::Failed,
        }
    }
}

/// Log severity for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "log_type")]
pub enum LogType {
    Info,
    Error,
    Fatal,
}

impl From<LogType> for SdkLogType {
    fn from(value: LogType) -> Self {
        match value {
            LogType::Info => SdkLogType::Info,
            LogType::Error => SdkLogType::Error,
            LogType::Fatal => SdkLogType::Fatal,
        }
    }
}

impl From<SdkLogType> for LogType {
    fn from(value: SdkLogType) -> Self {
        match value {
            SdkLogType::Info => LogType::Info,
            SdkLogType::Error => LogType::Error,
            SdkLogType::Fatal => LogType::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exit() {
        for to in [
            EventStatus::New,
            EventStatus::Processing,
            EventStatus::Pending,
            EventStatus::Completed,
            EventStatus::Failed,
        ] {
            assert!(!EventStatus::Completed.can_transition_to(to));
            assert!(!EventStatus::Failed.can_transition_to(to));
        }
    }

    #[test]
    fn test_pending_only_reachable_from_processing() {
        assert!(EventStatus::Processing.can_transition_to(EventStatus::Pending));
        assert!(!EventStatus::New.can_transition_to(EventStatus::Pending));
        assert!(!EventStatus::Pending.can_transition_to(EventStatus::Pending));
    }

    #[test]
    fn test_claim_sources() {
        assert!(EventStatus::New.can_transition_to(EventStatus::Processing));
        assert!(EventStatus::Pending.can_transition_to(EventStatus::Processing));
        assert!(!EventStatus::Processing.can_transition_to(EventStatus::Processing));
    }
}
