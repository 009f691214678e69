pub mod admin;
pub mod events;
pub mod payloads;

pub use events::{
    EventClass, EventStatus, EventType, LogType, UnknownEventClass, UnknownEventType, resource_of,
};
