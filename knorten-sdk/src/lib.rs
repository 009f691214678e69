//! Shared objects for the knorten event dispatcher.
//!
//! These types are the wire/DTO side of the system: event type tags, pause
//! classes, payloads consumed by domain executors, and the operator API
//! responses. Database-facing counterparts live in `knorten-core::entities`.

pub mod objects;
