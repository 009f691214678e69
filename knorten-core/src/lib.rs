#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod entities;
pub mod events;
pub mod executors;
pub mod framework;
pub mod logger;
pub mod registry;
pub mod store;
pub mod utils;
