//! Utilities shared by unit and integration tests.
//!
//! - [`config`] replicator configuration for tests
//! - [`schema`] in-memory schema source and sample tables
//! - [`event`] builder for raw binlog events
//! - [`supplier`] event supplier fed from the test
//! - [`sink`] sink wrapper with notifications and failure injection
//! - [`notify`] notifications with a timeout
//! - [`logging`] log output for tests

pub mod config;
pub mod event;
pub mod logging;
pub mod notify;
pub mod schema;
pub mod sink;
pub mod supplier;
