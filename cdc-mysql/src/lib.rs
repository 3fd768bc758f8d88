//! MySQL building blocks shared by the replicator crates.
//!
//! [`types`] holds the table, column and checkpoint model. [`replication`] wraps the
//! `sqlx` queries used to introspect the active schema and to hold named locks.

pub mod replication;
pub mod types;
