//! Augmentation core of a MySQL binlog replicator.
//!
//! Raw row and statement events from an [`source::EventSupplier`] are combined with
//! the live table schemas of [`schema::SchemaCache`], grouped by transaction in a
//! [`transaction::TransactionBuffer`] and turned into versioned cell writes by
//! [`mutation::MutationGenerator`]. The [`pipeline::Pipeline`] runs this chain only
//! while its [`coordinator::LeaderCoordinator`] holds leadership, resuming from the
//! durable checkpoint of the previous leader.

#[macro_use]
mod macros;

pub mod augment;
pub mod concurrency;
pub mod coordinator;
pub mod destination;
pub mod error;
pub mod mutation;
pub mod pipeline;
pub mod replication;
pub mod schema;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transaction;
pub mod types;
