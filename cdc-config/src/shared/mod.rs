//! Configuration sections shared by every replicator component.

mod base;
mod checkpoint;
mod connection;
mod coordinator;
mod mutation;
mod replicator;
mod schema;
mod transaction;

pub use base::ValidationError;
pub use checkpoint::{BinlogPositionConfig, CheckpointConfig, StartPositionConfig};
pub use connection::{MySqlConnectionConfig, MySqlConnectionConfigWithoutSecrets};
pub use coordinator::{CoordinatorConfig, LeaderElectionConfig};
pub use mutation::{MutationConfig, PayloadTableConfig};
pub use replicator::ReplicatorConfig;
pub use schema::ActiveSchemaConfig;
pub use transaction::{BufferKind, TransactionBufferConfig};
