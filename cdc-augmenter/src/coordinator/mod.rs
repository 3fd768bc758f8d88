mod checkpoint;
mod configured;
mod election;
mod leader;
mod mysql;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use configured::ConfiguredElection;
pub use election::{LeaderElection, LeaderGroup, MemberId, MemoryLeaderElection};
pub use leader::{CoordinatorHandle, LeaderCoordinator, LeadershipState};
pub use mysql::MySqlLeaderElection;
