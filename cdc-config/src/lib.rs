//! Typed configuration for the binlog augmentation pipeline.
//!
//! Every setting is deserialized into a typed struct and validated once through
//! [`shared::ReplicatorConfig::validate`] before any component is built from it.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
