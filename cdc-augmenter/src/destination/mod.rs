//! Targets receiving generated mutations.

mod base;
pub mod memory;

pub use base::MutationSink;
