//! Buffering of row events between transaction boundaries.

mod buffer;
mod container;

pub use buffer::{TransactionBuffer, TransactionMetadata, TransactionStamp};
pub use container::EventBuffer;
