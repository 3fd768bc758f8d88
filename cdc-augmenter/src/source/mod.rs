//! Suppliers of decoded binlog events.

mod base;

pub use base::EventSupplier;
