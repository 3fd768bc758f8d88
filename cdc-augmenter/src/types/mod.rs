//! Event and row model flowing through the pipeline.

mod event;
mod row;
mod value;

pub use event::{EventHeader, RawChangeEvent, RawEvent, RawEventData, RowEventType};
pub use row::{AugmentedColumn, AugmentedRow};
pub use value::RawValue;
