use std::fmt;

use cdc_mysql::types::{BinlogPosition, TableName};

use crate::types::RawValue;

/// Kind of row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowEventType {
    Insert,
    Update,
    Delete,
}

impl RowEventType {
    /// Value of the `row_status` marker written to the target.
    pub fn row_status(&self) -> &'static str {
        match self {
            RowEventType::Insert => "I",
            RowEventType::Update => "U",
            RowEventType::Delete => "D",
        }
    }
}

impl fmt::Display for RowEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowEventType::Insert => f.write_str("INSERT"),
            RowEventType::Update => f.write_str("UPDATE"),
            RowEventType::Delete => f.write_str("DELETE"),
        }
    }
}

/// One row mutation with its images positionally aligned to the table columns.
///
/// `None` marks a column absent from the image (partial row images), while
/// `Some(RawValue::Null)` is an SQL `NULL`. An image that does not apply to the event
/// type (the before image of an insert) is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeEvent {
    pub event_type: RowEventType,
    pub table: TableName,
    pub before: Vec<Option<RawValue>>,
    pub after: Vec<Option<RawValue>>,
}

impl RawChangeEvent {
    pub fn insert(table: TableName, after: Vec<Option<RawValue>>) -> Self {
        Self {
            event_type: RowEventType::Insert,
            table,
            before: Vec::new(),
            after,
        }
    }

    pub fn update(
        table: TableName,
        before: Vec<Option<RawValue>>,
        after: Vec<Option<RawValue>>,
    ) -> Self {
        Self {
            event_type: RowEventType::Update,
            table,
            before,
            after,
        }
    }

    pub fn delete(table: TableName, before: Vec<Option<RawValue>>) -> Self {
        Self {
            event_type: RowEventType::Delete,
            table,
            before,
            after: Vec::new(),
        }
    }
}

/// Header fields shared by every binlog event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Event timestamp in seconds, the commit time for transaction boundary events.
    pub timestamp: i64,
    pub server_id: i64,
    /// Position right after this event.
    pub position: BinlogPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEventData {
    /// Announces the GTID of the transaction that follows.
    Gtid { gtid: String },
    /// A statement: `BEGIN`, `COMMIT` for non-transactional engines, or DDL.
    Query { database: String, sql: String },
    /// Commit of an XA-capable (InnoDB) transaction.
    Xid { xid: i64 },
    Rows(RawChangeEvent),
}

/// A decoded binlog event as produced by the event supplier.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub header: EventHeader,
    pub data: RawEventData,
}
