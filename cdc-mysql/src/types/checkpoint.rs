use std::fmt;

use serde::{Deserialize, Serialize};

/// Binlog coordinates: file name and byte offset within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinlogPosition {
    pub filename: String,
    pub position: u64,
}

impl BinlogPosition {
    pub fn new(filename: impl Into<String>, position: u64) -> Self {
        Self {
            filename: filename.into(),
            position,
        }
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.position)
    }
}

/// Durable position marker of the replication stream.
///
/// A checkpoint identifies a transaction boundary by binlog coordinates, GTID set,
/// or both, and is persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Commit timestamp of the transaction, in seconds.
    pub timestamp: i64,
    /// `server_id` of the source that produced the transaction.
    pub server_id: i64,
    /// GTID of the transaction, when the source runs with GTIDs.
    #[serde(default)]
    pub gtid: Option<String>,
    #[serde(default)]
    pub binlog: Option<BinlogPosition>,
    /// Executed GTID set up to and including this transaction.
    #[serde(default)]
    pub gtid_set: Option<String>,
    /// Ordinal of the transaction among those committed within the same second.
    #[serde(default)]
    pub transaction_sequence_number: i64,
}

impl Checkpoint {
    pub fn from_binlog(position: BinlogPosition) -> Self {
        Self {
            binlog: Some(position),
            ..Default::default()
        }
    }

    pub fn from_gtid_set(gtid_set: impl Into<String>) -> Self {
        Self {
            gtid_set: Some(gtid_set.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.binlog, &self.gtid_set) {
            (Some(binlog), Some(gtid_set)) => write!(f, "{binlog} ({gtid_set})"),
            (Some(binlog), None) => write!(f, "{binlog}"),
            (None, Some(gtid_set)) => write!(f, "{gtid_set}"),
            (None, None) => write!(f, "<start of log> @ {}", self.timestamp),
        }
    }
}
