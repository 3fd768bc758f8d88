use crate::transaction::{TransactionMetadata, TransactionStamp};
use crate::types::RowEventType;

/// Before and after value of one column in string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedColumn {
    pub name: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A row change enriched with its table schema and transaction metadata.
///
/// Rows are produced by [`crate::augment::RowAugmenter`] without transaction metadata
/// and stamped in bulk when their transaction is drained from the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedRow {
    pub event_type: RowEventType,
    /// Source database of the row.
    pub schema_name: String,
    /// Logical table name the row is emitted under.
    pub table_name: String,
    /// Source table name when it differs from `table_name`.
    pub original_table_name: Option<String>,
    /// Whether the row belongs to the transaction payload table.
    pub is_payload: bool,
    pub primary_key_columns: Vec<String>,
    /// Columns in table order.
    pub columns: Vec<AugmentedColumn>,
    pub transaction_uuid: Option<String>,
    pub transaction_xid: Option<i64>,
    /// Commit time in seconds.
    pub commit_timestamp: i64,
    pub transaction_sequence_number: i64,
    /// `commit_timestamp * 1000 + transaction_sequence_number`.
    ///
    /// Orders row versions by transaction. The scaling is kept for compatibility with
    /// existing targets, it is not a time in microseconds.
    pub version_timestamp: i64,
}

impl AugmentedRow {
    pub fn column(&self, name: &str) -> Option<&AugmentedColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Current value of a column: the before image for deletes, the after image otherwise.
    pub fn value(&self, name: &str) -> Option<&str> {
        let column = self.column(name)?;
        match self.event_type {
            RowEventType::Delete => column.before.as_deref(),
            RowEventType::Insert | RowEventType::Update => column.after.as_deref(),
        }
    }

    /// Current value of every primary key column, in key order.
    pub fn primary_key_values(&self) -> Vec<Option<&str>> {
        self.primary_key_columns
            .iter()
            .map(|name| self.value(name))
            .collect()
    }

    /// Source table name, which is `table_name` unless the row was remapped.
    pub fn source_table_name(&self) -> &str {
        self.original_table_name.as_deref().unwrap_or(&self.table_name)
    }

    /// Sets the commit metadata of a row emitted outside of any transaction.
    pub fn set_commit_time(&mut self, commit_timestamp: i64, sequence_number: i64) {
        self.commit_timestamp = commit_timestamp;
        self.transaction_sequence_number = sequence_number;
        self.version_timestamp = version_timestamp(commit_timestamp, sequence_number);
    }
}

impl TransactionStamp for AugmentedRow {
    fn stamp(&mut self, metadata: &TransactionMetadata) {
        self.transaction_uuid = metadata.identifier.clone();
        self.transaction_xid = Some(metadata.xid);
        self.set_commit_time(metadata.commit_timestamp, metadata.sequence_number);
    }
}

pub(crate) fn version_timestamp(commit_timestamp: i64, sequence_number: i64) -> i64 {
    commit_timestamp
        .saturating_mul(1000)
        .saturating_add(sequence_number)
}
