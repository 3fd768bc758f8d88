mod checkpoint;
mod table;
mod time;

pub use checkpoint::{BinlogPosition, Checkpoint};
pub use table::{ColumnKey, ColumnSchema, DataType, TableName, TableSchema, parse_member_list};
pub use time::{DATE_FORMAT, DATETIME_FORMAT, TIME_FORMAT};
