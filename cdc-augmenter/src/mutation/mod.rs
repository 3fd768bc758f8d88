mod generator;

pub use generator::{MutationGenerator, NULL_VALUE, ROW_STATUS};

/// One versioned value written to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub family: String,
    pub qualifier: String,
    pub timestamp: i64,
    pub value: String,
}

/// All cells written for one row event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub table: String,
    pub row_key: String,
    pub cells: Vec<Cell>,
    pub source_row_uri: Option<String>,
    pub target_row_uri: Option<String>,
    pub transaction_uuid: Option<String>,
}

impl Mutation {
    pub fn cell(&self, qualifier: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.qualifier == qualifier)
    }
}
