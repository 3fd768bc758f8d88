use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Container backing the events of the open transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    /// Contiguous growable vector.
    #[default]
    Vec,
    /// Ring buffer, cheaper to recycle when transactions vary widely in size.
    Deque,
}

/// Transaction buffering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TransactionBufferConfig {
    #[serde(default)]
    pub kind: BufferKind,
    /// Maximum number of rows held for one transaction before a forced flush.
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,
}

impl TransactionBufferConfig {
    pub const DEFAULT_SIZE_LIMIT: usize = 1000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.size_limit == 0 {
            return Err(ValidationError::invalid(
                "transaction.size_limit",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for TransactionBufferConfig {
    fn default() -> Self {
        Self {
            kind: BufferKind::default(),
            size_limit: default_size_limit(),
        }
    }
}

fn default_size_limit() -> usize {
    TransactionBufferConfig::DEFAULT_SIZE_LIMIT
}
