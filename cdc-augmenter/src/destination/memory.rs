use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::MutationSink;
use crate::error::CdcResult;
use crate::mutation::Mutation;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<Mutation>>,
}

/// Keeps every written batch in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches in write order.
    pub async fn batches(&self) -> Vec<Vec<Mutation>> {
        self.inner.lock().await.batches.clone()
    }

    /// All mutations in write order.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.inner.lock().await.batches.concat()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.batches.clear();
    }
}

impl MutationSink for MemorySink {
    fn name() -> &'static str {
        "memory"
    }

    async fn write_mutations(&self, mutations: Vec<Mutation>) -> CdcResult<()> {
        info!(mutations = mutations.len(), "writing mutations");

        self.inner.lock().await.batches.push(mutations);

        Ok(())
    }
}
