use std::future::Future;

use crate::error::CdcResult;
use crate::mutation::Mutation;

/// Trait for stores that receive the mutations of committed transactions.
///
/// A batch holds the mutations of one transaction, or of one part of it when an
/// oversized transaction is flushed early. Batches may be delivered again after a
/// failure or a leadership handover, with identical row keys and cell timestamps, so
/// implementations are expected to apply them idempotently.
pub trait MutationSink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Writes a batch of mutations. The batch counts as delivered once this returns `Ok`.
    fn write_mutations(&self, mutations: Vec<Mutation>) -> impl Future<Output = CdcResult<()>> + Send;

    /// Called when the pipeline stops writing to this sink. No-op by default.
    fn shutdown(&self) -> impl Future<Output = CdcResult<()>> + Send {
        async { Ok(()) }
    }
}
