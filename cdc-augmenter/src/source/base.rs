use std::future::Future;

use cdc_mysql::types::Checkpoint;
use futures::Stream;

use crate::error::CdcResult;
use crate::types::RawEvent;

/// Trait for readers of the source replication log.
///
/// An [`EventSupplier`] connects to the source, decodes the binlog and hands out
/// [`RawEvent`]s in log order. It is started on every leadership take and stopped on
/// the matching loss, so implementations must support being restarted.
pub trait EventSupplier {
    type Stream: Stream<Item = CdcResult<RawEvent>> + Send + Unpin + 'static;

    /// Starts reading right after `checkpoint`, or from the current log end without one.
    fn start(
        &self,
        checkpoint: Option<Checkpoint>,
    ) -> impl Future<Output = CdcResult<Self::Stream>> + Send;

    /// Stops reading. The stream returned by the last `start` ends.
    fn stop(&self) -> impl Future<Output = CdcResult<()>> + Send;
}
