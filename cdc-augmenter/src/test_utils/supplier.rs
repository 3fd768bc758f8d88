use std::sync::Arc;

use cdc_mysql::types::{BinlogPosition, Checkpoint};
use futures::channel::mpsc;
use parking_lot::Mutex;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::source::EventSupplier;
use crate::types::RawEvent;

#[derive(Debug, Default)]
struct Inner {
    log: Vec<RawEvent>,
    sender: Option<mpsc::UnboundedSender<CdcResult<RawEvent>>>,
    starts: Vec<Option<Checkpoint>>,
    failing_starts: usize,
}

/// [`EventSupplier`] replaying an in-memory binlog.
///
/// Pushed events are appended to the log and forwarded to the running stream. A start
/// first replays every logged event after the checkpoint position, or the whole log
/// without a checkpoint, like a restarted binlog client.
#[derive(Debug, Clone, Default)]
pub struct MemorySupplier {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RawEvent) {
        let mut inner = self.inner.lock();
        if let Some(sender) = &inner.sender {
            let _ = sender.unbounded_send(Ok(event.clone()));
        }
        inner.log.push(event);
    }

    pub fn push_all(&self, events: impl IntoIterator<Item = RawEvent>) {
        for event in events {
            self.push(event);
        }
    }

    /// Sends an error on the running stream.
    pub fn fail_stream(&self, kind: ErrorKind, description: &'static str) {
        if let Some(sender) = &self.inner.lock().sender {
            let _ = sender.unbounded_send(Err(crate::cdc_error!(kind, description)));
        }
    }

    pub fn fail_next_starts(&self, count: usize) {
        self.inner.lock().failing_starts = count;
    }

    /// Checkpoints of every start, in order.
    pub fn starts(&self) -> Vec<Option<Checkpoint>> {
        self.inner.lock().starts.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().sender.is_some()
    }
}

fn is_after(event: &RawEvent, position: &BinlogPosition) -> bool {
    let event = &event.header.position;

    (event.filename.as_str(), event.position) > (position.filename.as_str(), position.position)
}

impl EventSupplier for MemorySupplier {
    type Stream = mpsc::UnboundedReceiver<CdcResult<RawEvent>>;

    async fn start(&self, checkpoint: Option<Checkpoint>) -> CdcResult<Self::Stream> {
        let mut inner = self.inner.lock();
        inner.starts.push(checkpoint.clone());

        if inner.failing_starts > 0 {
            inner.failing_starts -= 1;
            bail!(ErrorKind::SourceConnectionFailed, "Injected supplier start failure");
        }

        let (sender, receiver) = mpsc::unbounded();
        let start = checkpoint.and_then(|checkpoint| checkpoint.binlog);
        for event in &inner.log {
            let replay = match &start {
                Some(position) => is_after(event, position),
                None => true,
            };
            if replay {
                let _ = sender.unbounded_send(Ok(event.clone()));
            }
        }
        inner.sender = Some(sender);

        Ok(receiver)
    }

    async fn stop(&self) -> CdcResult<()> {
        self.inner.lock().sender = None;

        Ok(())
    }
}
