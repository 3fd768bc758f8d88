use cdc_config::shared::{BufferKind, TransactionBufferConfig};
use parking_lot::Mutex;

use crate::transaction::EventBuffer;

/// Metadata shared by every event of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionMetadata {
    /// GTID of the transaction, or a generated UUID when the source has no GTIDs.
    pub identifier: Option<String>,
    pub xid: i64,
    pub commit_timestamp: i64,
    pub sequence_number: i64,
}

/// Items that receive transaction metadata when drained from a [`TransactionBuffer`].
pub trait TransactionStamp {
    fn stamp(&mut self, metadata: &TransactionMetadata);
}

#[derive(Debug)]
struct TransactionState<T> {
    started: bool,
    resuming: bool,
    buffer: Option<EventBuffer<T>>,
    metadata: TransactionMetadata,
}

/// Accumulates the events of the open transaction until its commit.
///
/// Commit time and xid are only known once the commit event is read, so events are
/// held back and stamped together in [`TransactionBuffer::get_and_clear`]. All state
/// lives under one lock so combinations such as "buffer exists iff a transaction is
/// open, resuming or awaiting drain" are never observed half-updated.
///
/// A single owner drives `begin`/`add`/`commit`. Other actors may drain, rewind or
/// inspect the buffer concurrently. Misuse (duplicate begin, commit or add outside a
/// transaction) reports `false` and leaves the state untouched.
#[derive(Debug)]
pub struct TransactionBuffer<T> {
    state: Mutex<TransactionState<T>>,
    kind: BufferKind,
    size_limit: usize,
}

impl<T> TransactionBuffer<T>
where
    T: TransactionStamp,
{
    pub fn new(config: &TransactionBufferConfig) -> Self {
        Self {
            state: Mutex::new(TransactionState {
                started: false,
                resuming: false,
                buffer: None,
                metadata: TransactionMetadata::default(),
            }),
            kind: config.kind,
            size_limit: config.size_limit,
        }
    }

    /// Opens a transaction. Returns `false` if one is already open.
    ///
    /// Outside of a resume the buffer is replaced and the pending commit metadata is
    /// zeroed. While resuming both are kept so replayed events end up with the metadata
    /// of the interrupted transaction.
    pub fn begin(&self) -> bool {
        let mut state = self.state.lock();
        if state.started {
            return false;
        }

        state.started = true;
        if !state.resuming {
            state.buffer = Some(EventBuffer::new(self.kind));
            state.metadata.xid = 0;
            state.metadata.commit_timestamp = 0;
            state.metadata.sequence_number = 0;
        }

        true
    }

    /// Appends `item` to the open transaction.
    ///
    /// Hands `item` back when no transaction is open or the buffer reached its size
    /// limit. A full buffer is the backpressure signal that triggers a forced flush,
    /// not an error.
    pub fn add(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if !state.started {
            return Err(item);
        }

        let size_limit = self.size_limit;
        match state.buffer.as_mut() {
            Some(buffer) if buffer.len() < size_limit => {
                buffer.push(item);
                Ok(())
            }
            _ => Err(item),
        }
    }

    /// Closes the open transaction and records its commit metadata.
    ///
    /// `xid` defaults to `0` for transactions without one. Returns whether a transaction
    /// was actually open, which filters out `COMMIT` statements outside of a transaction.
    pub fn commit(&self, xid: Option<i64>, commit_timestamp: i64, sequence_number: i64) -> bool {
        let mut state = self.state.lock();
        if !state.started {
            return false;
        }

        state.started = false;
        state.resuming = false;
        state.metadata.xid = xid.unwrap_or(0);
        state.metadata.commit_timestamp = commit_timestamp;
        state.metadata.sequence_number = sequence_number;

        true
    }

    /// Takes the buffered events, stamped with the current commit metadata.
    ///
    /// The buffer is replaced by an empty one while resuming and removed otherwise.
    /// Returns `None` when there is no buffer.
    pub fn get_and_clear(&self) -> Option<Vec<T>> {
        let (buffer, metadata) = {
            let mut state = self.state.lock();
            let replacement = state.resuming.then(|| EventBuffer::new(self.kind));
            let buffer = std::mem::replace(&mut state.buffer, replacement)?;

            (buffer, state.metadata.clone())
        };

        let mut items = buffer.into_vec();
        for item in items.iter_mut() {
            item.stamp(&metadata);
        }

        Some(items)
    }

    /// Marks the transaction as resuming and allocates a fresh buffer.
    ///
    /// Used when a drained transaction failed downstream, so its events can be added
    /// again and re-emitted with the metadata recorded by the last commit.
    pub fn rewind(&self) {
        let mut state = self.state.lock();
        state.resuming = true;
        state.buffer = Some(EventBuffer::new(self.kind));
    }

    /// A transaction was committed and awaits [`TransactionBuffer::get_and_clear`].
    pub fn marked_for_commit(&self) -> bool {
        let state = self.state.lock();
        !state.started && !state.resuming && state.buffer.is_some()
    }

    pub fn size_limit_exceeded(&self) -> bool {
        let state = self.state.lock();
        state
            .buffer
            .as_ref()
            .is_some_and(|buffer| buffer.len() >= self.size_limit)
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.buffer.as_ref().map(EventBuffer::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn started(&self) -> bool {
        self.state.lock().started
    }

    pub fn resuming(&self) -> bool {
        self.state.lock().resuming
    }

    pub fn identifier(&self) -> Option<String> {
        self.state.lock().metadata.identifier.clone()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) {
        self.state.lock().metadata.identifier = Some(identifier.into());
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }
}
