use std::sync::Arc;

use cdc_mysql::types::Checkpoint;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::augment::RowAugmenter;
use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, shutdown_requested};
use crate::coordinator::CheckpointStore;
use crate::destination::MutationSink;
use crate::error::{CdcResult, ErrorKind};
use crate::mutation::{Mutation, MutationGenerator};
use crate::schema::SchemaSource;
use crate::schema::ddl::QueryKind;
use crate::transaction::TransactionBuffer;
use crate::types::{AugmentedRow, EventHeader, RawChangeEvent, RawEvent, RawEventData};

/// Why the apply loop returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyLoopResult {
    /// Shutdown was requested. An open transaction is abandoned and replayed from the
    /// last checkpoint by the next run.
    Stopped,
    /// The event stream ended.
    StreamEnded,
}

#[derive(Debug)]
struct ApplyLoopState {
    /// Last persisted or pending position, updated by every event. Its timestamp
    /// and sequence number are those of the last counted commit.
    checkpoint: Checkpoint,
    /// A GTID was announced and not yet consumed by a `BEGIN`.
    gtid_pending: bool,
}

impl ApplyLoopState {
    fn new(start: Option<Checkpoint>) -> Self {
        Self {
            checkpoint: start.unwrap_or_default(),
            gtid_pending: false,
        }
    }

    /// Ordinal of a transaction among those committed in the same second.
    fn next_sequence_number(&mut self, commit_timestamp: i64) -> i64 {
        let checkpoint = &mut self.checkpoint;
        if commit_timestamp == checkpoint.timestamp {
            checkpoint.transaction_sequence_number += 1;
        } else {
            checkpoint.timestamp = commit_timestamp;
            checkpoint.transaction_sequence_number = 0;
        }

        checkpoint.transaction_sequence_number
    }

    /// Moves the position past `header`. Commit second and ordinal are left alone.
    fn advance(&mut self, header: &EventHeader) {
        self.checkpoint.server_id = header.server_id;
        self.checkpoint.binlog = Some(header.position.clone());
        // The executed set is not tracked past the start position.
        self.checkpoint.gtid_set = None;
    }
}

/// Single owner of the transaction buffer, turning raw events into emitted mutations.
///
/// Row events are augmented and buffered until their transaction commits. On commit
/// the buffer is drained, every row is converted and the batch handed to the sink.
/// Only then is the checkpoint advanced, so a failure at any step replays the
/// transaction from the previous checkpoint.
#[derive(Debug)]
pub struct ApplyLoop<S, K, C> {
    augmenter: RowAugmenter<S>,
    buffer: Arc<TransactionBuffer<AugmentedRow>>,
    generator: MutationGenerator,
    sink: K,
    checkpoints: C,
    checkpoint_path: String,
    shutdown_rx: ShutdownRx,
    state: ApplyLoopState,
}

impl<S, K, C> ApplyLoop<S, K, C>
where
    S: SchemaSource + Send + Sync,
    K: MutationSink + Send + Sync,
    C: CheckpointStore + Send + Sync,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        augmenter: RowAugmenter<S>,
        buffer: Arc<TransactionBuffer<AugmentedRow>>,
        generator: MutationGenerator,
        sink: K,
        checkpoints: C,
        checkpoint_path: impl Into<String>,
        start: Option<Checkpoint>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            augmenter,
            buffer,
            generator,
            sink,
            checkpoints,
            checkpoint_path: checkpoint_path.into(),
            shutdown_rx,
            state: ApplyLoopState::new(start),
        }
    }

    /// Processes `events` until shutdown is requested or the stream ends.
    pub async fn run<E>(mut self, mut events: E) -> CdcResult<ApplyLoopResult>
    where
        E: Stream<Item = CdcResult<RawEvent>> + Unpin,
    {
        info!(checkpoint = %self.state.checkpoint, "starting apply loop");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(&mut self.shutdown_rx) => {
                    if self.buffer.started() {
                        info!(
                            buffered = self.buffer.len(),
                            "shutting down apply loop inside a transaction, it will be replayed"
                        );
                    } else {
                        info!("shutting down apply loop");
                    }

                    return Ok(ApplyLoopResult::Stopped);
                }

                event = events.next() => {
                    let Some(event) = event else {
                        info!("event stream ended");

                        return Ok(ApplyLoopResult::StreamEnded);
                    };

                    self.handle_event(event?).await?;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: RawEvent) -> CdcResult<()> {
        let RawEvent { header, data } = event;

        match data {
            RawEventData::Gtid { gtid } => {
                self.buffer.set_identifier(gtid.clone());
                self.state.checkpoint.gtid = Some(gtid);
                self.state.gtid_pending = true;
            }
            RawEventData::Query { database, sql } => {
                self.handle_query(&header, &database, &sql).await?;
            }
            RawEventData::Xid { xid } => {
                self.handle_commit(&header, Some(xid)).await?;
            }
            RawEventData::Rows(change) => {
                self.handle_rows(&header, change).await?;
            }
        }

        Ok(())
    }

    async fn handle_query(&mut self, header: &EventHeader, database: &str, sql: &str) -> CdcResult<()> {
        let kind = QueryKind::classify(database, sql);

        match kind {
            QueryKind::Begin => {
                // A resumed transaction keeps the identifier it was first seen with.
                if !self.state.gtid_pending && !self.buffer.resuming() {
                    self.buffer.set_identifier(Uuid::new_v4().to_string());
                }
                self.state.gtid_pending = false;

                if !self.buffer.begin() {
                    debug!("transaction already open, ignoring BEGIN");
                }
            }
            // Changes of non-transactional tables are in the binlog even when rolled back.
            QueryKind::Commit | QueryKind::Rollback => {
                self.handle_commit(header, None).await?;
            }
            _ if kind.is_schema_change() => {
                self.augmenter
                    .schema_cache()
                    .execute_ddl(database, kind.affected_tables(), sql)
                    .await;
                self.advance_outside_transaction(header).await?;
            }
            _ => {
                debug!(?kind, "ignoring statement");
            }
        }

        Ok(())
    }

    async fn handle_commit(&mut self, header: &EventHeader, xid: Option<i64>) -> CdcResult<()> {
        if !self.buffer.started() {
            debug!(?xid, "commit outside of a transaction, ignoring");

            return Ok(());
        }

        let sequence_number = self.state.next_sequence_number(header.timestamp);
        self.buffer.commit(xid, header.timestamp, sequence_number);
        self.flush().await?;

        self.state.advance(header);
        self.save_checkpoint().await
    }

    async fn handle_rows(&mut self, header: &EventHeader, change: RawChangeEvent) -> CdcResult<()> {
        let Some(mut row) = self.augmenter.apply(&change).await else {
            return Ok(());
        };

        if !self.buffer.started() {
            let sequence_number = self.state.next_sequence_number(header.timestamp);
            row.set_commit_time(header.timestamp, sequence_number);
            self.emit(vec![row]).await?;

            self.state.advance(header);
            return self.save_checkpoint().await;
        }

        let Err(row) = self.buffer.add(row) else {
            return Ok(());
        };

        // The transaction outgrew the buffer. Its first part is emitted now, without
        // moving the checkpoint, so a failure replays the transaction as a whole.
        info!(
            size_limit = self.buffer.size_limit(),
            "transaction exceeds the buffer size limit, flushing early"
        );

        let sequence_number = self.state.next_sequence_number(header.timestamp);
        self.buffer.commit(None, header.timestamp, sequence_number);
        self.flush().await?;

        self.buffer.begin();
        if self.buffer.add(row).is_err() {
            bail!(
                ErrorKind::InvalidState,
                "The transaction buffer rejected a row after being flushed"
            );
        }

        Ok(())
    }

    /// Drains the committed transaction and emits it. A failed write rewinds the buffer
    /// so the transaction is replayed with the identifier it had.
    async fn flush(&mut self) -> CdcResult<()> {
        let rows = self.buffer.get_and_clear().unwrap_or_default();
        if let Err(err) = self.emit(rows).await {
            warn!(error = %err, "failed to emit transaction, rewinding it");
            self.buffer.rewind();

            return Err(err);
        }

        Ok(())
    }

    /// Converts `rows` and writes them to the sink.
    async fn emit(&self, rows: Vec<AugmentedRow>) -> CdcResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut mutations: Vec<Mutation> = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.generator.generate(row) {
                Ok(mutation) => mutations.push(mutation),
                Err(err) => {
                    warn!(
                        schema = %row.schema_name,
                        table = %row.table_name,
                        error = %err,
                        "failed to generate mutation, skipping row"
                    );
                }
            }
        }

        self.sink.write_mutations(mutations).await
    }

    async fn advance_outside_transaction(&mut self, header: &EventHeader) -> CdcResult<()> {
        if self.buffer.started() {
            return Ok(());
        }

        self.state.advance(header);
        self.save_checkpoint().await
    }

    async fn save_checkpoint(&self) -> CdcResult<()> {
        self.checkpoints
            .save(&self.checkpoint_path, &self.state.checkpoint)
            .await
    }
}
