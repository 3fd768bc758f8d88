use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cdc_config::shared::{CheckpointConfig, ReplicatorConfig, StartPositionConfig};
use cdc_mysql::types::{BinlogPosition, Checkpoint};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::augment::RowAugmenter;
use crate::cdc_error;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel, request_shutdown};
use crate::coordinator::{CheckpointStore, CoordinatorHandle, LeaderCoordinator, LeaderElection};
use crate::destination::MutationSink;
use crate::error::{CdcResult, ErrorKind};
use crate::mutation::MutationGenerator;
use crate::replication::{ApplyLoop, ApplyLoopResult};
use crate::schema::{SchemaCache, SchemaSource};
use crate::source::EventSupplier;
use crate::transaction::TransactionBuffer;
use crate::types::AugmentedRow;

/// The apply loop of the running leadership term.
#[derive(Debug)]
struct Term {
    shutdown_tx: ShutdownTx,
    apply_loop: JoinHandle<CdcResult<ApplyLoopResult>>,
}

/// Everything a leadership term is built from. Shared with the coordinator handlers.
#[derive(Debug)]
struct Components<S, P, K, C> {
    augmenter: RowAugmenter<S>,
    buffer: Arc<TransactionBuffer<AugmentedRow>>,
    generator: MutationGenerator,
    supplier: P,
    sink: K,
    checkpoints: C,
    checkpoint_config: CheckpointConfig,
    override_consumed: AtomicBool,
    coordinator: CoordinatorHandle,
    term: Mutex<Option<Term>>,
}

impl<S, P, K, C> Components<S, P, K, C>
where
    S: SchemaSource + Clone + Send + Sync + 'static,
    P: EventSupplier + Send + Sync + 'static,
    K: MutationSink + Clone + Send + Sync + 'static,
    C: CheckpointStore + Clone + Send + Sync + 'static,
{
    async fn take(&self) -> CdcResult<()> {
        let mut term = self.term.lock().await;
        if term.is_some() {
            return Err(cdc_error!(
                ErrorKind::InvalidState,
                "A leadership term is already running"
            ));
        }

        // Events of a transaction interrupted by the previous term are replayed.
        if self.buffer.started() {
            info!("rewinding transaction interrupted by the previous term");
            self.buffer.rewind();
        }

        let checkpoint = self.resolve_start().await?;
        match &checkpoint {
            Some(checkpoint) => info!(%checkpoint, "starting replication"),
            None => info!("starting replication from the end of the log"),
        }

        let events = self.supplier.start(checkpoint.clone()).await?;

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let apply_loop = ApplyLoop::new(
            self.augmenter.clone(),
            self.buffer.clone(),
            self.generator.clone(),
            self.sink.clone(),
            self.checkpoints.clone(),
            self.checkpoint_config.path.clone(),
            checkpoint,
            shutdown_rx,
        );

        let coordinator = self.coordinator.clone();
        let apply_loop = tokio::spawn(async move {
            let result = apply_loop.run(events).await;
            match &result {
                Ok(ApplyLoopResult::Stopped) => {}
                Ok(ApplyLoopResult::StreamEnded) => {
                    warn!("event stream ended while leading, relinquishing leadership");
                    coordinator.relinquish();
                }
                Err(err) => {
                    error!(error = %err, "apply loop failed, relinquishing leadership");
                    coordinator.relinquish();
                }
            }

            result
        });

        *term = Some(Term {
            shutdown_tx,
            apply_loop,
        });

        Ok(())
    }

    async fn loss(&self) -> CdcResult<()> {
        let Some(term) = self.term.lock().await.take() else {
            return Ok(());
        };

        request_shutdown(&term.shutdown_tx);
        let result = term.apply_loop.await;

        if let Err(err) = self.supplier.stop().await {
            warn!(error = %err, "failed to stop the event supplier");
        }

        match result {
            Ok(Ok(result)) => {
                info!(?result, "apply loop stopped");

                Ok(())
            }
            // Already reported by the loop, the next term replays from the checkpoint.
            Ok(Err(_)) => Ok(()),
            Err(err) => Err(cdc_error!(
                ErrorKind::ApplyWorkerPanic,
                "The apply loop panicked",
                source: err
            )),
        }
    }

    /// The override applies to the first term only, later terms resume from the store.
    async fn resolve_start(&self) -> CdcResult<Option<Checkpoint>> {
        if let Some(start) = &self.checkpoint_config.start_override
            && !self.override_consumed.swap(true, Ordering::SeqCst)
        {
            info!("starting from the configured override position");

            return Ok(Some(start_checkpoint(start)));
        }

        if let Some(checkpoint) = self.checkpoints.load(&self.checkpoint_config.path).await? {
            return Ok(Some(checkpoint));
        }

        Ok(self.checkpoint_config.default.as_ref().map(start_checkpoint))
    }
}

fn start_checkpoint(start: &StartPositionConfig) -> Checkpoint {
    Checkpoint {
        binlog: start
            .binlog
            .as_ref()
            .map(|binlog| BinlogPosition::new(binlog.filename.clone(), binlog.position)),
        gtid_set: start.gtid_set.clone(),
        ..Checkpoint::default()
    }
}

/// Replicates the source into the sink while this instance holds leadership.
///
/// Each leadership term resolves its start checkpoint, starts the supplier and runs an
/// [`ApplyLoop`] until the term ends. The schema cache and the transaction buffer
/// outlive terms.
#[derive(Debug)]
pub struct Pipeline<E, S, P, K, C> {
    coordinator: LeaderCoordinator<E, C>,
    components: Arc<Components<S, P, K, C>>,
}

impl<E, S, P, K, C> Pipeline<E, S, P, K, C>
where
    E: LeaderElection + Send + Sync + 'static,
    S: SchemaSource + Clone + Send + Sync + 'static,
    P: EventSupplier + Send + Sync + 'static,
    K: MutationSink + Clone + Send + Sync + 'static,
    C: CheckpointStore + Clone + Send + Sync + 'static,
{
    pub fn new(
        config: &ReplicatorConfig,
        election: E,
        schema_source: S,
        supplier: P,
        sink: K,
        checkpoints: C,
    ) -> Self {
        let mut coordinator =
            LeaderCoordinator::new(election, checkpoints.clone(), &config.coordinator);

        let components = Arc::new(Components {
            augmenter: RowAugmenter::new(
                SchemaCache::new(schema_source),
                config.payload_table.clone(),
            ),
            buffer: Arc::new(TransactionBuffer::new(&config.transaction)),
            generator: MutationGenerator::new(config.mutation.clone()),
            supplier,
            sink,
            checkpoints,
            checkpoint_config: config.checkpoint.clone(),
            override_consumed: AtomicBool::new(false),
            coordinator: coordinator.handle(),
            term: Mutex::new(None),
        });

        let take = components.clone();
        coordinator.on_leadership_take(move || {
            let components = take.clone();
            async move { components.take().await }
        });
        let loss = components.clone();
        coordinator.on_leadership_loss(move || {
            let components = loss.clone();
            async move { components.loss().await }
        });

        Self {
            coordinator,
            components,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.coordinator.handle()
    }

    pub fn schema_cache(&self) -> &SchemaCache<S> {
        self.components.augmenter.schema_cache()
    }

    pub fn start(&mut self) -> CdcResult<()> {
        info!(
            checkpoint_path = %self.components.checkpoint_config.path,
            sink = K::name(),
            "starting pipeline"
        );

        self.coordinator.start()
    }

    /// Ends the running term, if any, and stops campaigning.
    pub fn shutdown(&self) {
        info!("shutting down the pipeline");

        self.coordinator.stop();
    }

    /// Waits for the coordinator to finish, then shuts the sink down.
    pub async fn wait(mut self) -> CdcResult<()> {
        let mut errors = Vec::new();

        if let Err(err) = self.coordinator.join().await {
            errors.push(err);
        }

        if let Err(err) = self.components.sink.shutdown().await {
            error!(error = %err, "failed to shut down the sink");
            errors.push(err);
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        info!("pipeline stopped");

        Ok(())
    }

    pub async fn shutdown_and_wait(self) -> CdcResult<()> {
        self.shutdown();
        self.wait().await
    }
}
