use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cdc_config::shared::CoordinatorConfig;
use cdc_mysql::types::Checkpoint;
use futures::FutureExt;
use futures::future::BoxFuture;
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::cdc_error;
use crate::concurrency::shutdown::{
    ShutdownRx, ShutdownTx, create_shutdown_channel, request_shutdown, shutdown_requested,
};
use crate::coordinator::{CheckpointStore, LeaderElection};
use crate::error::{CdcError, CdcResult, ErrorKind};

type Handler = Arc<dyn Fn() -> BoxFuture<'static, CdcResult<()>> + Send + Sync>;

/// Leadership as seen by the registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipState {
    Follower,
    Leader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    Take,
    Loss,
}

struct Transition {
    kind: TransitionKind,
    ack: oneshot::Sender<CdcResult<()>>,
}

/// Why a leadership term ended.
#[derive(Debug)]
enum TermEnd {
    Shutdown,
    Lost,
    Relinquished,
}

#[derive(Clone)]
struct Handlers {
    take: Handler,
    loss: Handler,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            take: Arc::new(|| async { Ok::<_, CdcError>(()) }.boxed()),
            loss: Arc::new(|| async { Ok::<_, CdcError>(()) }.boxed()),
        }
    }
}

/// Cloneable access to a running [`LeaderCoordinator`] from inside its handlers.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    relinquish_tx: Arc<watch::Sender<()>>,
    state_rx: watch::Receiver<LeadershipState>,
}

impl CoordinatorHandle {
    /// Ends the current term. Another member may take over before this one campaigns again.
    pub fn relinquish(&self) {
        self.relinquish_tx.send_replace(());
    }

    pub fn state(&self) -> LeadershipState {
        *self.state_rx.borrow()
    }

    pub fn is_leader(&self) -> bool {
        self.state() == LeadershipState::Leader
    }

    /// Waits until the handlers reached `state`.
    pub async fn wait_for(&self, state: LeadershipState) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx.wait_for(|current| *current == state).await;
    }
}

#[derive(Debug)]
struct Tasks {
    election: JoinHandle<CdcResult<()>>,
    dispatcher: JoinHandle<CdcResult<()>>,
}

/// Runs the registered handlers as this instance gains and loses leadership.
///
/// An election task campaigns through `E` and reports transitions to a single
/// dispatcher task, which owns the [`LeadershipState`]. Take and loss handlers thus
/// alternate, starting with a take, and never run concurrently. The election task
/// waits for each handler to finish before moving on, so the lease is only released
/// once the loss handler is done.
#[derive(Debug)]
pub struct LeaderCoordinator<E, C> {
    election: Option<E>,
    checkpoints: C,
    retry_interval: Duration,
    handlers: Handlers,
    shutdown_tx: ShutdownTx,
    relinquish_tx: Arc<watch::Sender<()>>,
    state_tx: Arc<watch::Sender<LeadershipState>>,
    tasks: Option<Tasks>,
}

impl<E, C> LeaderCoordinator<E, C>
where
    E: LeaderElection + Send + Sync + 'static,
    C: CheckpointStore + Send + Sync,
{
    pub fn new(election: E, checkpoints: C, config: &CoordinatorConfig) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();
        let (relinquish_tx, _) = watch::channel(());
        let (state_tx, _) = watch::channel(LeadershipState::Follower);

        Self {
            election: Some(election),
            checkpoints,
            retry_interval: config.retry_interval(),
            handlers: Handlers::default(),
            shutdown_tx,
            relinquish_tx: Arc::new(relinquish_tx),
            state_tx: Arc::new(state_tx),
            tasks: None,
        }
    }

    /// Registers the handler run when leadership is taken. Replaces any previous one.
    ///
    /// An error from the handler ends the term: the loss handler runs for teardown and
    /// the lease is released.
    pub fn on_leadership_take<F, Fut>(&mut self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CdcResult<()>> + Send + 'static,
    {
        self.handlers.take = Arc::new(move || handler().boxed());
    }

    /// Registers the handler run when leadership is lost. Replaces any previous one.
    pub fn on_leadership_loss<F, Fut>(&mut self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CdcResult<()>> + Send + 'static,
    {
        self.handlers.loss = Arc::new(move || handler().boxed());
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            relinquish_tx: self.relinquish_tx.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> LeadershipState {
        *self.state_tx.borrow()
    }

    pub fn is_leader(&self) -> bool {
        self.state() == LeadershipState::Leader
    }

    pub fn checkpoint_store(&self) -> &C {
        &self.checkpoints
    }

    /// Spawns the election and dispatcher tasks. Can only be called once.
    pub fn start(&mut self) -> CdcResult<()> {
        let Some(election) = self.election.take() else {
            bail!(
                ErrorKind::InvalidState,
                "The coordinator was already started"
            );
        };

        info!("starting leader coordinator");

        let (transitions_tx, transitions_rx) = mpsc::channel(1);
        let dispatcher = tokio::spawn(dispatch(
            transitions_rx,
            self.handlers.clone(),
            self.state_tx.clone(),
        ));
        let election = tokio::spawn(campaign(
            election,
            transitions_tx,
            self.shutdown_tx.subscribe(),
            self.relinquish_tx.clone(),
            self.retry_interval,
        ));

        self.tasks = Some(Tasks {
            election,
            dispatcher,
        });

        Ok(())
    }

    /// Asks the current term to end. See [`CoordinatorHandle::relinquish`].
    pub fn relinquish(&self) {
        self.relinquish_tx.send_replace(());
    }

    /// Signals both tasks to stop. A running term ends with the loss handler.
    pub fn stop(&self) {
        info!("stopping leader coordinator");

        request_shutdown(&self.shutdown_tx);
    }

    /// Waits for both tasks to finish, returning every error they produced.
    pub async fn join(&mut self) -> CdcResult<()> {
        let Some(tasks) = self.tasks.take() else {
            return Ok(());
        };

        let mut errors = Vec::new();
        for (name, task) in [("election", tasks.election), ("dispatcher", tasks.dispatcher)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(err) => {
                    error!(task = name, error = %err, "coordinator task panicked");
                    errors.push(cdc_error!(
                        ErrorKind::CoordinatorPanic,
                        "A coordinator task panicked",
                        name,
                        source: err
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    pub async fn save_checkpoint(&self, path: &str, checkpoint: &Checkpoint) -> CdcResult<()> {
        self.checkpoints.save(path, checkpoint).await
    }

    pub async fn load_checkpoint(&self, path: &str) -> CdcResult<Option<Checkpoint>> {
        self.checkpoints.load(path).await
    }
}

/// Owns the leadership state and runs handlers for valid transitions only.
async fn dispatch(
    mut transitions_rx: mpsc::Receiver<Transition>,
    handlers: Handlers,
    state_tx: Arc<watch::Sender<LeadershipState>>,
) -> CdcResult<()> {
    let mut state = LeadershipState::Follower;

    while let Some(Transition { kind, ack }) = transitions_rx.recv().await {
        let result = match (state, kind) {
            (LeadershipState::Follower, TransitionKind::Take) => {
                info!("leadership taken, running take handler");
                state = LeadershipState::Leader;
                let result = (handlers.take)().await;
                state_tx.send_replace(state);

                result
            }
            (LeadershipState::Leader, TransitionKind::Loss) => {
                info!("leadership lost, running loss handler");
                let result = (handlers.loss)().await;
                state = LeadershipState::Follower;
                state_tx.send_replace(state);

                result
            }
            (state, kind) => {
                warn!(?state, ?kind, "ignoring out of order leadership transition");

                Ok(())
            }
        };

        // The election task only goes away on shutdown, dropping the ack is fine then.
        let _ = ack.send(result);
    }

    debug!("leadership dispatcher finished");

    Ok(())
}

/// Reports `kind` to the dispatcher and waits for its handler to finish.
async fn transition(
    transitions_tx: &mpsc::Sender<Transition>,
    kind: TransitionKind,
) -> CdcResult<()> {
    let (ack, ack_rx) = oneshot::channel();
    if transitions_tx.send(Transition { kind, ack }).await.is_err() {
        bail!(
            ErrorKind::InvalidState,
            "The leadership dispatcher stopped unexpectedly"
        );
    }

    match ack_rx.await {
        Ok(result) => result,
        Err(_) => Err(cdc_error!(
            ErrorKind::CoordinatorPanic,
            "The leadership dispatcher dropped a transition"
        )),
    }
}

async fn campaign<E>(
    election: E,
    transitions_tx: mpsc::Sender<Transition>,
    mut shutdown_rx: ShutdownRx,
    relinquish_tx: Arc<watch::Sender<()>>,
    retry_interval: Duration,
) -> CdcResult<()>
where
    E: LeaderElection + Send + Sync + 'static,
{
    let mut errors: Vec<CdcError> = Vec::new();

    loop {
        let acquired = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown_rx) => break,
            acquired = election.acquire() => acquired,
        };
        if let Err(err) = acquired {
            warn!(error = %err, "leader election failed, retrying");
            if wait_before_retry(&mut shutdown_rx, retry_interval).await {
                break;
            }
            continue;
        }

        // Requests made before this term started must not end it.
        let mut relinquish_rx = relinquish_tx.subscribe();

        if let Err(err) = transition(&transitions_tx, TransitionKind::Take).await {
            error!(error = %err, "take handler failed, giving up leadership");
            if let Err(err) = transition(&transitions_tx, TransitionKind::Loss).await {
                error!(error = %err, "loss handler failed");
            }
            release(&election).await;

            if wait_before_retry(&mut shutdown_rx, retry_interval).await {
                break;
            }
            continue;
        }

        let end = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown_rx) => TermEnd::Shutdown,
            _ = relinquish_rx.changed() => TermEnd::Relinquished,
            lost = election.lost() => {
                if let Err(err) = lost {
                    warn!(error = %err, "failed to watch the leadership lease");
                }
                TermEnd::Lost
            }
        };

        info!(?end, "leadership term ended");

        if let Err(err) = transition(&transitions_tx, TransitionKind::Loss).await {
            error!(error = %err, "loss handler failed");
            if matches!(end, TermEnd::Shutdown) {
                errors.push(err);
            }
        }
        release(&election).await;

        match end {
            TermEnd::Shutdown => break,
            TermEnd::Relinquished => {
                if wait_before_retry(&mut shutdown_rx, retry_interval).await {
                    break;
                }
            }
            TermEnd::Lost => {}
        }
    }

    debug!("leader election task finished");

    if !errors.is_empty() {
        return Err(errors.into());
    }

    Ok(())
}

async fn release<E>(election: &E)
where
    E: LeaderElection,
{
    if let Err(err) = election.release().await {
        warn!(error = %err, "failed to release leadership");
    }
}

/// Sleeps for about `retry_interval`. Returns `true` if shutdown was requested meanwhile.
async fn wait_before_retry(shutdown_rx: &mut ShutdownRx, retry_interval: Duration) -> bool {
    let jitter = rand::thread_rng().gen_range(0..=retry_interval.as_millis() as u64 / 10);
    let delay = retry_interval + Duration::from_millis(jitter);

    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown_rx) => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cdc_config::shared::LeaderElectionConfig;

    use super::*;
    use crate::coordinator::{LeaderGroup, MemoryCheckpointStore};

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            election: LeaderElectionConfig::Memory,
            retry_interval_ms: 20,
        }
    }

    #[tokio::test]
    async fn test_take_then_loss_on_stop() {
        let group = LeaderGroup::new();
        let takes = Arc::new(AtomicUsize::new(0));
        let losses = Arc::new(AtomicUsize::new(0));

        let mut coordinator =
            LeaderCoordinator::new(group.member(), MemoryCheckpointStore::new(), &config());
        coordinator.on_leadership_take({
            let takes = takes.clone();
            move || {
                let takes = takes.clone();
                async move {
                    takes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        });
        coordinator.on_leadership_loss({
            let losses = losses.clone();
            move || {
                let losses = losses.clone();
                async move {
                    losses.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        });

        coordinator.start().unwrap();
        assert!(coordinator.start().is_err());
        let handle = coordinator.handle();
        tokio::time::timeout(Duration::from_secs(1), handle.wait_for(LeadershipState::Leader))
            .await
            .unwrap();

        coordinator.stop();
        coordinator.join().await.unwrap();

        assert_eq!(takes.load(Ordering::SeqCst), 1);
        assert_eq!(losses.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_leader());
        assert_eq!(group.leader(), None);
    }

    #[tokio::test]
    async fn test_failed_take_tears_down_and_retries() {
        let group = LeaderGroup::new();
        let takes = Arc::new(AtomicUsize::new(0));
        let losses = Arc::new(AtomicUsize::new(0));

        let mut coordinator =
            LeaderCoordinator::new(group.member(), MemoryCheckpointStore::new(), &config());
        coordinator.on_leadership_take({
            let takes = takes.clone();
            move || {
                let takes = takes.clone();
                async move {
                    if takes.fetch_add(1, Ordering::SeqCst) == 0 {
                        bail!(ErrorKind::SourceConnectionFailed, "Source is not reachable");
                    }
                    Ok(())
                }
            }
        });
        coordinator.on_leadership_loss({
            let losses = losses.clone();
            move || {
                let losses = losses.clone();
                async move {
                    losses.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        });

        coordinator.start().unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while takes.load(Ordering::SeqCst) < 2 || !coordinator.is_leader() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(losses.load(Ordering::SeqCst), 1);

        coordinator.stop();
        coordinator.join().await.unwrap();
        assert_eq!(losses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_relinquish_hands_over_to_peer() {
        let group = LeaderGroup::new();
        let first_member = group.member();
        let first_id = first_member.id();

        let mut first = LeaderCoordinator::new(first_member, MemoryCheckpointStore::new(), &config());
        first.start().unwrap();
        tokio::time::timeout(Duration::from_secs(1), first.handle().wait_for(LeadershipState::Leader))
            .await
            .unwrap();
        assert_eq!(group.leader(), Some(first_id));

        let mut second = LeaderCoordinator::new(group.member(), MemoryCheckpointStore::new(), &config());
        second.start().unwrap();
        first.relinquish();

        tokio::time::timeout(Duration::from_secs(1), second.handle().wait_for(LeadershipState::Leader))
            .await
            .unwrap();
        assert!(!first.is_leader());

        first.stop();
        second.stop();
        first.join().await.unwrap();
        second.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_checkpoints_delegate_to_store() {
        let store = MemoryCheckpointStore::new();
        let coordinator = LeaderCoordinator::new(LeaderGroup::new().member(), store.clone(), &config());
        let checkpoint = Checkpoint::from_gtid_set("uuid:1-5");

        assert!(coordinator.load_checkpoint("cp").await.unwrap().is_none());
        coordinator.save_checkpoint("cp", &checkpoint).await.unwrap();

        assert_eq!(store.get("cp"), Some(checkpoint.clone()));
        assert_eq!(coordinator.load_checkpoint("cp").await.unwrap(), Some(checkpoint));
    }
}
