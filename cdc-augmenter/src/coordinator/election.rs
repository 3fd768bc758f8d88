use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::CdcResult;

/// Mutual exclusion between replicator instances.
///
/// At most one member of an election holds the lease at any time. Calls are made by a
/// single task, in the order `acquire`, `lost`, `release`.
pub trait LeaderElection {
    /// Campaigns until this member holds the lease.
    fn acquire(&self) -> impl Future<Output = CdcResult<()>> + Send;

    /// Resolves once the lease obtained by the last `acquire` is no longer held.
    fn lost(&self) -> impl Future<Output = CdcResult<()>> + Send;

    /// Gives the lease up if it is still held.
    fn release(&self) -> impl Future<Output = CdcResult<()>> + Send;
}

pub type MemberId = u64;

#[derive(Debug, Default)]
struct GroupState {
    leader: Option<MemberId>,
    next_member: MemberId,
}

/// In-process election group. One [`MemoryLeaderElection`] per member.
#[derive(Debug, Clone)]
pub struct LeaderGroup {
    state: Arc<Mutex<GroupState>>,
    leader_tx: Arc<watch::Sender<Option<MemberId>>>,
}

impl LeaderGroup {
    pub fn new() -> Self {
        let (leader_tx, _) = watch::channel(None);

        Self {
            state: Arc::new(Mutex::new(GroupState::default())),
            leader_tx: Arc::new(leader_tx),
        }
    }

    pub fn member(&self) -> MemoryLeaderElection {
        let id = {
            let mut state = self.state.lock();
            state.next_member += 1;
            state.next_member
        };

        MemoryLeaderElection {
            id,
            group: self.clone(),
        }
    }

    pub fn leader(&self) -> Option<MemberId> {
        self.state.lock().leader
    }

    /// Takes the lease away from the current leader, as an expired session would.
    pub fn revoke(&self) -> Option<MemberId> {
        let revoked = self.state.lock().leader.take();
        self.leader_tx.send_replace(None);

        debug!(?revoked, "revoked leadership");

        revoked
    }

    fn try_acquire(&self, id: MemberId) -> bool {
        let mut state = self.state.lock();
        if state.leader.is_some() {
            return false;
        }

        state.leader = Some(id);
        self.leader_tx.send_replace(Some(id));

        true
    }

    fn release(&self, id: MemberId) {
        let mut state = self.state.lock();
        if state.leader == Some(id) {
            state.leader = None;
            self.leader_tx.send_replace(None);
        }
    }
}

impl Default for LeaderGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Member of a [`LeaderGroup`].
#[derive(Debug, Clone)]
pub struct MemoryLeaderElection {
    id: MemberId,
    group: LeaderGroup,
}

impl MemoryLeaderElection {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn group(&self) -> &LeaderGroup {
        &self.group
    }
}

impl LeaderElection for MemoryLeaderElection {
    async fn acquire(&self) -> CdcResult<()> {
        loop {
            // Subscribing before the attempt makes a release racing with it wake us up.
            let mut leader_rx = self.group.leader_tx.subscribe();
            if self.group.try_acquire(self.id) {
                return Ok(());
            }

            let _ = leader_rx.changed().await;
        }
    }

    async fn lost(&self) -> CdcResult<()> {
        loop {
            let mut leader_rx = self.group.leader_tx.subscribe();
            if self.group.leader() != Some(self.id) {
                return Ok(());
            }

            let _ = leader_rx.changed().await;
        }
    }

    async fn release(&self) -> CdcResult<()> {
        self.group.release(self.id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_single_leader_and_handover() {
        let group = LeaderGroup::new();
        let first = group.member();
        let second = group.member();

        first.acquire().await.unwrap();
        assert_eq!(group.leader(), Some(first.id()));

        let waiting = tokio::spawn({
            let second = second.clone();
            async move { second.acquire().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        first.release().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(group.leader(), Some(second.id()));
    }

    #[tokio::test]
    async fn test_revoke_resolves_lost() {
        let group = LeaderGroup::new();
        let member = group.member();
        member.acquire().await.unwrap();

        let lost = tokio::spawn({
            let member = member.clone();
            async move { member.lost().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!lost.is_finished());

        assert_eq!(group.revoke(), Some(member.id()));
        tokio::time::timeout(Duration::from_secs(1), lost)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(group.leader(), None);
    }
}
