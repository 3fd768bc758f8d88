use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cdc_augmenter::coordinator::{
    FileCheckpointStore, LeaderCoordinator, LeaderGroup, LeadershipState, MemoryCheckpointStore,
    MemoryLeaderElection,
};
use cdc_augmenter::test_utils::logging::init_test_tracing;
use cdc_config::shared::{CoordinatorConfig, LeaderElectionConfig};
use cdc_mysql::types::{BinlogPosition, Checkpoint};

fn config() -> CoordinatorConfig {
    CoordinatorConfig {
        election: LeaderElectionConfig::Memory,
        retry_interval_ms: 10,
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    max_active: AtomicUsize,
    takes: AtomicUsize,
}

fn coordinator(
    group: &LeaderGroup,
    counters: &Arc<Counters>,
) -> LeaderCoordinator<MemoryLeaderElection, MemoryCheckpointStore> {
    let mut coordinator =
        LeaderCoordinator::new(group.member(), MemoryCheckpointStore::new(), &config());

    let take = counters.clone();
    coordinator.on_leadership_take(move || {
        let counters = take.clone();
        async move {
            let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            counters.max_active.fetch_max(active, Ordering::SeqCst);
            counters.takes.fetch_add(1, Ordering::SeqCst);
            // Keeps the handler running long enough for overlaps to show.
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        }
    });
    let loss = counters.clone();
    coordinator.on_leadership_loss(move || {
        let counters = loss.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            counters.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    });

    coordinator
}

#[tokio::test(flavor = "multi_thread")]
async fn at_most_one_leader_across_handovers() {
    init_test_tracing();
    let group = LeaderGroup::new();
    let counters = Arc::new(Counters::default());

    let mut coordinators: Vec<_> = (0..3).map(|_| coordinator(&group, &counters)).collect();
    for coordinator in coordinators.iter_mut() {
        coordinator.start().unwrap();
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        while counters.takes.load(Ordering::SeqCst) < 10 {
            if let Some(leader) = coordinators.iter().find(|c| c.is_leader()) {
                leader.relinquish();
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();

    for coordinator in &coordinators {
        coordinator.stop();
    }
    for coordinator in coordinators.iter_mut() {
        coordinator.join().await.unwrap();
        assert_eq!(coordinator.state(), LeadershipState::Follower);
    }

    assert_eq!(counters.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    assert_eq!(group.leader(), None);
}

#[tokio::test]
async fn file_checkpoints_survive_a_new_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = Checkpoint {
        timestamp: 1_700_000_000,
        server_id: 3,
        gtid: Some("uuid:42".to_string()),
        binlog: Some(BinlogPosition::new("mysql-bin.000003", 1_024)),
        gtid_set: None,
        transaction_sequence_number: 2,
    };

    let first = LeaderCoordinator::new(
        LeaderGroup::new().member(),
        FileCheckpointStore::new(dir.path()),
        &config(),
    );
    first
        .save_checkpoint("replicator/checkpoint.json", &checkpoint)
        .await
        .unwrap();
    drop(first);

    let second = LeaderCoordinator::new(
        LeaderGroup::new().member(),
        FileCheckpointStore::new(dir.path()),
        &config(),
    );
    assert_eq!(
        second.load_checkpoint("replicator/checkpoint.json").await.unwrap(),
        Some(checkpoint)
    );
    assert!(second.load_checkpoint("missing.json").await.unwrap().is_none());
}
