use std::fmt;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::bail;
use crate::destination::MutationSink;
use crate::error::{CdcResult, ErrorKind};
use crate::mutation::Mutation;
use crate::test_utils::notify::TimedNotify;

type MutationCondition = Box<dyn Fn(&[Mutation]) -> bool + Send + Sync>;

struct Inner<K> {
    wrapped_sink: K,
    mutations: Vec<Mutation>,
    conditions: Vec<(MutationCondition, Arc<Notify>)>,
    failing_writes: usize,
    write_calls: u64,
    shutdown_called: bool,
}

impl<K> Inner<K> {
    fn check_conditions(&mut self) {
        let mutations = &self.mutations;
        self.conditions.retain(|(condition, notify)| {
            let should_retain = !condition(mutations);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// Test wrapper for [`MutationSink`] implementations recording every delivered mutation.
///
/// Tests can wait until the delivered mutations satisfy a condition and make upcoming
/// writes fail before they reach the wrapped sink.
#[derive(Clone)]
pub struct TestSinkWrapper<K> {
    inner: Arc<RwLock<Inner<K>>>,
}

impl<K> fmt::Debug for TestSinkWrapper<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSinkWrapper").finish_non_exhaustive()
    }
}

impl<K> TestSinkWrapper<K> {
    pub fn wrap(sink: K) -> Self {
        let inner = Inner {
            wrapped_sink: sink,
            mutations: Vec::new(),
            conditions: Vec::new(),
            failing_writes: 0,
            write_calls: 0,
            shutdown_called: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Mutations of every successful write, in order.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.inner.read().await.mutations.clone()
    }

    /// Registers a notification fired once the delivered mutations satisfy `condition`.
    pub async fn notify_on_mutations<F>(&self, condition: F) -> TimedNotify
    where
        F: Fn(&[Mutation]) -> bool + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;
        inner.conditions.push((Box::new(condition), notify.clone()));

        // The condition may already hold.
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    pub async fn wait_for_mutations(&self, count: usize) -> TimedNotify {
        self.notify_on_mutations(move |mutations| mutations.len() >= count)
            .await
    }

    /// Makes the next `count` writes fail without reaching the wrapped sink.
    pub async fn fail_next_writes(&self, count: usize) {
        self.inner.write().await.failing_writes = count;
    }

    pub async fn write_calls(&self) -> u64 {
        self.inner.read().await.write_calls
    }

    pub async fn shutdown_called(&self) -> bool {
        self.inner.read().await.shutdown_called
    }
}

impl<K> MutationSink for TestSinkWrapper<K>
where
    K: MutationSink + Send + Sync + Clone,
{
    fn name() -> &'static str {
        "wrapper"
    }

    async fn write_mutations(&self, mutations: Vec<Mutation>) -> CdcResult<()> {
        let sink = {
            let mut inner = self.inner.write().await;
            inner.write_calls += 1;

            if inner.failing_writes > 0 {
                inner.failing_writes -= 1;
                bail!(ErrorKind::DestinationError, "Injected sink write failure");
            }

            inner.wrapped_sink.clone()
        };

        sink.write_mutations(mutations.clone()).await?;

        let mut inner = self.inner.write().await;
        inner.mutations.extend(mutations);
        inner.check_conditions();

        Ok(())
    }

    async fn shutdown(&self) -> CdcResult<()> {
        let sink = {
            let mut inner = self.inner.write().await;
            inner.shutdown_called = true;
            inner.wrapped_sink.clone()
        };

        sink.shutdown().await
    }
}
