//! Periodic reconciliation against the remote store
//!
//! Approximates live sync without a push channel: every interval the remote
//! collection is pulled and merged into the engine's view when its id set
//! changed. Ticks that land while the consuming surface is hidden are
//! skipped, but the timer keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::{RefreshOutcome, RefreshSource, SyncEngine};

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shared visibility flag of the consuming surface
#[derive(Debug, Clone)]
pub struct Visibility(Arc<AtomicBool>);

impl Visibility {
    pub fn new(visible: bool) -> Self {
        Self(Arc::new(AtomicBool::new(visible)))
    }

    pub fn set_visible(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }

    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Counters collected over the lifetime of a polling loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub skipped_hidden: u64,
    pub replaced: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl PollStats {
    fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Replaced => self.replaced += 1,
            RefreshOutcome::Unchanged => self.unchanged += 1,
            RefreshOutcome::Offline => self.failed += 1,
        }
    }
}

pub struct PollingReconciler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    visibility: Visibility,
}

impl PollingReconciler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            visibility: Visibility::default(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.clone()
    }

    /// Run a single tick. Returns `None` when skipped because hidden.
    pub async fn poll_once(&self) -> Option<RefreshOutcome> {
        if !self.visibility.is_visible() {
            debug!("Surface hidden, skipping poll");
            return None;
        }
        Some(self.engine.reconcile(RefreshSource::Poll).await)
    }

    /// Start the loop on the runtime. The first poll happens one interval
    /// from now.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let visibility = self.visibility.clone();
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            visibility,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> PollStats {
        info!("Polling remote store every {:?}", self.interval);
        let mut stats = PollStats::default();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    stats.ticks += 1;
                    match self.poll_once().await {
                        Some(outcome) => stats.record(outcome),
                        None => stats.skipped_hidden += 1,
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("Shutting down polling reconciler");
                    break;
                }
            }
        }

        stats
    }
}

/// Control handle for a spawned [`PollingReconciler`]
pub struct PollerHandle {
    visibility: Visibility,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<PollStats>,
}

impl PollerHandle {
    pub fn set_visible(&self, visible: bool) {
        self.visibility.set_visible(visible);
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.clone()
    }

    /// Stop the loop and return its counters
    pub async fn shutdown(mut self) -> PollStats {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await.unwrap_or_default()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::clip::Clip;
    use crate::notify::NullSink;
    use crate::remote::{MockRemoteStore, RemoteError};

    fn engine(mock: MockRemoteStore) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            Arc::new(mock),
            LocalCache::in_memory(),
            Arc::new(NullSink),
        ))
    }

    fn remote_clip(id: &str) -> Clip {
        Clip {
            id: id.to_string(),
            content: id.to_string(),
            note: None,
            created_at: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_once_per_interval() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list()
            .times(3)
            .returning(|| Ok(vec![remote_clip("a")]));

        let handle = PollingReconciler::new(engine(mock), Duration::from_secs(10)).spawn();
        tokio::time::sleep(Duration::from_secs(35)).await;
        let stats = handle.shutdown().await;

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.unchanged, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_surface_skips_but_timer_keeps_running() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list().times(1).returning(|| Ok(vec![]));

        let handle = PollingReconciler::new(engine(mock), Duration::from_secs(10))
            .with_visibility(Visibility::new(false))
            .spawn();
        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.set_visible(true);
        tokio::time::sleep(Duration::from_secs(10)).await;
        let stats = handle.shutdown().await;

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.skipped_hidden, 2);
        assert_eq!(stats.unchanged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_are_counted_not_raised() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list()
            .returning(|| Err(RemoteError::Status(500)));

        let engine = engine(mock);
        let handle = PollingReconciler::new(Arc::clone(&engine), Duration::from_secs(10)).spawn();
        tokio::time::sleep(Duration::from_secs(21)).await;
        let stats = handle.shutdown().await;

        assert_eq!(stats.failed, 2);
        assert!(engine.view().await.is_empty());
    }

    #[tokio::test]
    async fn test_poll_once_respects_visibility() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list().never();
        let poller = PollingReconciler::new(engine(mock), DEFAULT_POLL_INTERVAL)
            .with_visibility(Visibility::new(false));
        assert_eq!(poller.poll_once().await, None);
    }
}
