use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{now_millis, MediaHandler};

/// Blobs younger than this are never eligible for reclamation.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Background reclamation of unused blobs.
///
/// Started once at process scope; shares nothing with request handlers
/// beyond the media handler capability itself.
pub struct GarbageCollector;

/// Handle to a running collector. Dropping it also stops the collector:
/// once the stop channel's sender is gone the loop exits. Call
/// [`GcHandle::stop`] to additionally wait for the task to finish.
pub struct GcHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GarbageCollector {
    /// Spawn the collection loop: every `period`, reclaim up to `block`
    /// blobs older than [`RETENTION_WINDOW`].
    ///
    /// A failed run is logged and abandoned; the next tick is the only
    /// retry. The first run happens one full period after spawn.
    pub fn spawn(handler: Arc<dyn MediaHandler>, period: Duration, block: usize) -> GcHandle {
        let (stop, mut stopped) = watch::channel(false);
        let retention =
            TimeDelta::try_seconds(RETENTION_WINDOW.as_secs() as i64).unwrap_or(TimeDelta::zero());

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; swallow it so
            // the first run lands one period out.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff = now_millis() - retention;
                        match handler.delete_unused(cutoff, block).await {
                            Ok(0) => debug!("media gc: nothing to reclaim"),
                            Ok(count) => debug!(count, "media gc: reclaimed blobs"),
                            Err(err) => warn!(error = %err, "media gc failed"),
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });

        GcHandle { stop, task }
    }
}

impl GcHandle {
    /// Signal the collector and wait for its loop to exit.
    ///
    /// A run already in progress finishes; no new run starts afterwards.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    /// Whether the collection loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ByteStream, FileDescriptor, MediaError, MediaResult, OpenedMedia,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingStore {
        cutoffs: Mutex<Vec<(DateTime<Utc>, usize)>>,
        fail: bool,
    }

    #[async_trait]
    impl MediaHandler for CountingStore {
        async fn redirect(&self, _reference: &str) -> MediaResult<Option<String>> {
            Ok(None)
        }

        async fn upload(
            &self,
            _descriptor: &FileDescriptor,
            _content: ByteStream,
        ) -> MediaResult<String> {
            Err(MediaError::Unsupported)
        }

        async fn download(&self, _reference: &str) -> MediaResult<OpenedMedia> {
            Err(MediaError::Unsupported)
        }

        async fn delete_unused(
            &self,
            older_than: DateTime<Utc>,
            limit: usize,
        ) -> MediaResult<usize> {
            self.cutoffs.lock().unwrap().push((older_than, limit));
            if self.fail {
                Err(MediaError::invalid("boom"))
            } else {
                Ok(0)
            }
        }
    }

    impl CountingStore {
        fn runs(&self) -> usize {
            self.cutoffs.lock().unwrap().len()
        }
    }

    const PERIOD: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn ticks_reclaim_with_retention_cutoff_and_stop_halts_the_loop() {
        let store = Arc::new(CountingStore::default());
        let handle = GarbageCollector::spawn(store.clone(), PERIOD, 42);
        tokio::task::yield_now().await;

        for _ in 0..3 {
            tokio::time::advance(PERIOD).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(store.runs(), 3);

        let retention =
            TimeDelta::try_seconds(RETENTION_WINDOW.as_secs() as i64).unwrap();
        for (cutoff, limit) in store.cutoffs.lock().unwrap().iter() {
            assert!(*cutoff <= now_millis() - retention);
            assert_eq!(*limit, 42);
        }

        handle.stop().await;
        let runs_at_stop = store.runs();
        for _ in 0..5 {
            tokio::time::advance(PERIOD).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(store.runs(), runs_at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick_means_no_runs() {
        let store = Arc::new(CountingStore::default());
        let handle = GarbageCollector::spawn(store.clone(), PERIOD, 10);
        tokio::task::yield_now().await;

        handle.stop().await;
        for _ in 0..3 {
            tokio::time::advance(PERIOD).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(store.runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_collector() {
        let store = Arc::new(CountingStore::default());
        let handle = GarbageCollector::spawn(store.clone(), PERIOD, 10);
        tokio::task::yield_now().await;

        tokio::time::advance(PERIOD).await;
        tokio::task::yield_now().await;
        assert_eq!(store.runs(), 1);

        drop(handle);
        tokio::task::yield_now().await;
        for _ in 0..3 {
            tokio::time::advance(PERIOD).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(store.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_does_not_kill_the_loop() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..Default::default()
        });
        let handle = GarbageCollector::spawn(store.clone(), PERIOD, 10);
        tokio::task::yield_now().await;

        for _ in 0..2 {
            tokio::time::advance(PERIOD).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(store.runs(), 2);
        assert!(!handle.is_stopped());
        handle.stop().await;
    }
}
