//! Period-keyed cache with single-flight refresh and stale-while-revalidate
//! semantics. One entry per month key (cash-flow summaries) plus one
//! roster-wide entry, so cardinality is bounded and entries are never evicted,
//! only replaced.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};

use crate::error::IxcError;

/// How a read interacts with staleness.
///
/// `Cached` serves fresh values directly and stale values with a background
/// refresh. `ForceBackground` always kicks a refresh but never blocks
/// (`refresh=1` on the roster endpoint). `ForceBlocking` waits for a brand new
/// value (`refresh=1` on the period summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Cached,
    ForceBackground,
    ForceBlocking,
}

#[derive(Debug, Clone)]
pub struct Hit<T> {
    pub value: T,
    /// True when the returned value is stale and a refresh is in flight.
    pub syncing: bool,
}

type Slot<T> = Option<Result<T, Arc<IxcError>>>;

struct Entry<T> {
    value: Option<T>,
    updated_at: Option<Instant>,
    in_flight: Option<watch::Receiver<Slot<T>>>,
    last_error: Option<String>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            value: None,
            updated_at: None,
            in_flight: None,
            last_error: None,
        }
    }
}

pub struct SwrCache<T> {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, Entry<T>>>>,
}

impl<T> SwrCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read the entry for `key`, refreshing it via `compute` as dictated by
    /// `mode` and staleness. At most one computation runs per key; concurrent
    /// readers either share its result or are served the stale value.
    ///
    /// The check-and-set on the in-flight handle happens under the entry map
    /// lock, which keeps single-flight correct under parallel executors, not
    /// just cooperative scheduling.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        mode: ReadMode,
        compute: F,
    ) -> Result<Hit<T>, Arc<IxcError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, IxcError>> + Send + 'static,
    {
        let mut rx = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.to_string()).or_default();

            let fresh = entry.value.is_some()
                && entry.updated_at.is_some_and(|at| at.elapsed() <= self.ttl);

            if fresh && mode == ReadMode::Cached {
                let value = entry.value.clone().expect("fresh entry carries a value");
                return Ok(Hit {
                    value,
                    syncing: false,
                });
            }

            let rx = match entry.in_flight.clone() {
                Some(rx) => rx,
                None => self.spawn_refresh(entry, key, compute()),
            };

            if entry.value.is_some() && mode != ReadMode::ForceBlocking {
                let value = entry.value.clone().expect("stale entry carries a value");
                return Ok(Hit {
                    value,
                    syncing: true,
                });
            }
            rx
        };

        // EMPTY key or forced blocking refresh: wait for the in-flight
        // computation to publish its result.
        let result = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot
                .clone()
                .expect("guarded by wait_for")
                .map(|value| Hit {
                    value,
                    syncing: false,
                }),
            Err(_) => Err(Arc::new(IxcError::Internal(
                "refresh abortado antes de publicar resultado".to_string(),
            ))),
        };
        result
    }

    /// Message recorded by the most recent failed refresh of `key`, if any.
    pub async fn last_error(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|entry| entry.last_error.clone())
    }

    fn spawn_refresh<Fut>(
        &self,
        entry: &mut Entry<T>,
        key: &str,
        future: Fut,
    ) -> watch::Receiver<Slot<T>>
    where
        Fut: Future<Output = Result<T, IxcError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        entry.in_flight = Some(rx.clone());

        let entries = Arc::clone(&self.entries);
        let key = key.to_string();
        tokio::spawn(async move {
            let result = future.await.map_err(Arc::new);
            {
                let mut entries = entries.lock().await;
                if let Some(entry) = entries.get_mut(&key) {
                    match &result {
                        Ok(value) => {
                            entry.value = Some(value.clone());
                            entry.updated_at = Some(Instant::now());
                            entry.last_error = None;
                        }
                        Err(error) => {
                            entry.last_error = Some(error.to_string());
                        }
                    }
                    // The handle must be gone before any waiter resumes, so
                    // the next read can start a new computation.
                    entry.in_flight = None;
                }
            }
            if let Err(error) = &result {
                tracing::error!(key = %key, error = %error, "atualização de cache falhou");
            }
            let _ = tx.send(Some(result));
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn boom() -> IxcError {
        IxcError::Internal("boom".to_string())
    }

    #[tokio::test]
    async fn concurrent_reads_of_empty_key_trigger_one_computation() {
        let cache = Arc::new(SwrCache::<u64>::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch("2025-03", ReadMode::Cached, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(40)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            let hit = handle.await.expect("task").expect("fetch");
            assert_eq!(hit.value, 42);
            assert!(!hit.syncing);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_read_serves_old_value_and_refreshes_in_background() {
        let cache = SwrCache::<u64>::new(Duration::from_millis(200));
        cache
            .fetch("k", ReadMode::Cached, || async { Ok(1) })
            .await
            .expect("first fill");

        sleep(Duration::from_millis(250)).await;

        let hit = cache
            .fetch("k", ReadMode::Cached, || async {
                sleep(Duration::from_millis(30)).await;
                Ok(2)
            })
            .await
            .expect("stale read");
        assert_eq!(hit.value, 1);
        assert!(hit.syncing);

        sleep(Duration::from_millis(80)).await;
        let hit = cache
            .fetch("k", ReadMode::Cached, || async { Ok(3) })
            .await
            .expect("post-refresh read");
        assert_eq!(hit.value, 2);
        assert!(!hit.syncing);
    }

    #[tokio::test]
    async fn duplicate_trigger_is_suppressed_while_refresh_runs() {
        let cache = SwrCache::<u64>::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch("k", ReadMode::Cached, || async { Ok(1) })
            .await
            .expect("first fill");
        sleep(Duration::from_millis(80)).await;

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let hit = cache
                .fetch("k", ReadMode::Cached, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(60)).await;
                    Ok(2)
                })
                .await
                .expect("stale read");
            assert_eq!(hit.value, 1);
            assert!(hit.syncing);
        }
        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_background_refresh_keeps_value_and_records_error() {
        let cache = SwrCache::<u64>::new(Duration::from_millis(50));
        cache
            .fetch("k", ReadMode::Cached, || async { Ok(1) })
            .await
            .expect("first fill");
        sleep(Duration::from_millis(80)).await;

        let hit = cache
            .fetch("k", ReadMode::Cached, || async { Err(boom()) })
            .await
            .expect("stale read survives background failure");
        assert_eq!(hit.value, 1);
        assert!(hit.syncing);

        sleep(Duration::from_millis(30)).await;
        let recorded = cache.last_error("k").await.expect("error recorded");
        assert!(recorded.contains("boom"));

        // The key accepts a new trigger after the failure.
        let hit = cache
            .fetch("k", ReadMode::ForceBlocking, || async { Ok(5) })
            .await
            .expect("retry after failure");
        assert_eq!(hit.value, 5);
        assert!(cache.last_error("k").await.is_none());
    }

    #[tokio::test]
    async fn empty_key_propagates_failure_to_the_blocking_caller() {
        let cache = SwrCache::<u64>::new(Duration::from_secs(60));
        let error = cache
            .fetch("k", ReadMode::Cached, || async { Err(boom()) })
            .await
            .expect_err("foreground failure surfaces");
        assert!(error.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn force_blocking_waits_for_the_new_value() {
        let cache = SwrCache::<u64>::new(Duration::from_secs(60));
        cache
            .fetch("k", ReadMode::Cached, || async { Ok(1) })
            .await
            .expect("first fill");

        let hit = cache
            .fetch("k", ReadMode::ForceBlocking, || async { Ok(2) })
            .await
            .expect("forced refresh");
        assert_eq!(hit.value, 2);
        assert!(!hit.syncing);
    }

    #[tokio::test]
    async fn force_background_returns_current_value_as_syncing() {
        let cache = SwrCache::<u64>::new(Duration::from_secs(60));
        cache
            .fetch("k", ReadMode::Cached, || async { Ok(1) })
            .await
            .expect("first fill");

        let hit = cache
            .fetch("k", ReadMode::ForceBackground, || async {
                sleep(Duration::from_millis(30)).await;
                Ok(2)
            })
            .await
            .expect("forced background refresh");
        assert_eq!(hit.value, 1);
        assert!(hit.syncing);

        sleep(Duration::from_millis(70)).await;
        let hit = cache
            .fetch("k", ReadMode::Cached, || async { Ok(99) })
            .await
            .expect("read after refresh");
        assert_eq!(hit.value, 2);
    }
}
