//! Scheduler implementation.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::load::{LoadProbe, SystemLoadProbe};

/// The load-aware batch scheduler.
pub struct LoadAwareScheduler {
    config: SchedulerConfig,
    probe: Arc<dyn LoadProbe>,
    cancel: CancellationToken,
}

impl LoadAwareScheduler {
    /// Creates a scheduler sampling the host system.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_probe(config, Arc::new(SystemLoadProbe))
    }

    /// Creates a scheduler with a custom load probe.
    pub fn with_probe(config: SchedulerConfig, probe: Arc<dyn LoadProbe>) -> Self {
        Self {
            config,
            probe,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token. The load backoff wait observes it;
    /// cancellation between rounds is the caller's responsibility.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the adaptive policy: derive a worker count from a fresh load
    /// sample, partition, dispatch, and aggregate.
    ///
    /// An empty work list yields an empty result immediately, with nothing
    /// spawned. The call does not return until every dispatched worker has
    /// reported and fully exited.
    pub async fn run<T, K, V, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
    ) -> Result<HashMap<K, V>, SchedulerError>
    where
        T: Send + 'static,
        K: Eq + Hash + Send + 'static,
        V: Send + 'static,
        F: Fn(Vec<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HashMap<K, V>> + Send + 'static,
    {
        self.validate()?;
        if items.is_empty() {
            return Ok(HashMap::new());
        }

        let worker_count = self.derive_worker_count().await?;
        info!(
            "dispatching {} item(s) across {} worker(s)",
            items.len(),
            worker_count
        );
        self.dispatch(items, worker_count, worker).await
    }

    /// Runs the fixed-concurrency policy: a static worker count over small
    /// sequential sub-batches, no load sampling.
    pub async fn run_fixed<T, K, V, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
    ) -> Result<HashMap<K, V>, SchedulerError>
    where
        T: Send + 'static,
        K: Eq + Hash + Send + 'static,
        V: Send + 'static,
        F: Fn(Vec<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HashMap<K, V>> + Send + 'static,
    {
        self.validate()?;
        if items.is_empty() {
            return Ok(HashMap::new());
        }

        let mut aggregate = HashMap::new();
        let mut items = items;
        while !items.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            let rest = items.split_off(items.len().min(self.config.fixed_chunk));
            let batch = std::mem::replace(&mut items, rest);
            let worker_count = self.config.fixed_concurrency.min(batch.len());
            debug!(
                "fixed policy: sub-batch of {} item(s), {} worker(s)",
                batch.len(),
                worker_count
            );
            let partial = self.dispatch(batch, worker_count, worker.clone()).await?;
            aggregate.extend(partial);
        }
        Ok(aggregate)
    }

    /// Samples load until the host has capacity, then derives the count.
    ///
    /// While the load average saturates the core count the scheduler blocks
    /// and re-samples on an interval rather than spawning at an unsafe
    /// count; the wait is interruptible through the cancellation token.
    async fn derive_worker_count(&self) -> Result<usize, SchedulerError> {
        loop {
            let sample = self.probe.sample();
            if !sample.is_saturated() {
                let available = sample.available_capacity();
                let count = ((available as f64) * self.config.load_fraction).floor() as usize;
                // Never zero workers while there is work to do.
                return Ok(count.max(1));
            }
            warn!(
                "load average {:.2} saturates {} core(s); waiting {}s before re-sampling",
                sample.load_one, sample.cores, self.config.load_poll_interval_secs
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(SchedulerError::Cancelled),
                _ = sleep(Duration::from_secs(self.config.load_poll_interval_secs)) => {}
            }
        }
    }

    /// Partitions, spawns, drains the completion channel, and joins.
    async fn dispatch<T, K, V, F, Fut>(
        &self,
        items: Vec<T>,
        worker_count: usize,
        worker: F,
    ) -> Result<HashMap<K, V>, SchedulerError>
    where
        T: Send + 'static,
        K: Eq + Hash + Send + 'static,
        V: Send + 'static,
        F: Fn(Vec<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HashMap<K, V>> + Send + 'static,
    {
        let slices = partition(items, worker_count);
        let (tx, mut rx) = mpsc::channel(worker_count.max(1));

        let mut handles = Vec::new();
        let mut spawned = Vec::new();
        for (idx, slice) in slices.into_iter().enumerate() {
            // An empty slice is legal; its worker would exit immediately
            // with an empty result, so it is not spawned at all.
            if slice.is_empty() {
                continue;
            }
            let tx = tx.clone();
            let worker = worker.clone();
            spawned.push(idx);
            handles.push(tokio::spawn(async move {
                let partial = worker(slice).await;
                let _ = tx.send((idx, partial)).await;
            }));
        }
        drop(tx);

        // Completion barrier: exactly one report per spawned worker, the
        // whole drain bounded so a crashed worker cannot hang the round.
        let mut aggregate = HashMap::new();
        let mut reported = Vec::new();
        let drain = async {
            while reported.len() < spawned.len() {
                match rx.recv().await {
                    Some((idx, partial)) => {
                        reported.push(idx);
                        aggregate.extend(partial);
                    }
                    None => break,
                }
            }
        };

        if timeout(Duration::from_secs(self.config.drain_timeout_secs), drain)
            .await
            .is_err()
        {
            for handle in &handles {
                handle.abort();
            }
            return Err(SchedulerError::BarrierTimeout {
                missing: missing_slices(&spawned, &reported),
            });
        }

        if reported.len() < spawned.len() {
            return Err(SchedulerError::WorkerLost {
                missing: missing_slices(&spawned, &reported),
            });
        }

        // Wait for every worker to have fully exited, not just reported.
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("worker task ended abnormally after reporting: {e}");
            }
        }

        Ok(aggregate)
    }

    /// Fails fast on caller configuration errors, before anything spawns.
    fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.config.load_fraction > 0.0 && self.config.load_fraction <= 1.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "load_fraction must be in (0, 1], got {}",
                self.config.load_fraction
            )));
        }
        if self.config.fixed_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "fixed_concurrency must be at least 1".to_string(),
            ));
        }
        if self.config.fixed_chunk == 0 {
            return Err(SchedulerError::InvalidConfig(
                "fixed_chunk must be at least 1".to_string(),
            ));
        }
        if self.config.drain_timeout_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "drain_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits items into `worker_count` contiguous slices of equal size; the
/// trailing slices may be smaller or empty.
fn partition<T>(items: Vec<T>, worker_count: usize) -> Vec<Vec<T>> {
    let slice_len = items.len().div_ceil(worker_count);
    let mut slices: Vec<Vec<T>> = Vec::with_capacity(worker_count);
    let mut items = items.into_iter();
    for _ in 0..worker_count {
        slices.push(items.by_ref().take(slice_len).collect());
    }
    slices
}

fn missing_slices(spawned: &[usize], reported: &[usize]) -> Vec<usize> {
    spawned
        .iter()
        .copied()
        .filter(|idx| !reported.contains(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::LoadSample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Probe replaying a scripted sequence of samples; the last one repeats.
    struct ScriptedProbe {
        samples: Mutex<Vec<LoadSample>>,
        taken: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(samples: Vec<(f64, usize)>) -> Self {
            Self {
                samples: Mutex::new(
                    samples
                        .into_iter()
                        .map(|(load_one, cores)| LoadSample { load_one, cores })
                        .collect(),
                ),
                taken: AtomicUsize::new(0),
            }
        }

        fn samples_taken(&self) -> usize {
            self.taken.load(Ordering::SeqCst)
        }
    }

    impl LoadProbe for ScriptedProbe {
        fn sample(&self) -> LoadSample {
            self.taken.fetch_add(1, Ordering::SeqCst);
            let mut samples = self.samples.lock().unwrap();
            if samples.len() > 1 {
                samples.remove(0)
            } else {
                samples[0]
            }
        }
    }

    fn idle_scheduler() -> LoadAwareScheduler {
        LoadAwareScheduler::with_probe(
            SchedulerConfig::default(),
            Arc::new(ScriptedProbe::new(vec![(0.0, 8)])),
        )
    }

    fn echo_worker(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(Vec<u32>) -> std::pin::Pin<Box<dyn Future<Output = HashMap<u32, u32>> + Send>>
           + Clone
           + Send
           + Sync {
        move |slice: Vec<u32>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { slice.into_iter().map(|n| (n, n * 2)).collect() })
        }
    }

    #[test]
    fn test_partition_equal_slices() {
        let slices = partition((0..10).collect::<Vec<_>>(), 3);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0], vec![0, 1, 2, 3]);
        assert_eq!(slices[1], vec![4, 5, 6, 7]);
        assert_eq!(slices[2], vec![8, 9]);
    }

    #[test]
    fn test_partition_allows_empty_trailing_slices() {
        let slices = partition(vec![1, 2], 4);
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[0], vec![1]);
        assert_eq!(slices[1], vec![2]);
        assert!(slices[2].is_empty());
        assert!(slices[3].is_empty());
    }

    #[tokio::test]
    async fn test_empty_work_list_spawns_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = idle_scheduler()
            .run(Vec::<u32>::new(), echo_worker(Arc::clone(&calls)))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partition_invariant_result_is_disjoint_union() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..100).collect();
        let result = idle_scheduler()
            .run(items.clone(), echo_worker(Arc::clone(&calls)))
            .await
            .unwrap();

        // Key set equals the input set, once each.
        assert_eq!(result.len(), items.len());
        for n in items {
            assert_eq!(result.get(&n), Some(&(n * 2)));
        }
        // An idle 8-core host at fraction 0.4 takes 3 workers.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_worker_count_floors_to_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        // 4 cores at load 2.9: not saturated, but floor(1 * 0.4) = 0.
        let scheduler = LoadAwareScheduler::with_probe(
            SchedulerConfig::default(),
            Arc::new(ScriptedProbe::new(vec![(2.9, 4)])),
        );
        let result = scheduler
            .run((0..10).collect(), echo_worker(Arc::clone(&calls)))
            .await
            .unwrap();
        assert_eq!(result.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_saturated_load_blocks_then_resamples() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Arc::new(ScriptedProbe::new(vec![
            (7.5, 8), // saturated: 7.5 >= 7
            (7.0, 8), // still saturated
            (1.0, 8), // capacity freed
        ]));
        let config = SchedulerConfig {
            load_poll_interval_secs: 0,
            ..Default::default()
        };
        let scheduler = LoadAwareScheduler::with_probe(config, Arc::clone(&probe) as Arc<dyn LoadProbe>);

        let result = scheduler
            .run((0..20).collect(), echo_worker(Arc::clone(&calls)))
            .await
            .unwrap();

        assert_eq!(result.len(), 20);
        assert_eq!(probe.samples_taken(), 3);
        // Fresh sample: cores 8 - ceil(1.0) = 7 available, floor(7 * 0.4) = 2.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let probe = Arc::new(ScriptedProbe::new(vec![(7.5, 8)]));
        let config = SchedulerConfig {
            load_poll_interval_secs: 3600,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let scheduler = LoadAwareScheduler::with_probe(config, probe)
            .with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move {
            scheduler
                .run((0..4).collect(), |slice: Vec<u32>| async move {
                    slice.into_iter().map(|n| (n, n)).collect::<HashMap<_, _>>()
                })
                .await
        });
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SchedulerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_barrier_timeout_names_missing_slice() {
        let config = SchedulerConfig {
            drain_timeout_secs: 1,
            ..Default::default()
        };
        let scheduler = LoadAwareScheduler::with_probe(
            config,
            Arc::new(ScriptedProbe::new(vec![(0.0, 8)])),
        );

        // The slice containing item 0 never reports.
        let result = scheduler
            .run((0..9).collect(), |slice: Vec<u32>| async move {
                if slice.contains(&0) {
                    sleep(Duration::from_secs(3600)).await;
                }
                slice.into_iter().map(|n| (n, n)).collect::<HashMap<_, _>>()
            })
            .await;

        match result {
            Err(SchedulerError::BarrierTimeout { missing }) => assert_eq!(missing, vec![0]),
            other => panic!("expected BarrierTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_panic_does_not_hang() {
        let scheduler = idle_scheduler();
        let result = scheduler
            .run((0..9).collect(), |slice: Vec<u32>| async move {
                if slice.contains(&0) {
                    panic!("worker crash");
                }
                slice.into_iter().map(|n| (n, n)).collect::<HashMap<_, _>>()
            })
            .await;

        match result {
            Err(SchedulerError::WorkerLost { missing }) => assert_eq!(missing, vec![0]),
            other => panic!("expected WorkerLost, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fixed_policy_sub_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = SchedulerConfig {
            fixed_concurrency: 2,
            fixed_chunk: 25,
            ..Default::default()
        };
        let scheduler = LoadAwareScheduler::with_probe(
            config,
            Arc::new(ScriptedProbe::new(vec![(0.0, 8)])),
        );

        let items: Vec<u32> = (0..60).collect();
        let result = scheduler
            .run_fixed(items, echo_worker(Arc::clone(&calls)))
            .await
            .unwrap();

        assert_eq!(result.len(), 60);
        // Sub-batches of 25, 25, 10, each split across 2 workers.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_spawn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = SchedulerConfig {
            load_fraction: 0.0,
            ..Default::default()
        };
        let scheduler = LoadAwareScheduler::with_probe(
            config,
            Arc::new(ScriptedProbe::new(vec![(0.0, 8)])),
        );
        let result = scheduler
            .run((0..4).collect(), echo_worker(Arc::clone(&calls)))
            .await;
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
