//! Bulk processor worker pool.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::errors::ElasticError;
use crate::interfaces::BulkExecutor;
use crate::retry::retry_transient;
use crate::types::{BulkItem, BulkSummary};

const DEFAULT_BULK_ACTIONS: usize = 1000;
const DEFAULT_BULK_SIZE: usize = 5 * 1024 * 1024;

/// Hooks around every batch commit.
///
/// `execution_id` is unique per processor and increases with every commit.
pub trait BulkListener: Send + Sync {
    fn before_commit(&self, _execution_id: u64, _items: &[BulkItem]) {}

    fn after_commit(
        &self,
        _execution_id: u64,
        _items: &[BulkItem],
        _result: &Result<BulkSummary, ElasticError>,
    ) {
    }
}

/// Configuration for a `BulkProcessor`.
#[derive(Clone)]
pub struct BulkProcessorParameters {
    /// Name used in logs.
    pub name: String,
    /// Number of workers, each owning its own buffer.
    pub workers: usize,
    /// Commit a buffer once it holds this many items. Zero disables the threshold.
    pub bulk_actions: usize,
    /// Commit a buffer once its estimated payload reaches this many bytes. Zero disables the threshold.
    pub bulk_size: usize,
    /// Commit non-empty buffers periodically. `None` or a zero period disables the timer.
    pub flush_interval: Option<Duration>,
    pub retry: RetryPolicy,
    pub listener: Option<Arc<dyn BulkListener>>,
}

impl Default for BulkProcessorParameters {
    fn default() -> Self {
        Self {
            name: "bulk-processor".to_string(),
            workers: 1,
            bulk_actions: DEFAULT_BULK_ACTIONS,
            bulk_size: DEFAULT_BULK_SIZE,
            flush_interval: None,
            retry: RetryPolicy::default(),
            listener: None,
        }
    }
}

impl BulkProcessorParameters {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_bulk_actions(mut self, bulk_actions: usize) -> Self {
        self.bulk_actions = bulk_actions;
        self
    }

    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval).filter(|period| !period.is_zero());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn BulkListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl fmt::Debug for BulkProcessorParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkProcessorParameters")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("bulk_actions", &self.bulk_actions)
            .field("bulk_size", &self.bulk_size)
            .field("flush_interval", &self.flush_interval)
            .field("retry", &self.retry)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Counters since the processor started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkProcessorStats {
    /// Batches sent to the executor.
    pub committed: u64,
    /// Items the engine accepted.
    pub indexed: u64,
    /// Items rejected by the engine or lost with a failed batch.
    pub failed: u64,
    /// Explicit flushes and interval ticks that committed a batch.
    pub flushed: u64,
}

#[derive(Default)]
struct Counters {
    executions: AtomicU64,
    committed: AtomicU64,
    indexed: AtomicU64,
    failed: AtomicU64,
    flushed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BulkProcessorStats {
        BulkProcessorStats {
            committed: self.committed.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
        }
    }
}

enum WorkerMessage {
    Add(BulkItem),
    Flush(oneshot::Sender<()>),
}

/// Buffers items across workers and commits them in batches.
///
/// Items are dealt to workers round-robin. A worker commits its buffer when
/// `bulk_actions` or `bulk_size` is reached, on every `flush_interval` tick,
/// on `flush()` and on `close()`. Executor failures are retried according to
/// the retry policy, reported to the listener and counted; they never stop a
/// worker.
pub struct BulkProcessor {
    name: String,
    senders: Vec<mpsc::Sender<WorkerMessage>>,
    next: AtomicUsize,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl BulkProcessor {
    /// Spawn the workers. Must be called within a tokio runtime.
    pub fn start(executor: Arc<dyn BulkExecutor>, params: BulkProcessorParameters) -> Self {
        let workers = params.workers.max(1);
        let capacity = params.bulk_actions.max(1);
        let counters = Arc::new(Counters::default());

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let (sender, receiver) = mpsc::channel(capacity);
            let worker = Worker {
                id: worker_id,
                name: params.name.clone(),
                receiver,
                buffer: Vec::new(),
                buffered_bytes: 0,
                executor: Arc::clone(&executor),
                bulk_actions: params.bulk_actions,
                bulk_size: params.bulk_size,
                flush_interval: params.flush_interval,
                retry: params.retry.clone(),
                listener: params.listener.clone(),
                counters: Arc::clone(&counters),
            };
            senders.push(sender);
            handles.push(tokio::spawn(worker.run()));
        }

        info!(
            name = %params.name,
            workers,
            bulk_actions = params.bulk_actions,
            bulk_size = params.bulk_size,
            "Started bulk processor"
        );

        Self {
            name: params.name,
            senders,
            next: AtomicUsize::new(0),
            handles,
            counters,
        }
    }

    /// Queue an item. Waits while the chosen worker's queue is full.
    pub async fn add(&self, item: BulkItem) -> Result<(), ElasticError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[slot]
            .send(WorkerMessage::Add(item))
            .await
            .map_err(|_| self.closed_error())
    }

    /// Commit every worker's buffer and wait until all commits have finished.
    pub async fn flush(&self) -> Result<(), ElasticError> {
        let mut acks = Vec::with_capacity(self.senders.len());
        for sender in &self.senders {
            let (ack, done) = oneshot::channel();
            sender
                .send(WorkerMessage::Flush(ack))
                .await
                .map_err(|_| self.closed_error())?;
            acks.push(done);
        }

        for done in acks {
            done.await.map_err(|_| self.closed_error())?;
        }

        debug!(name = %self.name, "Flushed bulk processor");
        Ok(())
    }

    pub fn stats(&self) -> BulkProcessorStats {
        self.counters.snapshot()
    }

    /// Commit what is left, stop the workers and return the final counters.
    pub async fn close(self) -> Result<BulkProcessorStats, ElasticError> {
        drop(self.senders);

        for handle in self.handles {
            handle
                .await
                .map_err(|e| ElasticError::handler(format!("bulk worker failed: {}", e)))?;
        }

        let stats = self.counters.snapshot();
        info!(
            name = %self.name,
            committed = stats.committed,
            indexed = stats.indexed,
            failed = stats.failed,
            "Closed bulk processor"
        );
        Ok(stats)
    }

    fn closed_error(&self) -> ElasticError {
        ElasticError::validation(format!("bulk processor '{}' is closed", self.name))
    }
}

struct Worker {
    id: usize,
    name: String,
    receiver: mpsc::Receiver<WorkerMessage>,
    buffer: Vec<BulkItem>,
    buffered_bytes: usize,
    executor: Arc<dyn BulkExecutor>,
    bulk_actions: usize,
    bulk_size: usize,
    flush_interval: Option<Duration>,
    retry: RetryPolicy,
    listener: Option<Arc<dyn BulkListener>>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        let period = self.flush_interval.filter(|period| !period.is_zero());
        let mut ticker = period.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                message = self.receiver.recv() => match message {
                    Some(WorkerMessage::Add(item)) => {
                        self.buffered_bytes += item.estimated_size();
                        self.buffer.push(item);
                        if self.threshold_reached() {
                            self.commit().await;
                        }
                    }
                    Some(WorkerMessage::Flush(ack)) => {
                        self.flush().await;
                        let _ = ack.send(());
                    }
                    None => {
                        self.commit().await;
                        break;
                    }
                },
                _ = next_tick(&mut ticker) => self.flush().await,
            }
        }

        debug!(name = %self.name, worker = self.id, "Bulk worker stopped");
    }

    fn threshold_reached(&self) -> bool {
        (self.bulk_actions > 0 && self.buffer.len() >= self.bulk_actions)
            || (self.bulk_size > 0 && self.buffered_bytes >= self.bulk_size)
    }

    async fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.counters.flushed.fetch_add(1, Ordering::Relaxed);
            self.commit().await;
        }
    }

    async fn commit(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;
        let execution_id = self.counters.executions.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(listener) = &self.listener {
            listener.before_commit(execution_id, &batch);
        }

        let executor = &self.executor;
        let items = &batch;
        let result = retry_transient(&self.retry, "bulk_commit", move || async move {
            executor.execute_bulk(items).await
        })
        .await;

        self.counters.committed.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(summary) => {
                self.counters
                    .indexed
                    .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
                self.counters
                    .failed
                    .fetch_add(summary.failed as u64, Ordering::Relaxed);
                if summary.has_failures() {
                    warn!(
                        name = %self.name,
                        worker = self.id,
                        execution_id,
                        failed = summary.failed,
                        "Bulk commit had failed items"
                    );
                }
            }
            Err(e) => {
                self.counters
                    .failed
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                error!(
                    name = %self.name,
                    worker = self.id,
                    execution_id,
                    items = batch.len(),
                    error = %e,
                    "Bulk commit failed"
                );
            }
        }

        if let Some(listener) = &self.listener {
            listener.after_commit(execution_id, &batch, &result);
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::types::BulkItemResult;

    /// Executor that records every batch and optionally fails the first few.
    #[derive(Default)]
    struct RecordingExecutor {
        batches: Mutex<Vec<Vec<BulkItem>>>,
        failures_left: AtomicUsize,
        failure_status: u16,
    }

    impl RecordingExecutor {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                failure_status: 400,
                ..Default::default()
            }
        }

        fn throttled(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                failure_status: 429,
                ..Default::default()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl BulkExecutor for RecordingExecutor {
        async fn execute_bulk(&self, items: &[BulkItem]) -> Result<BulkSummary, ElasticError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ElasticError::status(self.failure_status, "rejected"));
            }

            self.batches.lock().unwrap().push(items.to_vec());
            let results: Vec<BulkItemResult> = items
                .iter()
                .map(|item| BulkItemResult {
                    index: item.index.clone().unwrap_or_default(),
                    id: item.id.clone().unwrap_or_default(),
                    status: 201,
                    error: None,
                })
                .collect();
            Ok(BulkSummary {
                total: results.len(),
                succeeded: results.len(),
                failed: 0,
                results,
            })
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        before: Mutex<Vec<u64>>,
        after: Mutex<Vec<(u64, bool)>>,
    }

    impl BulkListener for RecordingListener {
        fn before_commit(&self, execution_id: u64, _items: &[BulkItem]) {
            self.before.lock().unwrap().push(execution_id);
        }

        fn after_commit(
            &self,
            execution_id: u64,
            _items: &[BulkItem],
            result: &Result<BulkSummary, ElasticError>,
        ) {
            self.after.lock().unwrap().push((execution_id, result.is_ok()));
        }
    }

    fn item(n: usize) -> BulkItem {
        BulkItem::index("blocks-0", n.to_string(), json!({ "height": n }))
    }

    #[tokio::test]
    async fn test_commits_when_bulk_actions_reached() {
        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test").with_bulk_actions(2),
        );

        for n in 0..5 {
            processor.add(item(n)).await.unwrap();
        }
        let stats = processor.close().await.unwrap();

        assert_eq!(executor.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(stats.committed, 3);
        assert_eq!(stats.indexed, 5);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_flush_commits_partial_buffers() {
        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test").with_bulk_actions(100),
        );

        for n in 0..3 {
            processor.add(item(n)).await.unwrap();
        }
        processor.flush().await.unwrap();

        assert_eq!(executor.batch_sizes(), vec![3]);
        assert_eq!(processor.stats().flushed, 1);

        // Nothing left to commit on close.
        let stats = processor.close().await.unwrap();
        assert_eq!(stats.committed, 1);
    }

    #[tokio::test]
    async fn test_items_are_dealt_round_robin() {
        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test")
                .with_workers(2)
                .with_bulk_actions(100),
        );

        for n in 0..4 {
            processor.add(item(n)).await.unwrap();
        }
        processor.close().await.unwrap();

        let batches = executor.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        let mut ids: Vec<Vec<String>> = batches
            .iter()
            .map(|batch| batch.iter().filter_map(|i| i.id.clone()).collect())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![vec!["0", "2"], vec!["1", "3"]]);
    }

    #[tokio::test]
    async fn test_bulk_size_threshold() {
        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test")
                .with_bulk_actions(0)
                .with_bulk_size(1),
        );

        for n in 0..3 {
            processor.add(item(n)).await.unwrap();
        }
        processor.close().await.unwrap();

        assert_eq!(executor.batch_sizes(), vec![1, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_interval_commits_buffer() {
        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test")
                .with_bulk_actions(100)
                .with_flush_interval(Duration::from_millis(50)),
        );

        processor.add(item(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(executor.batch_sizes(), vec![1]);
        assert_eq!(processor.stats().flushed, 1);
        processor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_throttled_commits_are_retried() {
        let executor = Arc::new(RecordingExecutor::throttled(2));
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test")
                .with_bulk_actions(2)
                .with_retry(RetryPolicy {
                    initial_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                    max_retries: 3,
                }),
        );

        processor.add(item(1)).await.unwrap();
        processor.add(item(2)).await.unwrap();
        let stats = processor.close().await.unwrap();

        assert_eq!(executor.batch_sizes(), vec![2]);
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_zero_flush_interval_disables_timer() {
        let params = BulkProcessorParameters::new("test")
            .with_bulk_actions(100)
            .with_flush_interval(Duration::ZERO);
        assert_eq!(params.flush_interval, None);

        let executor = Arc::new(RecordingExecutor::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters {
                flush_interval: Some(Duration::ZERO),
                ..params
            },
        );

        processor.add(item(1)).await.unwrap();
        processor.add(item(2)).await.unwrap();
        processor.flush().await.unwrap();
        assert_eq!(executor.batch_sizes(), vec![2]);

        let stats = processor.close().await.unwrap();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.indexed, 2);
    }

    #[tokio::test]
    async fn test_failures_reach_listener_and_workers_continue() {
        let executor = Arc::new(RecordingExecutor::failing(1));
        let listener = Arc::new(RecordingListener::default());
        let processor = BulkProcessor::start(
            executor.clone(),
            BulkProcessorParameters::new("test")
                .with_bulk_actions(2)
                .with_retry(RetryPolicy::disabled())
                .with_listener(listener.clone()),
        );

        for n in 0..4 {
            processor.add(item(n)).await.unwrap();
        }
        let stats = processor.close().await.unwrap();

        assert_eq!(executor.batch_sizes(), vec![2]);
        assert_eq!(stats.committed, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.indexed, 2);
        assert_eq!(*listener.before.lock().unwrap(), vec![1, 2]);
        assert_eq!(*listener.after.lock().unwrap(), vec![(1, false), (2, true)]);
    }

    #[test]
    fn test_parameters_debug_hides_listener() {
        let params = BulkProcessorParameters::new("ingest");
        let rendered = format!("{:?}", params);

        assert!(rendered.contains("ingest"));
        assert!(rendered.contains("listener: false"));
    }
}
