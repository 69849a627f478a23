//! Flush dispatcher — ships drained batches to the collector.
//!
//! A single long-lived worker task consumes batches from a bounded channel,
//! so a burst of threshold flushes never spawns unbounded tasks. Submitting
//! is non-blocking for the caller; a full queue drops the batch and bumps a
//! counter. Every transport failure is absorbed here: counted, logged at
//! debug, never retried, never propagated. Telemetry loss is acceptable —
//! slowing down the primary call path is not.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::event::TelemetryEvent;

/// Transport failure while delivering one batch.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("collector returned status {0}")]
    Status(u16),
}

/// Where drained batches go. One delivery attempt per batch.
///
/// The HTTP implementation ships with the crate; tests substitute their own
/// to observe batches without a network.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn deliver(&self, events: &[TelemetryEvent]) -> Result<(), SinkError>;
}

/// HTTP sink: one POST per batch to the collector endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSink {
    /// Create a sink for the given collector endpoint and credential.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct BatchBody<'a> {
    events: &'a [TelemetryEvent],
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn deliver(&self, events: &[TelemetryEvent]) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&BatchBody { events })
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Local counters for the telemetry side channel.
///
/// Failures are never escalated, but they are not invisible either: callers
/// can read these to see what the discard policy threw away.
#[derive(Debug, Default)]
pub struct TelemetryStats {
    /// Batches delivered to the collector.
    pub batches_sent: AtomicU64,
    /// Events contained in delivered batches.
    pub events_sent: AtomicU64,
    /// Batches whose delivery attempt failed (dropped, not retried).
    pub flush_failures: AtomicU64,
    /// Batches dropped because the dispatch queue was full.
    pub batches_dropped: AtomicU64,
}

impl TelemetryStats {
    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> TelemetryStatsSnapshot {
        TelemetryStatsSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TelemetryStatsSnapshot {
    pub batches_sent: u64,
    pub events_sent: u64,
    pub flush_failures: u64,
    pub batches_dropped: u64,
}

pub(crate) enum DispatchMessage {
    Batch(Vec<TelemetryEvent>),
    Terminate,
}

/// Handle feeding the dispatch worker.
pub struct FlushDispatcher {
    tx: mpsc::Sender<DispatchMessage>,
    stats: Arc<TelemetryStats>,
}

impl FlushDispatcher {
    /// Spawn the worker task; returns the handle and the worker's join handle.
    pub fn spawn(
        sink: Arc<dyn TelemetrySink>,
        stats: Arc<TelemetryStats>,
        queue_depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(queue_depth.max(1));
        let worker_stats = Arc::clone(&stats);

        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    DispatchMessage::Batch(batch) => {
                        Self::ship(sink.as_ref(), &worker_stats, batch).await;
                    }
                    DispatchMessage::Terminate => break,
                }
            }
        });

        (Self { tx, stats }, worker)
    }

    /// Submit a batch for delivery. Non-blocking; empty batches are a no-op;
    /// if the queue is full the batch is dropped and counted.
    pub fn submit(&self, batch: Vec<TelemetryEvent>) {
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.tx.try_send(DispatchMessage::Batch(batch)) {
            self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
            let dropped = match err {
                mpsc::error::TrySendError::Full(DispatchMessage::Batch(b)) => b.len(),
                _ => 0,
            };
            debug!(dropped, "dispatch queue full; telemetry batch dropped");
        }
    }

    /// Submit a final batch during shutdown, waiting for queue space so the
    /// batch gets its one delivery attempt.
    pub(crate) async fn submit_final(&self, batch: Vec<TelemetryEvent>) {
        if batch.is_empty() {
            return;
        }
        let _ = self.tx.send(DispatchMessage::Batch(batch)).await;
    }

    /// Ask the worker to exit once everything already queued has shipped.
    pub(crate) async fn terminate(&self) {
        let _ = self.tx.send(DispatchMessage::Terminate).await;
    }

    async fn ship(sink: &dyn TelemetrySink, stats: &TelemetryStats, batch: Vec<TelemetryEvent>) {
        let count = batch.len();
        match sink.deliver(&batch).await {
            Ok(()) => {
                stats.batches_sent.fetch_add(1, Ordering::Relaxed);
                stats.events_sent.fetch_add(count as u64, Ordering::Relaxed);
                debug!(events = count, "telemetry batch delivered");
            }
            Err(error) => {
                stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                debug!(events = count, %error, "telemetry flush failed; batch discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use crate::pricing::PricingTable;
    use std::sync::Mutex;

    fn events(n: usize) -> Vec<TelemetryEvent> {
        (0..n)
            .map(|_| {
                EventBuilder::begin("chat.completions", "gpt-4o")
                    .success(None, &PricingTable::empty())
            })
            .collect()
    }

    struct RecordingSink {
        batches: Mutex<Vec<Vec<TelemetryEvent>>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn deliver(&self, events: &[TelemetryEvent]) -> Result<(), SinkError> {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TelemetrySink for FailingSink {
        async fn deliver(&self, _events: &[TelemetryEvent]) -> Result<(), SinkError> {
            Err(SinkError::Status(503))
        }
    }

    #[tokio::test]
    async fn delivers_batches_in_order() {
        let sink = RecordingSink::new();
        let stats = Arc::new(TelemetryStats::default());
        let (dispatcher, worker) =
            FlushDispatcher::spawn(sink.clone(), Arc::clone(&stats), 8);

        dispatcher.submit(events(3));
        dispatcher.submit(events(2));
        dispatcher.terminate().await;
        worker.await.unwrap();

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.batches_sent, 2);
        assert_eq!(snapshot.events_sent, 5);
        assert_eq!(snapshot.flush_failures, 0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let sink = RecordingSink::new();
        let stats = Arc::new(TelemetryStats::default());
        let (dispatcher, worker) =
            FlushDispatcher::spawn(sink.clone(), Arc::clone(&stats), 8);

        dispatcher.submit(Vec::new());
        dispatcher.terminate().await;
        worker.await.unwrap();

        assert!(sink.batches.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().batches_sent, 0);
    }

    #[tokio::test]
    async fn failures_are_counted_not_retried() {
        let stats = Arc::new(TelemetryStats::default());
        let (dispatcher, worker) =
            FlushDispatcher::spawn(Arc::new(FailingSink), Arc::clone(&stats), 8);

        dispatcher.submit(events(4));
        dispatcher.terminate().await;
        worker.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.flush_failures, 1);
        assert_eq!(snapshot.batches_sent, 0);
        assert_eq!(snapshot.events_sent, 0);
    }

    #[tokio::test]
    async fn http_sink_network_failure_is_an_error_not_a_panic() {
        // Nothing listens on this port; delivery must fail fast and cleanly.
        let sink = HttpSink::new(
            "http://127.0.0.1:9/v1/telemetry",
            "cs_test",
            Duration::from_millis(500),
        );
        let result = sink.deliver(&events(1)).await;
        assert!(matches!(result, Err(SinkError::Transport(_))));
    }

    #[tokio::test]
    async fn overflow_drops_and_counts() {
        // Worker is wedged on a slow delivery; queue depth 1 fills up.
        struct StallSink;

        #[async_trait]
        impl TelemetrySink for StallSink {
            async fn deliver(&self, _events: &[TelemetryEvent]) -> Result<(), SinkError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let stats = Arc::new(TelemetryStats::default());
        let (dispatcher, worker) =
            FlushDispatcher::spawn(Arc::new(StallSink), Arc::clone(&stats), 1);

        // First batch occupies the worker, second fills the queue slot,
        // third has nowhere to go.
        dispatcher.submit(events(1));
        tokio::task::yield_now().await;
        dispatcher.submit(events(1));
        dispatcher.submit(events(1));

        assert!(stats.snapshot().batches_dropped >= 1);
        worker.abort();
    }
}
