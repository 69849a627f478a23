//! Pipeline wiring: buffer + dispatcher + periodic ticker + shutdown.
//!
//! `TelemetryPipeline` owns the moving parts for one client instance.
//! `Telemetry` is the handle the instrumented call path holds: when no
//! collector credential is configured it is inert — no buffer, no tasks,
//! and `record` is a guaranteed no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::buffer::EventBuffer;
use crate::dispatch::{FlushDispatcher, TelemetrySink, TelemetryStats, TelemetryStatsSnapshot};
use crate::event::TelemetryEvent;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Buffer size that triggers a flush.
    pub flush_threshold: usize,
    /// Period of the time-triggered flush.
    pub flush_interval: Duration,
    /// Capacity of the dispatch queue (batches in flight).
    pub queue_depth: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flush_threshold: 10,
            flush_interval: Duration::from_secs(5),
            queue_depth: 32,
        }
    }
}

/// The telemetry capture pipeline for one client.
///
/// Runs two background tasks for its lifetime: the dispatch worker and the
/// periodic ticker. Lives until the owning client is dropped or `shutdown`
/// is called; there is no implicit drain at process exit.
pub struct TelemetryPipeline {
    buffer: EventBuffer,
    dispatcher: FlushDispatcher,
    stats: Arc<TelemetryStats>,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TelemetryPipeline {
    /// Start the pipeline: spawns the dispatch worker and the ticker.
    pub fn start(options: PipelineOptions, sink: Arc<dyn TelemetrySink>) -> Arc<Self> {
        let stats = Arc::new(TelemetryStats::default());
        let (dispatcher, worker) =
            FlushDispatcher::spawn(sink, Arc::clone(&stats), options.queue_depth);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = Arc::new(Self {
            buffer: EventBuffer::new(options.flush_threshold),
            dispatcher,
            stats,
            closed: AtomicBool::new(false),
            shutdown_tx,
            tasks: Mutex::new(vec![worker]),
        });

        let ticker = tokio::spawn(Self::run_ticker(
            Arc::clone(&pipeline),
            options.flush_interval,
            shutdown_rx,
        ));
        pipeline.tasks.lock().unwrap().push(ticker);

        info!(
            threshold = options.flush_threshold,
            interval_secs = options.flush_interval.as_secs(),
            "telemetry pipeline started"
        );
        pipeline
    }

    /// Record one event. Never fails, never blocks on I/O; if the append
    /// reaches the flush threshold the drained batch is handed to the
    /// dispatcher outside the buffer lock.
    pub fn record(&self, event: TelemetryEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(batch) = self.buffer.record(event) {
            debug!(events = batch.len(), "threshold flush");
            self.dispatcher.submit(batch);
        }
    }

    /// Events currently buffered (not yet drained).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Counter snapshot of delivery outcomes.
    pub fn stats(&self) -> TelemetryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Drain remaining events, attempt one final flush, and stop both
    /// background tasks. Idempotent; subsequent `record` calls are no-ops.
    ///
    /// This drain-on-shutdown is a deliberate behavioral addition — nothing
    /// guarantees it runs (a process can exit without calling it), and
    /// delivery of the final batch remains best-effort like any other.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        self.dispatcher.submit_final(self.buffer.drain()).await;
        self.dispatcher.terminate().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!("telemetry pipeline stopped");
    }

    /// Time-triggered flush loop. Drains whatever accumulated since the
    /// last tick, regardless of size; exits on shutdown.
    async fn run_ticker(
        pipeline: Arc<Self>,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    pipeline.dispatcher.submit(pipeline.buffer.drain());
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    }
}

/// Handle held by the instrumented call path.
///
/// Cheap to clone; `disabled()` carries no pipeline at all, making every
/// operation a no-op without branching at the call sites beyond one
/// `enabled` check.
#[derive(Clone)]
pub struct Telemetry {
    pipeline: Option<Arc<TelemetryPipeline>>,
}

impl Telemetry {
    /// Telemetry that records nothing and starts no background tasks.
    pub fn disabled() -> Self {
        Self { pipeline: None }
    }

    /// Start a pipeline and return its handle.
    pub fn start(options: PipelineOptions, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            pipeline: Some(TelemetryPipeline::start(options, sink)),
        }
    }

    /// Whether events are being captured.
    pub fn enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Record one event; guaranteed no-op when disabled.
    pub fn record(&self, event: TelemetryEvent) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.record(event);
        }
    }

    /// Counter snapshot; `None` when disabled.
    pub fn stats(&self) -> Option<TelemetryStatsSnapshot> {
        self.pipeline.as_ref().map(|p| p.stats())
    }

    /// Events currently buffered; 0 when disabled.
    pub fn pending(&self) -> usize {
        self.pipeline.as_ref().map_or(0, |p| p.pending())
    }

    /// Drain and stop; no-op when disabled.
    pub async fn shutdown(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.shutdown().await;
        }
    }
}
