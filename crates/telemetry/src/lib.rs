//! Telemetry capture and asynchronous batch shipping for Callscope.
//!
//! Provides per-call event construction with cost estimation, a
//! thread-safe buffer with threshold-triggered draining, and a background
//! dispatch pipeline that ships batches to a remote collector on a
//! best-effort basis. The pipeline never blocks, retries, or fails the
//! primary call path: telemetry loss is an accepted trade for call
//! availability, and what gets discarded is visible through local
//! counters rather than errors.

pub mod buffer;
pub mod dispatch;
pub mod event;
pub mod pipeline;
pub mod pricing;

pub use buffer::EventBuffer;
pub use dispatch::{
    FlushDispatcher, HttpSink, SinkError, TelemetrySink, TelemetryStats, TelemetryStatsSnapshot,
};
pub use event::{CallStatus, EventBuilder, TelemetryEvent};
pub use pipeline::{PipelineOptions, Telemetry, TelemetryPipeline};
pub use pricing::{ModelPricing, PricingTable};
