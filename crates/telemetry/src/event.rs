//! Telemetry event model and builder.
//!
//! One `TelemetryEvent` is produced per intercepted call, on either exit
//! path. Events are immutable after construction and owned by the buffer
//! until flushed. Field names here are the collector wire format.

use callscope_core::Usage;
use callscope_core::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::PricingTable;

/// Outcome of the intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error,
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One structured record describing a single intercepted call's timing,
/// usage, and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Globally unique id generated per call (`req_<unix-secs>_<hex>`).
    pub request_id: String,
    /// When the call started (UTC, second precision on the wire).
    #[serde(with = "iso8601_seconds")]
    pub timestamp_start: DateTime<Utc>,
    /// When the call finished.
    #[serde(with = "iso8601_seconds")]
    pub timestamp_end: DateTime<Utc>,
    /// Model name, `"unknown"` when absent.
    pub model: String,
    /// Endpoint tag, constant per call-site (e.g. `chat.completions`).
    pub endpoint: String,
    /// Wall-clock latency in whole milliseconds.
    pub latency_ms: u64,
    /// Token counters; missing upstream usage coerces to zeros.
    pub token_usage: Usage,
    /// Estimated cost in USD.
    pub cost_estimate_usd: f64,
    /// Outcome of the call.
    pub status: CallStatus,
    /// Error tag, present only on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable error message, present only on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Builds exactly one `TelemetryEvent` per intercepted call.
///
/// Created before the call goes out (stamping start time and request id),
/// consumed by `success`/`failure` when it comes back. Construction never
/// fails; missing or malformed usage degrades to zeroed fields so event
/// building can never suppress the real call outcome.
pub struct EventBuilder {
    request_id: String,
    endpoint: String,
    model: String,
    started_at: DateTime<Utc>,
}

impl EventBuilder {
    /// Begin an event for a call that is about to go out.
    ///
    /// An empty model name records as `"unknown"`.
    pub fn begin(endpoint: impl Into<String>, model: &str) -> Self {
        Self {
            request_id: new_request_id(),
            endpoint: endpoint.into(),
            model: if model.is_empty() {
                "unknown".into()
            } else {
                model.to_string()
            },
            started_at: Utc::now(),
        }
    }

    /// The request id this builder stamped at `begin`.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Finish as a successful call, pricing whatever usage came back.
    pub fn success(self, usage: Option<Usage>, pricing: &PricingTable) -> TelemetryEvent {
        let token_usage = usage.unwrap_or_default();
        let cost = if usage.is_some() {
            pricing.estimate(
                &self.model,
                token_usage.prompt_tokens,
                token_usage.completion_tokens,
            )
        } else {
            0.0
        };
        self.finish(token_usage, cost, CallStatus::Success, None, None)
    }

    /// Finish as a failed call; usage and cost are zeroed.
    pub fn failure(self, error: &ApiError) -> TelemetryEvent {
        let kind = error.kind().to_string();
        let message = error.to_string();
        self.finish(
            Usage::default(),
            0.0,
            CallStatus::Error,
            Some(kind),
            Some(message),
        )
    }

    fn finish(
        self,
        token_usage: Usage,
        cost_estimate_usd: f64,
        status: CallStatus,
        error_kind: Option<String>,
        error_message: Option<String>,
    ) -> TelemetryEvent {
        let ended_at = Utc::now();
        let latency_ms = ended_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64;

        TelemetryEvent {
            request_id: self.request_id,
            timestamp_start: self.started_at,
            timestamp_end: ended_at,
            model: self.model,
            endpoint: self.endpoint,
            latency_ms,
            token_usage,
            cost_estimate_usd,
            status,
            error_kind,
            error_message,
        }
    }
}

/// Generate a request id: unix seconds plus 8 hex chars of randomness.
fn new_request_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("req_{}_{}", Utc::now().timestamp(), &suffix[..8])
}

/// Serialize timestamps as ISO-8601 truncated to whole seconds.
mod iso8601_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|ndt| ndt.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
