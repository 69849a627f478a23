//! The instrumented client — intercepts every chat call.
//!
//! Wraps any `ChatApi` backend. Each call is timed, priced, and recorded
//! as exactly one telemetry event on either exit path; the backend's
//! result or error reaches the caller unchanged. When no collector
//! credential is configured the wrapper is a plain pass-through: no event
//! is built and no background task exists.

use std::sync::Arc;
use std::time::Duration;

use callscope_config::AppConfig;
use callscope_core::chat::{ChatRequest, ChatResponse};
use callscope_core::error::ApiError;
use callscope_core::ChatApi;
use callscope_telemetry::dispatch::HttpSink;
use callscope_telemetry::event::EventBuilder;
use callscope_telemetry::pipeline::{PipelineOptions, Telemetry};
use callscope_telemetry::pricing::{ModelPricing, PricingTable};
use callscope_telemetry::TelemetryStatsSnapshot;

use crate::openai::OpenAiCompatApi;

/// Endpoint tag recorded on events from the chat call-site.
pub const CHAT_COMPLETIONS: &str = "chat.completions";

/// A drop-in chat client with embedded telemetry capture.
pub struct Client<A: ChatApi> {
    api: A,
    telemetry: Telemetry,
    pricing: PricingTable,
}

impl Client<OpenAiCompatApi> {
    /// Build a client from configuration: OpenAI-compatible backend at
    /// `config.base_url`, telemetry pipeline started only when the
    /// collector credential is present.
    ///
    /// Must be called within a Tokio runtime when telemetry is enabled
    /// (the pipeline spawns its background tasks here).
    pub fn new(config: &AppConfig) -> Self {
        let api = OpenAiCompatApi::new(
            "openai",
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
        );
        Self::with_api(api, config)
    }
}

impl<A: ChatApi> Client<A> {
    /// Wrap an arbitrary backend with telemetry per the given config.
    pub fn with_api(api: A, config: &AppConfig) -> Self {
        let telemetry = if config.telemetry.enabled() {
            let sink = HttpSink::new(
                config.telemetry.endpoint.clone(),
                config.telemetry.api_key.clone().unwrap_or_default(),
                Duration::from_secs(config.telemetry.request_timeout_secs),
            );
            Telemetry::start(
                PipelineOptions {
                    flush_threshold: config.telemetry.flush_threshold,
                    flush_interval: Duration::from_secs(config.telemetry.flush_interval_secs),
                    ..PipelineOptions::default()
                },
                Arc::new(sink),
            )
        } else {
            Telemetry::disabled()
        };

        Self::with_parts(api, telemetry, pricing_from_config(config))
    }

    /// Assemble from explicit parts (test seam and advanced wiring).
    pub fn with_parts(api: A, telemetry: Telemetry, pricing: PricingTable) -> Self {
        Self {
            api,
            telemetry,
            pricing,
        }
    }

    /// Send a chat completion request.
    ///
    /// The backend's result is returned unchanged; telemetry recording can
    /// neither fail this call nor delay it on collector I/O.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        if !self.telemetry.enabled() {
            return self.api.chat(request).await;
        }

        let builder = EventBuilder::begin(CHAT_COMPLETIONS, &request.model);
        match self.api.chat(request).await {
            Ok(response) => {
                self.telemetry
                    .record(builder.success(response.usage, &self.pricing));
                Ok(response)
            }
            Err(error) => {
                self.telemetry.record(builder.failure(&error));
                Err(error)
            }
        }
    }

    /// The wrapped backend.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Whether call telemetry is being captured.
    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry.enabled()
    }

    /// Delivery counters; `None` when telemetry is disabled.
    pub fn telemetry_stats(&self) -> Option<TelemetryStatsSnapshot> {
        self.telemetry.stats()
    }

    /// Drain buffered events, attempt one final flush, and stop the
    /// telemetry tasks. Optional; without it, buffered-but-unflushed
    /// events are lost at process exit.
    pub async fn shutdown(&self) {
        self.telemetry.shutdown().await;
    }
}

/// Defaults plus any per-model overrides from config.
fn pricing_from_config(config: &AppConfig) -> PricingTable {
    let mut pricing = PricingTable::with_defaults();
    for (model, rates) in &config.telemetry.custom_pricing {
        pricing.set(
            model.clone(),
            ModelPricing::new(rates.input_per_m, rates.output_per_m),
        );
    }
    pricing
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_config::PricingOverrideConfig;

    #[test]
    fn pricing_overrides_applied() {
        let mut config = AppConfig::default();
        config.telemetry.custom_pricing.insert(
            "in-house-7b".into(),
            PricingOverrideConfig {
                input_per_m: 0.05,
                output_per_m: 0.1,
            },
        );
        let pricing = pricing_from_config(&config);
        let cost = pricing.estimate("in-house-7b", 1_000_000, 1_000_000);
        assert!((cost - 0.15).abs() < 1e-10);
        // Defaults still present
        assert!((pricing.estimate("gpt-4o", 1_000_000, 0) - 2.5).abs() < 1e-10);
    }
}
