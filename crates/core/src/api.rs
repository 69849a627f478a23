//! ChatApi trait — the abstraction over the wrapped upstream API.
//!
//! A ChatApi knows how to send a conversation to an LLM backend and get a
//! response back. The instrumented client calls `chat()` without knowing
//! which backend is behind it — pure polymorphism.
//!
//! Implementations: OpenAI-compatible HTTP (in `callscope-client`), mocks
//! for testing the telemetry path.

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::ApiError;
use async_trait::async_trait;

/// The core upstream-API trait.
///
/// The telemetry pipeline treats this as an opaque collaborator: whatever
/// `chat()` returns (value or error) is surfaced to the caller unchanged,
/// and one telemetry event is recorded per call on either exit path.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a chat completion request and get a complete response.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ApiError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ApiError> {
        Ok(true)
    }
}
