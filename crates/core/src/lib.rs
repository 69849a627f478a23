//! # Callscope Core
//!
//! Domain types, traits, and error definitions for the Callscope instrumented
//! LLM client. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The upstream API is defined as a trait here (`ChatApi`); the concrete HTTP
//! implementation lives in `callscope-client`. This enables:
//! - Instrumenting any OpenAI-compatible backend, not one hard-coded URL
//! - Easy testing of the telemetry path with mock/stub backends
//! - Clean dependency graph (all crates depend inward on core)

pub mod api;
pub mod chat;
pub mod error;

// Re-export key types at crate root for ergonomics
pub use api::ChatApi;
pub use chat::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
pub use error::{ApiError, Error, Result};
