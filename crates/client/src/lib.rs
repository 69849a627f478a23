//! Drop-in instrumented client for OpenAI-compatible chat APIs.
//!
//! ```no_run
//! use callscope_client::Client;
//! use callscope_config::AppConfig;
//! use callscope_core::chat::{ChatMessage, ChatRequest};
//!
//! # async fn run() -> Result<(), callscope_core::error::ApiError> {
//! let config = AppConfig::load().expect("invalid config");
//! let client = Client::new(&config);
//!
//! let response = client
//!     .chat(ChatRequest::new("gpt-4o", vec![ChatMessage::user("Hello!")]))
//!     .await?;
//! println!("{}", response.message.content);
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod openai;

pub use client::{CHAT_COMPLETIONS, Client};
pub use openai::OpenAiCompatApi;
