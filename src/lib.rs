//! semantic-router-llm: chat-completion adapter for semantic routing
//!
//! Sends a conversation to a hosted chat-completion model and returns either
//! the reply text or, when a function schema is attached, the raw arguments of
//! the single tool call the model was forced to make.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod function_call;
pub mod logging;
pub mod messages;
pub mod services;

// Re-exports for convenience
pub use config::LlmConfig;
pub use error::{LlmError, Result};
pub use function_call::{get_schema, get_schema_openai, FunctionSchema, FunctionSignature};
pub use messages::{Message, Role};
pub use services::{
    openai::{ChatCompletionClient, HttpChatClient, OpenAiLlm},
    Llm,
};
