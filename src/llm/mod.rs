//! Reasoning clients
//!
//! The session traits the stages depend on, and an OpenAI-compatible
//! implementation.

pub mod openai;
pub mod session;
pub mod types;

pub use openai::OpenAiChatClient;
pub use session::{ReasoningClient, ReasoningSession};
