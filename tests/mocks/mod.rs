//! Mock infrastructure for testing external services
//!
//! - OpenAI-compatible chat completions endpoint used by reasoning sessions


pub use llm_gateway::*;
