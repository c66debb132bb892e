//! Error types for Opswatch
//!
//! This module defines custom error types used throughout the application.

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// The connection to a tool server failed or closed
    #[error("Tool transport error: {0}")]
    ToolTransport(String),

    /// A tool server answered with an error
    #[error("Tool call failed: {0}")]
    ToolFailed(String),

    /// A peer sent something that does not follow the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The reasoning endpoint rejected a request
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// A required setting is absent
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for metrics and status reports
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ToolTransport(_) => "tool_transport",
            AppError::ToolFailed(_) => "tool_failed",
            AppError::Protocol(_) => "protocol",
            AppError::UpstreamError(_) => "upstream",
            AppError::NotConfigured(_) => "not_configured",
            AppError::Cancelled => "cancelled",
            AppError::HttpError(_) => "http",
            AppError::JsonError(_) => "json",
            AppError::IoError(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
