//! Opswatch - tiered incident-response controller
//!
//! Periodically samples a monitored resource's metrics and, when it looks
//! unhealthy, escalates: a diagnosis session looks for the root cause, and
//! an actionable diagnosis is handed to a remediation session that proposes
//! a fix as a pull request.

pub mod agents;
pub mod config;
pub mod error;
pub mod health;
pub mod llm;
pub mod mcp;
pub mod routes;
pub mod watchdog;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;
use std::time::Instant;

pub use crate::config::Config;
pub use crate::error::{AppError, AppResult};
pub use crate::watchdog::{StatusBoard, Watchdog, WatchdogSettings};

use crate::agents::{EnvironmentContext, Fixer, Investigator};
use crate::llm::ReasoningClient;
use crate::mcp::ToolBackends;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    /// Written by the watchdog, read by the status routes
    pub status: Arc<StatusBoard>,
}

impl AppState {
    pub fn new(config: Config, status: Arc<StatusBoard>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            status,
        }
    }
}

/// Wire the escalation stages and the watchdog from configuration
pub fn build_watchdog(
    config: &Config,
    backends: Arc<dyn ToolBackends>,
    reasoning: Arc<dyn ReasoningClient>,
    status: Arc<StatusBoard>,
) -> Watchdog {
    let context = EnvironmentContext::from_config(config);

    let investigator = Investigator::new(
        reasoning.clone(),
        backends.clone(),
        context.clone(),
        config.inconclusive_marker.clone(),
    );
    let fixer = Fixer::new(
        reasoning,
        backends.clone(),
        context,
        config.remediation_tools.clone(),
    );

    Watchdog::new(
        WatchdogSettings::from_config(config),
        backends,
        Arc::new(investigator),
        Arc::new(fixer),
        status,
    )
}
