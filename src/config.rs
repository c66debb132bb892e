//! Configuration management for Opswatch
//!
//! Configuration is loaded from environment variables. Monitoring coordinates
//! are optional at load time: a missing coordinate makes the watchdog skip
//! its cycles with a warning instead of refusing to start.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Default health threshold applied to the last metric bucket
pub const DEFAULT_HEALTH_THRESHOLD: f64 = 80.0;
/// Default polling interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;
/// Phrase a diagnosis report contains when no cause was found
pub const DEFAULT_INCONCLUSIVE_MARKER: &str = "No root cause identified";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the status server binds to
    pub host: String,
    /// Port the status server listens on
    pub port: u16,

    /// Azure tenant ID
    pub tenant_id: Option<String>,
    /// Azure subscription ID
    pub subscription_id: Option<String>,
    /// Resource group holding the monitored resource
    pub resource_group: Option<String>,
    /// Name of the monitored resource
    pub target_resource: Option<String>,
    /// Resource type of the monitored resource
    pub resource_type: String,
    /// Metric namespace queried
    pub metric_namespace: String,
    /// Metric name queried
    pub metric_name: String,
    /// Aggregation bucket width (ISO 8601 duration)
    pub metric_interval: String,
    /// Lookback window (ISO 8601 duration)
    pub metric_timespan: String,
    /// Aggregation function
    pub metric_aggregation: String,
    /// Name of the monitoring tool on the Azure backend
    pub monitor_tool: String,

    /// Seconds between watchdog cycles
    pub poll_interval_seconds: u64,
    /// Last-bucket values at or above this are unhealthy
    pub health_threshold: f64,
    /// Diagnosis reports containing this phrase are inconclusive
    pub inconclusive_marker: String,
    /// Tool names Tier 3 may use (empty = every aggregated tool)
    pub remediation_tools: Vec<String>,

    /// GitHub personal access token for the repository backend
    pub github_token: Option<String>,
    /// Companion repository (`owner/name`)
    pub github_repository: Option<String>,

    /// OpenAI-compatible API base URL
    pub llm_api_url: String,
    /// API key for the reasoning client
    pub llm_api_key: Option<String>,
    /// Model used by reasoning sessions
    pub llm_model: String,
    /// Upper bound on tool-call rounds per reasoning session
    pub llm_max_tool_rounds: usize,

    /// Launcher used to start MCP servers
    pub npx_command: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let resource_type = env::var("OPSWATCH_RESOURCE_TYPE")
            .unwrap_or_else(|_| "Microsoft.Web/serverfarms".to_string());

        Ok(Self {
            host: env::var("OPSWATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("OPSWATCH_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid OPSWATCH_PORT")?,

            tenant_id: non_empty_var("AZURE_TENANT_ID"),
            subscription_id: non_empty_var("AZURE_SUBSCRIPTION_ID"),
            resource_group: non_empty_var("OPSWATCH_RESOURCE_GROUP"),
            target_resource: non_empty_var("OPSWATCH_TARGET_RESOURCE"),
            metric_namespace: env::var("OPSWATCH_METRIC_NAMESPACE")
                .unwrap_or_else(|_| resource_type.clone()),
            resource_type,
            metric_name: env::var("OPSWATCH_METRIC_NAME")
                .unwrap_or_else(|_| "CpuPercentage".to_string()),
            metric_interval: env::var("OPSWATCH_METRIC_INTERVAL")
                .unwrap_or_else(|_| "PT5M".to_string()),
            metric_timespan: env::var("OPSWATCH_METRIC_TIMESPAN")
                .unwrap_or_else(|_| "PT1H".to_string()),
            metric_aggregation: env::var("OPSWATCH_METRIC_AGGREGATION")
                .unwrap_or_else(|_| "Average".to_string()),
            monitor_tool: env::var("OPSWATCH_MONITOR_TOOL")
                .unwrap_or_else(|_| "monitor".to_string()),

            poll_interval_seconds: env::var("OPSWATCH_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECONDS.to_string())
                .parse()
                .context("Invalid OPSWATCH_POLL_INTERVAL_SECONDS")?,
            health_threshold: match env::var("OPSWATCH_HEALTH_THRESHOLD") {
                Ok(raw) => parse_threshold(&raw)?,
                Err(_) => DEFAULT_HEALTH_THRESHOLD,
            },
            inconclusive_marker: env::var("OPSWATCH_INCONCLUSIVE_MARKER")
                .unwrap_or_else(|_| DEFAULT_INCONCLUSIVE_MARKER.to_string()),
            remediation_tools: env::var("OPSWATCH_REMEDIATION_TOOLS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),

            github_token: non_empty_var("GITHUB_TOKEN"),
            github_repository: non_empty_var("GITHUB_REPOSITORY"),

            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_api_key: non_empty_var("LLM_API_KEY"),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            llm_max_tool_rounds: env::var("LLM_MAX_TOOL_ROUNDS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("Invalid LLM_MAX_TOOL_ROUNDS")?,

            npx_command: env::var("MCP_NPX_COMMAND").unwrap_or_else(|_| default_npx_command()),
        })
    }

    /// Polling interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Read `OPSWATCH_LOG_FORMAT`, falling back to text
    pub fn from_env() -> Self {
        env::var("OPSWATCH_LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Platform launcher for `npx`
pub fn default_npx_command() -> String {
    if cfg!(windows) {
        "npx.cmd".to_string()
    } else {
        "npx".to_string()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_threshold(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .context("Invalid OPSWATCH_HEALTH_THRESHOLD")?;
    anyhow::ensure!(
        value.is_finite(),
        "OPSWATCH_HEALTH_THRESHOLD must be a finite number, got {}",
        raw
    );
    Ok(value)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
