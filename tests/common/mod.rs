//! Common test utilities for Opswatch
//!
//! Shared configuration and metric payloads used across integration tests.

#![allow(dead_code)]

use opswatch::config::{DEFAULT_HEALTH_THRESHOLD, DEFAULT_INCONCLUSIVE_MARKER};
use opswatch::mcp::CallToolResult;
use opswatch::testing::FakeToolClient;
use opswatch::Config;

/// Test configuration constants
pub mod constants {
    pub const TEST_TENANT_ID: &str = "tenant-0000";
    pub const TEST_SUBSCRIPTION_ID: &str = "sub-1111";
    pub const TEST_RESOURCE_GROUP: &str = "rg-test";
    pub const TEST_TARGET_RESOURCE: &str = "asp-test";
    pub const TEST_REPOSITORY: &str = "acme/service";
    pub const TEST_LLM_API_KEY: &str = "test-llm-api-key";
}

/// A fully configured `Config` pointing the reasoning client at `llm_url`
pub fn test_config(llm_url: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        tenant_id: Some(constants::TEST_TENANT_ID.to_string()),
        subscription_id: Some(constants::TEST_SUBSCRIPTION_ID.to_string()),
        resource_group: Some(constants::TEST_RESOURCE_GROUP.to_string()),
        target_resource: Some(constants::TEST_TARGET_RESOURCE.to_string()),
        resource_type: "Microsoft.Web/serverfarms".to_string(),
        metric_namespace: "Microsoft.Web/serverfarms".to_string(),
        metric_name: "CpuPercentage".to_string(),
        metric_interval: "PT5M".to_string(),
        metric_timespan: "PT1H".to_string(),
        metric_aggregation: "Average".to_string(),
        monitor_tool: "monitor".to_string(),
        poll_interval_seconds: 60,
        health_threshold: DEFAULT_HEALTH_THRESHOLD,
        inconclusive_marker: DEFAULT_INCONCLUSIVE_MARKER.to_string(),
        remediation_tools: Vec::new(),
        github_token: Some("ghp_test".to_string()),
        github_repository: Some(constants::TEST_REPOSITORY.to_string()),
        llm_api_url: llm_url.to_string(),
        llm_api_key: Some(constants::TEST_LLM_API_KEY.to_string()),
        llm_model: "gpt-4o".to_string(),
        llm_max_tool_rounds: 4,
        npx_command: "npx".to_string(),
    }
}

/// Metrics query result whose buckets end with `last`
pub fn metrics_payload(last: f64) -> CallToolResult {
    CallToolResult::text(
        serde_json::json!({
            "results": {
                "results": [{
                    "name": "CpuPercentage",
                    "timeSeries": [{"avgBuckets": [12.0, 18.5, last]}]
                }]
            }
        })
        .to_string(),
    )
}

/// Azure backend whose monitoring tool returns `sample`
pub fn azure_backend(sample: CallToolResult) -> FakeToolClient {
    FakeToolClient::new("azure")
        .with_tools(&["monitor", "resource_list"])
        .with_result("monitor", sample)
}

/// GitHub backend offering the usual pull request tools
pub fn github_backend() -> FakeToolClient {
    FakeToolClient::new("github").with_tools(&[
        "list_commits",
        "create_branch",
        "create_or_update_file",
        "create_pull_request",
    ])
}
