//! Watchdog settings
//!
//! What to sample and how often. Monitoring coordinates may be absent; the
//! watchdog then skips its cycles until they are configured.

use std::time::Duration;

use crate::config::{
    Config, DEFAULT_HEALTH_THRESHOLD, DEFAULT_INCONCLUSIVE_MARKER, DEFAULT_POLL_INTERVAL_SECONDS,
};
use crate::mcp::types::ToolArgs;

/// Configuration for the watchdog loop
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub target_resource: Option<String>,
    pub resource_type: String,
    pub metric_namespace: String,
    pub metric_name: String,
    pub metric_interval: String,
    pub metric_timespan: String,
    pub metric_aggregation: String,
    /// Tool invoked on the Azure backend to sample metrics
    pub monitor_tool: String,
    /// Delay between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    pub health_threshold: f64,
    pub inconclusive_marker: String,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            tenant_id: None,
            subscription_id: None,
            resource_group: None,
            target_resource: None,
            resource_type: "Microsoft.Web/serverfarms".to_string(),
            metric_namespace: "Microsoft.Web/serverfarms".to_string(),
            metric_name: "CpuPercentage".to_string(),
            metric_interval: "PT5M".to_string(),
            metric_timespan: "PT1H".to_string(),
            metric_aggregation: "Average".to_string(),
            monitor_tool: "monitor".to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
            inconclusive_marker: DEFAULT_INCONCLUSIVE_MARKER.to_string(),
        }
    }
}

/// Fully resolved coordinates of the monitored resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorTarget<'a> {
    pub tenant_id: &'a str,
    pub subscription_id: &'a str,
    pub resource_group: &'a str,
    pub resource: &'a str,
}

impl WatchdogSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tenant_id: config.tenant_id.clone(),
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
            target_resource: config.target_resource.clone(),
            resource_type: config.resource_type.clone(),
            metric_namespace: config.metric_namespace.clone(),
            metric_name: config.metric_name.clone(),
            metric_interval: config.metric_interval.clone(),
            metric_timespan: config.metric_timespan.clone(),
            metric_aggregation: config.metric_aggregation.clone(),
            monitor_tool: config.monitor_tool.clone(),
            poll_interval: config.poll_interval(),
            health_threshold: config.health_threshold,
            inconclusive_marker: config.inconclusive_marker.clone(),
        }
    }

    /// Resolve the monitored resource, or name every missing setting
    pub fn target(&self) -> Result<MonitorTarget<'_>, Vec<&'static str>> {
        match (
            self.tenant_id.as_deref(),
            self.subscription_id.as_deref(),
            self.resource_group.as_deref(),
            self.target_resource.as_deref(),
        ) {
            (Some(tenant_id), Some(subscription_id), Some(resource_group), Some(resource)) => {
                Ok(MonitorTarget {
                    tenant_id,
                    subscription_id,
                    resource_group,
                    resource,
                })
            }
            _ => Err([
                (&self.tenant_id, "AZURE_TENANT_ID"),
                (&self.subscription_id, "AZURE_SUBSCRIPTION_ID"),
                (&self.resource_group, "OPSWATCH_RESOURCE_GROUP"),
                (&self.target_resource, "OPSWATCH_TARGET_RESOURCE"),
            ]
            .into_iter()
            .filter(|(value, _)| value.is_none())
            .map(|(_, name)| name)
            .collect()),
        }
    }

    /// Arguments of the metrics query sent to the monitoring tool
    pub fn monitor_args(&self, target: &MonitorTarget<'_>) -> ToolArgs {
        let mut parameters = ToolArgs::new();
        parameters.insert("subscription".to_string(), target.subscription_id.into());
        parameters.insert("tenant".to_string(), target.tenant_id.into());
        parameters.insert("resource-group".to_string(), target.resource_group.into());
        parameters.insert("resource-type".to_string(), self.resource_type.clone().into());
        parameters.insert("resource".to_string(), target.resource.into());
        parameters.insert("metric-names".to_string(), self.metric_name.clone().into());
        parameters.insert(
            "metric-namespace".to_string(),
            self.metric_namespace.clone().into(),
        );
        parameters.insert("interval".to_string(), self.metric_interval.clone().into());
        parameters.insert(
            "aggregation".to_string(),
            self.metric_aggregation.clone().into(),
        );
        parameters.insert("timespan".to_string(), self.metric_timespan.clone().into());

        let mut args = ToolArgs::new();
        args.insert("intent".to_string(), "metrics".into());
        args.insert("command".to_string(), "monitor_metrics_query".into());
        args.insert("parameters".to_string(), parameters.into());
        args
    }
}
