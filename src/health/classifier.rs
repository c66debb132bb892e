//! Metric sample classification
//!
//! Turns the raw result of the monitoring tool into a health verdict.
//! Classification never fails: a sample the classifier cannot make sense of
//! is judged by whether the evidence mentions the target at all, and an
//! absent or empty sample is unhealthy.

use serde::Serialize;
use serde_json::Value;

use crate::config::DEFAULT_HEALTH_THRESHOLD;
use crate::mcp::types::CallToolResult;

/// Location of the first time series in a metrics query result
const TIME_SERIES_POINTER: &str = "/results/results/0/timeSeries/0";

/// Health of the monitored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// How a verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictBasis {
    /// The sample was absent or had no content
    Empty,
    /// The last bucket value was compared against the threshold
    Threshold { value: f64 },
    /// The evidence was searched for the target name
    Presence,
}

/// Outcome of classifying one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthVerdict {
    pub status: HealthStatus,
    /// Flattened sample text the verdict was based on
    pub evidence: String,
    pub basis: VerdictBasis,
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Classifies metric samples against a threshold
#[derive(Debug, Clone, Copy)]
pub struct HealthClassifier {
    threshold: f64,
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_THRESHOLD)
    }
}

impl HealthClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify a sample taken for `target`
    pub fn classify(&self, sample: Option<&CallToolResult>, target: &str) -> HealthVerdict {
        let sample = match sample {
            Some(sample) if !sample.content.is_empty() => sample,
            _ => {
                return HealthVerdict {
                    status: HealthStatus::Unhealthy,
                    evidence: String::new(),
                    basis: VerdictBasis::Empty,
                }
            }
        };

        let evidence = sample.flatten();

        if let Some(value) = last_bucket_value(&evidence) {
            let status = if value < self.threshold {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            };
            return HealthVerdict {
                status,
                evidence,
                basis: VerdictBasis::Threshold { value },
            };
        }

        let status = if evidence.contains(target) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        HealthVerdict {
            status,
            evidence,
            basis: VerdictBasis::Presence,
        }
    }
}

/// Most recent value of the first time series, if the evidence has one
///
/// `avgBuckets` takes precedence over `data[].average`.
fn last_bucket_value(evidence: &str) -> Option<f64> {
    let parsed: Value = serde_json::from_str(evidence).ok()?;
    let series = parsed.pointer(TIME_SERIES_POINTER)?;

    if let Some(value) = series
        .get("avgBuckets")
        .and_then(Value::as_array)
        .and_then(|buckets| buckets.last())
        .and_then(Value::as_f64)
    {
        return Some(value);
    }

    series
        .get("data")
        .and_then(Value::as_array)
        .and_then(|records| records.last())
        .and_then(|record| record.get("average"))
        .and_then(Value::as_f64)
}
