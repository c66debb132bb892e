//! Shared record of watchdog activity
//!
//! The watchdog writes one `CycleReport` per cycle; the status routes read
//! snapshots.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Summary of one finished cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Outcome label (`healthy`, `inconclusive`, `remediated`, `failed`, ...)
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Set when the cycle ended with an error or a panic
    pub errored: bool,
}

/// Point-in-time view of the board
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusSnapshot {
    pub last_cycle: Option<CycleReport>,
    pub cycles_total: u64,
    pub cycles_errored: u64,
    pub remediations_total: u64,
}

#[derive(Default)]
pub struct StatusBoard {
    inner: RwLock<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: CycleReport) {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.cycles_total += 1;
        if report.errored {
            state.cycles_errored += 1;
        }
        if report.outcome == "remediated" {
            state.remediations_total += 1;
        }
        state.last_cycle = Some(report);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether the most recent cycle errored
    pub fn is_degraded(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_cycle
            .as_ref()
            .map(|report| report.errored)
            .unwrap_or(false)
    }
}
