//! Background watchdog
//!
//! The polling loop that drives the Monitor → Investigate → Remediate
//! escalation, its settings, and the status board it reports to.

pub mod controller;
pub mod settings;
pub mod status;

pub use controller::{CycleOutcome, Watchdog};
pub use settings::{MonitorTarget, WatchdogSettings};
pub use status::{CycleReport, StatusBoard, StatusSnapshot};
