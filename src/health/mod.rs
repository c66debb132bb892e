//! Health classification of sampled metrics

pub mod classifier;

pub use classifier::{HealthClassifier, HealthStatus, HealthVerdict, VerdictBasis};
