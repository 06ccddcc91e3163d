//! Drift analysis core.
//!
//! Runs the planning tool of every discovered project under bounded
//! concurrency, classifies the output as drift / no drift, and suppresses
//! findings a human is already fixing through an open pull request.

pub mod detector;
pub mod exec;
pub mod models;
pub mod parsing;
pub mod skip;

pub use detector::DriftDetector;
pub use models::{DriftDetectionResult, DriftProjectResult};
