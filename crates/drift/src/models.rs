//! Result types produced by one drift analysis run.

use std::time::Duration;

use config::Project;
use serde::Serialize;

/// Outcome of analyzing a single project.
#[derive(Debug, Clone, Serialize)]
pub struct DriftProjectResult {
    pub project: Project,
    pub drifted: bool,
    /// True if the analysis itself succeeded, even if the project drifted.
    pub succeeded: bool,
    pub init_output: String,
    pub plan_output: String,
    /// True if the drift was skipped because an open PR already modifies
    /// the drifted files.
    pub skipped_due_to_pr: bool,
}

/// Aggregate outcome of one analysis batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftDetectionResult {
    pub project_results: Vec<DriftProjectResult>,
    pub total_drifted: usize,
    pub total_projects: usize,
    pub total_checked: usize,
    #[serde(skip)]
    pub duration: Duration,
}

impl DriftDetectionResult {
    /// Drifted projects that were not suppressed by an open PR.
    pub fn unsuppressed_drifts(&self) -> impl Iterator<Item = &DriftProjectResult> {
        self.project_results
            .iter()
            .filter(|r| r.drifted && !r.skipped_due_to_pr)
    }
}
