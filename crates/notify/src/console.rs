//! Stdout reporting of the analysis result.

use tracing::info;

use drift::DriftDetectionResult;

/// Print the drift summary. Silent when nothing drifted.
pub fn print_result(drift_result: &DriftDetectionResult) {
    if drift_result.total_drifted == 0 {
        return;
    }
    info!("============================================");
    info!("Analysis completed in {:?}", drift_result.duration);
    info!("State Drift detected in projects");
    info!(
        "Drifts {} out of {} total projects",
        drift_result.total_drifted, drift_result.total_projects
    );
    info!("Projects with state drift:");
    for project in drift_result.unsuppressed_drifts() {
        info!("Project: {}", project.project.dir.display());
    }
    info!("============================================");
}
