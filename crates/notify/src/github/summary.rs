//! Summary issue.
//!
//! One pinned-style issue aggregating the latest reconciliation state. The
//! issue is found by its configured title and edited in place; its body
//! leads with the serialized state inside an HTML comment so later tooling
//! can read it back.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use config::{DriftiveRepoConfig, Project, ProjectKind};
use vcs::metadata::IssueKind;
use vcs::types::{GithubIssue, VcsIssue};
use vcs::Vcs;

use super::types::{GithubState, ProjectIssue};
use super::TEMPLATES;

/// Serialized into the summary issue body.
#[derive(Debug, Serialize)]
struct GithubSummary {
    rate_limited_projects: Vec<String>,
    drifted_projects: Vec<ProjectIssue>,
    errored_projects: Vec<ProjectIssue>,
    last_analysis_date: String,
}

/// Creates or updates the summary issue after a reconciliation pass.
pub struct GithubSummaryHandler {
    repo_config: DriftiveRepoConfig,
    vcs: Arc<dyn Vcs>,
    all_open_issues: Vec<VcsIssue>,
}

impl GithubSummaryHandler {
    pub fn new(
        repo_config: DriftiveRepoConfig,
        vcs: Arc<dyn Vcs>,
        all_open_issues: Vec<VcsIssue>,
    ) -> Self {
        Self {
            repo_config,
            vcs,
            all_open_issues,
        }
    }

    /// Render the state and upsert the summary issue. Failures are logged;
    /// the summary is best-effort and never fails the run.
    pub async fn update_summary(&self, state: &GithubState) {
        info!("Updating Github summary issue...");

        let summary = GithubSummary {
            rate_limited_projects: state.rate_limited_drifts.clone(),
            drifted_projects: state.drift_issues_open.clone(),
            errored_projects: state.error_issues_open.clone(),
            last_analysis_date: Utc::now().to_rfc3339(),
        };

        let Some(body) = render_summary_body(&summary) else {
            return;
        };

        let issue = GithubIssue {
            title: self.repo_config.github.summary.issue_title.clone(),
            body,
            labels: Vec::new(),
            // The summary is not bound to a project; the placeholder is
            // only ever used for logging inside the adapter.
            project: Project::new("", ProjectKind::Terraform),
            kind: IssueKind::Drift,
        };

        let result = self
            .vcs
            .create_or_update_issue(&issue, &self.all_open_issues, false)
            .await;
        if result.created {
            info!("Created Github summary issue");
        } else {
            info!("Github summary issue updated");
        }
    }
}

fn render_summary_body(summary: &GithubSummary) -> Option<String> {
    let state_json = match serde_json::to_string(summary) {
        Ok(json) => json,
        Err(err) => {
            error!("Failed to marshal github summary: {err}");
            return None;
        }
    };

    let data = json!({
        "state_json": state_json,
        "last_analysis_date": summary.last_analysis_date,
        "drifted_projects": summary.drifted_projects,
        "drifted_count": summary.drifted_projects.len(),
        "errored_projects": summary.errored_projects,
        "errored_count": summary.errored_projects.len(),
        "rate_limited_projects": summary.rate_limited_projects,
        "rate_limited_count": summary.rate_limited_projects.len(),
    });

    match TEMPLATES.render("gh-summary", &data) {
        Ok(body) => Some(body),
        Err(err) => {
            error!("Failed to render github summary template: {err}");
            None
        }
    }
}
