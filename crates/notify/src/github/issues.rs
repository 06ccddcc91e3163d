//! Issue-lane reconciliation.
//!
//! One pass diffs the analysis result against the driftive-managed open
//! issues and converges GitHub on it: resolved projects close their issue
//! (opt-in), drifted and failed projects get one issue each, capped per
//! kind. The initial listing is the only fatal step; individual mutation
//! failures degrade to no-ops.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use config::DriftiveRepoConfig;
use drift::DriftDetectionResult;
use vcs::metadata::IssueKind;
use vcs::types::{GithubIssue, VcsIssue};
use vcs::{Vcs, VcsError};

use super::types::{GithubState, ProjectIssue};
use super::{
    build_object_body, drift_issue_title, error_issue_title, filter_issues,
    project_issues_from_bodies, relative_dir, BodyTemplate,
};
use crate::github::summary::GithubSummaryHandler;

/// Reconciles drift and error issues for one repository.
pub struct GithubIssueNotification {
    repo_config: DriftiveRepoConfig,
    repo_dir: PathBuf,
    vcs: Arc<dyn Vcs>,
}

impl GithubIssueNotification {
    pub fn new(repo_config: DriftiveRepoConfig, repo_dir: PathBuf, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            repo_config,
            repo_dir,
            vcs,
        }
    }

    /// Fetch open issues and reconcile both issue kinds against the
    /// analysis result.
    ///
    /// # Errors
    ///
    /// Only the initial listing is fatal; it aborts the whole pass.
    pub async fn handle(&self, analysis_result: &DriftDetectionResult) -> Result<GithubState, VcsError> {
        let all_open_issues = match self.vcs.get_all_open_issues().await {
            Ok(issues) => issues,
            Err(err) => {
                error!("Failed to get open issues. {err}");
                return Err(err);
            }
        };

        let state = self.handle_issues(analysis_result, &all_open_issues).await;
        info!("Github issues updated");

        if self.repo_config.github.summary.enabled {
            GithubSummaryHandler::new(
                self.repo_config.clone(),
                Arc::clone(&self.vcs),
                all_open_issues,
            )
            .update_summary(&state)
            .await;
        } else {
            info!("Github summary is disabled. Skipping summary update");
        }

        Ok(state)
    }

    /// Reconcile against an already-fetched issue listing.
    pub async fn handle_issues(
        &self,
        drift_result: &DriftDetectionResult,
        all_open_issues: &[VcsIssue],
    ) -> GithubState {
        let managed_open_issues = project_issues_from_bodies(all_open_issues);
        let mut num_open_drift_issues = managed_open_issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Drift)
            .count();
        let mut num_open_error_issues = managed_open_issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Error)
            .count();

        let closeable_drift_issues: Vec<ProjectIssue> = managed_open_issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Drift)
            .filter(|issue| {
                drift_result.project_results.iter().any(|result| {
                    !result.drifted
                        && issue.dir == relative_dir(&self.repo_dir, &result.project.dir)
                })
            })
            .cloned()
            .collect();

        let closeable_error_issues: Vec<ProjectIssue> = managed_open_issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Error)
            .filter(|issue| {
                drift_result.project_results.iter().any(|result| {
                    result.succeeded
                        && issue.dir == relative_dir(&self.repo_dir, &result.project.dir)
                })
            })
            .cloned()
            .collect();

        let closed_drift_issues = self.close_issues(closeable_drift_issues).await;
        info!("Closed {} state-drifted issues", closed_drift_issues.len());
        num_open_drift_issues -= closed_drift_issues.len();

        let mut newly_created_issues: Vec<ProjectIssue> = Vec::new();
        let mut rate_limited_project_dirs: Vec<String> = Vec::new();

        // Drift lane upserts.
        for project_result in &drift_result.project_results {
            if project_result.drifted && !project_result.skipped_due_to_pr {
                let project_dir = relative_dir(&self.repo_dir, &project_result.project.dir);
                let issue = GithubIssue {
                    title: drift_issue_title(&project_dir),
                    body: build_object_body(project_result, &project_dir, BodyTemplate::Drift),
                    labels: self.repo_config.github.issues.labels.clone(),
                    project: project_result.project.clone(),
                    kind: IssueKind::Drift,
                };
                let result = self
                    .vcs
                    .create_or_update_issue(
                        &issue,
                        all_open_issues,
                        num_open_drift_issues >= self.repo_config.github.issues.max_open_issues,
                    )
                    .await;
                if result.created {
                    num_open_drift_issues += 1;
                    if let Some(created) = result.issue {
                        newly_created_issues.push(ProjectIssue {
                            dir: project_dir.clone(),
                            issue: created,
                            kind: IssueKind::Drift,
                        });
                    }
                }
                if result.rate_limited {
                    rate_limited_project_dirs.push(project_dir);
                }
            } else if project_result.drifted && project_result.skipped_due_to_pr {
                info!(
                    "Skipping drift notification for {} due to open PRs",
                    project_result.project.dir.display()
                );
            }
        }

        let closed_error_issues = self.close_issues(closeable_error_issues).await;
        info!("Closed {} errored issues", closed_error_issues.len());
        num_open_error_issues -= closed_error_issues.len();

        // Error lane upserts.
        if self.repo_config.github.issues.errors.enabled {
            for project_result in &drift_result.project_results {
                if project_result.succeeded {
                    continue;
                }
                let project_dir = relative_dir(&self.repo_dir, &project_result.project.dir);
                let issue = GithubIssue {
                    title: error_issue_title(&project_dir),
                    body: build_object_body(project_result, &project_dir, BodyTemplate::Error),
                    labels: self.repo_config.github.issues.errors.labels.clone(),
                    project: project_result.project.clone(),
                    kind: IssueKind::Error,
                };
                let result = self
                    .vcs
                    .create_or_update_issue(
                        &issue,
                        all_open_issues,
                        num_open_error_issues
                            >= self.repo_config.github.issues.errors.max_open_issues,
                    )
                    .await;
                if result.created {
                    num_open_error_issues += 1;
                    if let Some(created) = result.issue {
                        newly_created_issues.push(ProjectIssue {
                            dir: project_dir,
                            issue: created,
                            kind: IssueKind::Error,
                        });
                    }
                }
            }
        }

        let mut current_open_issues = managed_open_issues;
        current_open_issues.extend(newly_created_issues);

        let drift_issues_open = filter_issues(
            current_open_issues
                .iter()
                .filter(|issue| issue.kind == IssueKind::Drift)
                .cloned()
                .collect(),
            &closed_drift_issues,
        );
        let error_issues_open = filter_issues(
            current_open_issues
                .iter()
                .filter(|issue| issue.kind == IssueKind::Error)
                .cloned()
                .collect(),
            &closed_error_issues,
        );

        GithubState {
            drift_issues_open,
            drift_issues_resolved: closed_drift_issues,
            error_issues_open,
            error_issues_resolved: closed_error_issues,
            rate_limited_drifts: rate_limited_project_dirs,
            ..GithubState::default()
        }
    }

    /// Close resolved issues, honoring the `close_resolved` opt-in.
    ///
    /// A close counts only when both the resolution comment and the state
    /// transition succeed; anything else leaves the issue in the open set.
    async fn close_issues(&self, issues: Vec<ProjectIssue>) -> Vec<ProjectIssue> {
        if !self.repo_config.github.issues.close_resolved && !issues.is_empty() {
            warn!("Note: There are GH drift issues but driftive is not configured to close them.");
            return Vec::new();
        }

        let mut closed_issues = Vec::new();
        for project_issue in issues {
            if self.close_issue_with_comment(&project_issue).await {
                closed_issues.push(project_issue);
            }
        }
        closed_issues
    }

    async fn close_issue_with_comment(&self, project_issue: &ProjectIssue) -> bool {
        info!(
            "Closing issue [{}] for project {}",
            project_issue.kind, project_issue.dir
        );

        if let Err(err) = self.vcs.create_issue_comment(project_issue.issue.number).await {
            warn!(
                "Failed to comment on issue #{}: {err}. Leaving it open.",
                project_issue.issue.number
            );
            return false;
        }

        if let Err(err) = self.vcs.close_issue(project_issue.issue.number).await {
            error!("Failed to close issue #{}: {err}", project_issue.issue.number);
            return false;
        }

        info!(
            "Closed issue [{}] for project {}",
            project_issue.kind, project_issue.dir
        );
        true
    }
}
