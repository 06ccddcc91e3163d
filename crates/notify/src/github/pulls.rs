//! Pull-request-lane reconciliation.
//!
//! Same protocol as the issue lane, drift kind only: resolved projects
//! close their remediation PR (opt-in), drifted projects get one PR each
//! under the open cap. Branch and marker-file side effects live in the VCS
//! adapter.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use config::DriftiveRepoConfig;
use drift::DriftDetectionResult;
use vcs::metadata::IssueKind;
use vcs::types::{GithubPullRequest, VcsPullRequest};
use vcs::{Vcs, VcsError};

use super::types::{GithubState, ProjectPullRequest};
use super::{build_object_body, project_prs_from_bodies, relative_dir, BodyTemplate};

/// Reconciles drift remediation pull requests for one repository.
pub struct GithubPullRequestNotification {
    repo_config: DriftiveRepoConfig,
    repo_dir: PathBuf,
    vcs: Arc<dyn Vcs>,
}

impl GithubPullRequestNotification {
    pub fn new(repo_config: DriftiveRepoConfig, repo_dir: PathBuf, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            repo_config,
            repo_dir,
            vcs,
        }
    }

    /// Fetch open pull requests and reconcile the drift lane against the
    /// analysis result.
    ///
    /// # Errors
    ///
    /// Only the initial listing is fatal.
    pub async fn handle(&self, analysis_result: &DriftDetectionResult) -> Result<GithubState, VcsError> {
        let all_open_prs = match self.vcs.get_all_open_prs().await {
            Ok(prs) => prs,
            Err(err) => {
                error!("Failed to get open pull requests. {err}");
                return Err(err);
            }
        };

        let state = self.handle_pull_requests(analysis_result, &all_open_prs).await;
        debug!("Github pull requests updated");
        Ok(state)
    }

    /// Reconcile against an already-fetched pull request listing.
    pub async fn handle_pull_requests(
        &self,
        drift_result: &DriftDetectionResult,
        all_open_prs: &[VcsPullRequest],
    ) -> GithubState {
        let managed_open_prs = project_prs_from_bodies(all_open_prs);
        let mut num_open_drift_prs = managed_open_prs
            .iter()
            .filter(|pr| pr.kind == IssueKind::Drift)
            .count();

        let closeable_prs: Vec<ProjectPullRequest> = managed_open_prs
            .iter()
            .filter(|pr| pr.kind == IssueKind::Drift)
            .filter(|pr| {
                drift_result.project_results.iter().any(|result| {
                    !result.drifted && pr.dir == relative_dir(&self.repo_dir, &result.project.dir)
                })
            })
            .cloned()
            .collect();

        let closed_prs = self.close_pull_requests(closeable_prs).await;
        info!("Closed {} drift remediation pull requests", closed_prs.len());
        num_open_drift_prs -= closed_prs.len();

        let mut newly_created_prs: Vec<ProjectPullRequest> = Vec::new();
        let mut rate_limited_project_dirs: Vec<String> = Vec::new();

        for project_result in &drift_result.project_results {
            if project_result.drifted && !project_result.skipped_due_to_pr {
                let project_dir = relative_dir(&self.repo_dir, &project_result.project.dir);

                // An open remediation PR for this project is left alone;
                // recreating its branch would only churn the repository.
                if managed_open_prs
                    .iter()
                    .any(|pr| pr.kind == IssueKind::Drift && pr.dir == project_dir)
                {
                    debug!("Remediation PR already open for {project_dir}");
                    continue;
                }

                let now = Utc::now();
                let pull_request = GithubPullRequest {
                    title: format!("Drift remediation for {project_dir}"),
                    body: build_object_body(project_result, &project_dir, BodyTemplate::Drift),
                    labels: self.repo_config.github.pull_requests.labels.clone(),
                    branch: format!(
                        "{}-{}-{}",
                        self.repo_config.github.pull_requests.branch_name_prefix,
                        now.format("%Y%m%d%H%M%S"),
                        project_dir.replace('/', "-"),
                    ),
                    base: self.repo_config.github.pull_requests.base_branch.clone(),
                    project: project_result.project.clone(),
                    kind: IssueKind::Drift,
                    time: now,
                };

                let result = self
                    .vcs
                    .create_or_update_pull_request(
                        &pull_request,
                        num_open_drift_prs
                            >= self.repo_config.github.pull_requests.max_open_pull_requests,
                    )
                    .await;
                if result.created {
                    num_open_drift_prs += 1;
                    if let Some(created) = result.pull_request {
                        info!(
                            "Created pull request for drift remediation for project {}: {}",
                            project_dir, created.url
                        );
                        newly_created_prs.push(ProjectPullRequest {
                            dir: project_dir.clone(),
                            pr: created,
                            kind: IssueKind::Drift,
                        });
                    }
                }
                if result.rate_limited {
                    rate_limited_project_dirs.push(project_dir);
                }
            } else if project_result.drifted && project_result.skipped_due_to_pr {
                info!(
                    "Skipping pull request creation for {} due to open PRs",
                    project_result.project.dir.display()
                );
            }
        }

        let mut open_prs = managed_open_prs;
        open_prs.extend(newly_created_prs);
        let drift_pull_requests_open = open_prs
            .into_iter()
            .filter(|pr| {
                !closed_prs
                    .iter()
                    .any(|closed| closed.dir == pr.dir && closed.kind == pr.kind)
            })
            .collect();

        GithubState {
            drift_pull_requests_open,
            drift_pull_requests_resolved: closed_prs,
            rate_limited_drifts: rate_limited_project_dirs,
            ..GithubState::default()
        }
    }

    async fn close_pull_requests(
        &self,
        pull_requests: Vec<ProjectPullRequest>,
    ) -> Vec<ProjectPullRequest> {
        if !self.repo_config.github.pull_requests.close_resolved && !pull_requests.is_empty() {
            warn!(
                "Note: There are GH drift pull requests but driftive is not configured to close them."
            );
            return Vec::new();
        }

        let mut closed = Vec::new();
        for project_pr in pull_requests {
            if self.close_pull_request_with_comment(&project_pr).await {
                closed.push(project_pr);
            }
        }
        closed
    }

    async fn close_pull_request_with_comment(&self, project_pr: &ProjectPullRequest) -> bool {
        info!(
            "Closing pull request #{} for project {}",
            project_pr.pr.number, project_pr.dir
        );

        if let Err(err) = self
            .vcs
            .create_pull_request_comment(
                project_pr.pr.number,
                "Drift has been resolved. Closing pull request.",
            )
            .await
        {
            warn!(
                "Failed to comment on pull request #{}: {err}. Leaving it open.",
                project_pr.pr.number
            );
            return false;
        }

        if let Err(err) = self.vcs.close_pull_request(project_pr.pr.number).await {
            error!(
                "Failed to close pull request #{}: {err}",
                project_pr.pr.number
            );
            return false;
        }

        true
    }
}
