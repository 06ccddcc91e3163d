//! Notification dispatch for drift analysis results.
//!
//! GitHub issues and pull requests are reconciled against the latest
//! analysis; stdout and Slack render the same result for humans. Every
//! channel failure is logged and never stops the other channels.

pub mod console;
pub mod github;
pub mod slack;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use config::{DriftiveConfig, DriftiveRepoConfig};
use drift::DriftDetectionResult;
use vcs::Vcs;

use github::issues::GithubIssueNotification;
use github::pulls::GithubPullRequestNotification;
use github::types::GithubState;

/// Carry-over counters handed to Slack after reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftIssuesState {
    pub num_open_issues: usize,
    pub num_resolved_issues: usize,
    pub num_open_error_issues: usize,
    pub num_resolved_error_issues: usize,
    /// False until a reconciliation pass actually ran this invocation.
    pub state_updated: bool,
}

impl DriftIssuesState {
    fn from_github_state(state: &GithubState) -> Self {
        Self {
            num_open_issues: state.drift_issues_open.len(),
            num_resolved_issues: state.drift_issues_resolved.len(),
            num_open_error_issues: state.error_issues_open.len(),
            num_resolved_error_issues: state.error_issues_resolved.len(),
            state_updated: true,
        }
    }
}

/// Fans one analysis result out to every configured channel.
pub struct NotificationHandler {
    config: DriftiveConfig,
    repo_config: DriftiveRepoConfig,
    repo_dir: PathBuf,
    vcs: Arc<dyn Vcs>,
}

impl NotificationHandler {
    pub fn new(
        config: DriftiveConfig,
        repo_config: DriftiveRepoConfig,
        repo_dir: impl Into<PathBuf>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        Self {
            config,
            repo_config,
            repo_dir: repo_dir.into(),
            vcs,
        }
    }

    /// Run every enabled channel against the analysis result.
    pub async fn handle_notifications(&self, analysis_result: &DriftDetectionResult) {
        let mut issues_state = DriftIssuesState::default();

        if self.repo_config.github.issues.enabled && self.config.github_enabled() {
            info!("Updating Github issues...");
            let handler = GithubIssueNotification::new(
                self.repo_config.clone(),
                self.repo_dir.clone(),
                Arc::clone(&self.vcs),
            );
            match handler.handle(analysis_result).await {
                Ok(state) => issues_state = DriftIssuesState::from_github_state(&state),
                Err(err) => error!("Failed to update github issues/summary: {err}"),
            }
        }

        if self.repo_config.github.pull_requests.enabled && self.config.github_enabled() {
            info!("Updating Github pull requests...");
            let handler = GithubPullRequestNotification::new(
                self.repo_config.clone(),
                self.repo_dir.clone(),
                Arc::clone(&self.vcs),
            );
            if let Err(err) = handler.handle(analysis_result).await {
                error!("Failed to update github pull requests: {err}");
            }
        }

        if self.config.stdout_result {
            console::print_result(analysis_result);
        }

        if let Some(url) = &self.config.slack_webhook_url {
            info!("Sending notification to slack...");
            let slack = slack::Slack::new(url.clone(), issues_state);
            if let Err(err) = slack.send(analysis_result).await {
                error!("Failed to send slack notification: {err}");
            }
        }
    }
}
