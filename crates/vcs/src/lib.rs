//! VCS collaborator layer.
//!
//! The reconciliation engine talks to the tracking system exclusively
//! through the [`Vcs`] trait. [`github::GithubVcs`] is the concrete
//! provider; [`noop::NoopVcs`] stands in when no tracking is configured, so
//! the analysis can still run and print results.

pub mod github;
pub mod metadata;
pub mod noop;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use config::{DriftiveConfig, DriftiveRepoConfig};

use types::{
    CreateOrUpdateIssueResult, CreateOrUpdatePullRequestResult, GithubIssue, GithubPullRequest,
    VcsIssue, VcsPullRequest,
};

/// Errors from talking to the tracking system.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Transport-level failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The configured repository is not `owner/name`.
    #[error("invalid repository name")]
    InvalidRepository,
}

/// Operations the reconciliation engine needs from a tracking system.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// All open issues of the repository.
    async fn get_all_open_issues(&self) -> Result<Vec<VcsIssue>, VcsError>;

    /// All open pull requests of the repository.
    async fn get_all_open_prs(&self) -> Result<Vec<VcsPullRequest>, VcsError>;

    /// Changed file paths (relative to the repository root) across the
    /// given open pull requests.
    async fn get_changed_files_for_open_prs(
        &self,
        prs: &[VcsPullRequest],
    ) -> Result<Vec<String>, VcsError>;

    /// Upsert an issue: no-op on identical body, in-place body update on a
    /// title match, refusal when `update_only` is set, creation otherwise.
    async fn create_or_update_issue(
        &self,
        issue: &GithubIssue,
        open_issues: &[VcsIssue],
        update_only: bool,
    ) -> CreateOrUpdateIssueResult;

    /// Post the resolution comment on an issue.
    async fn create_issue_comment(&self, issue_number: u64) -> Result<(), VcsError>;

    async fn close_issue(&self, issue_number: u64) -> Result<(), VcsError>;

    async fn branch_exists(&self, branch_name: &str) -> Result<bool, VcsError>;

    async fn create_branch(&self, branch_name: &str) -> Result<(), VcsError>;

    /// Commit a single file to a branch.
    async fn add_file_to_branch(
        &self,
        branch_name: &str,
        file_path: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), VcsError>;

    /// Create a remediation pull request (branch, marker commit, PR,
    /// labels), or refuse when `update_only` is set.
    async fn create_or_update_pull_request(
        &self,
        pull_request: &GithubPullRequest,
        update_only: bool,
    ) -> CreateOrUpdatePullRequestResult;

    async fn create_pull_request_comment(
        &self,
        pull_request_number: u64,
        comment: &str,
    ) -> Result<(), VcsError>;

    async fn close_pull_request(&self, pull_request_number: u64) -> Result<(), VcsError>;
}

/// Pick the provider for this run: GitHub when a token and a valid Actions
/// context are present, the no-op stub otherwise.
pub fn new_vcs(
    config: &DriftiveConfig,
    repo_config: &DriftiveRepoConfig,
) -> Result<Box<dyn Vcs>, VcsError> {
    match (&config.github_token, &config.github_context) {
        (Some(token), Some(ctx)) if ctx.is_valid() => Ok(Box::new(github::GithubVcs::new(
            token,
            ctx,
            repo_config.clone(),
        )?)),
        _ => Ok(Box::new(noop::NoopVcs::new())),
    }
}
