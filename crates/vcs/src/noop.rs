//! No-op VCS stub for runs without tracking configured.

use async_trait::async_trait;

use crate::types::{
    CreateOrUpdateIssueResult, CreateOrUpdatePullRequestResult, GithubIssue, GithubPullRequest,
    VcsIssue, VcsPullRequest,
};
use crate::{Vcs, VcsError};

/// Implements [`Vcs`] with empty listings and no-op mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVcs;

impl NoopVcs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Vcs for NoopVcs {
    async fn get_all_open_issues(&self) -> Result<Vec<VcsIssue>, VcsError> {
        Ok(Vec::new())
    }

    async fn get_all_open_prs(&self) -> Result<Vec<VcsPullRequest>, VcsError> {
        Ok(Vec::new())
    }

    async fn get_changed_files_for_open_prs(
        &self,
        _prs: &[VcsPullRequest],
    ) -> Result<Vec<String>, VcsError> {
        Ok(Vec::new())
    }

    async fn create_or_update_issue(
        &self,
        _issue: &GithubIssue,
        _open_issues: &[VcsIssue],
        _update_only: bool,
    ) -> CreateOrUpdateIssueResult {
        CreateOrUpdateIssueResult::default()
    }

    async fn create_issue_comment(&self, _issue_number: u64) -> Result<(), VcsError> {
        Ok(())
    }

    async fn close_issue(&self, _issue_number: u64) -> Result<(), VcsError> {
        Ok(())
    }

    async fn branch_exists(&self, _branch_name: &str) -> Result<bool, VcsError> {
        Ok(false)
    }

    async fn create_branch(&self, _branch_name: &str) -> Result<(), VcsError> {
        Ok(())
    }

    async fn add_file_to_branch(
        &self,
        _branch_name: &str,
        _file_path: &str,
        _content: &str,
        _commit_message: &str,
    ) -> Result<(), VcsError> {
        Ok(())
    }

    async fn create_or_update_pull_request(
        &self,
        _pull_request: &GithubPullRequest,
        _update_only: bool,
    ) -> CreateOrUpdatePullRequestResult {
        CreateOrUpdatePullRequestResult::default()
    }

    async fn create_pull_request_comment(
        &self,
        _pull_request_number: u64,
        _comment: &str,
    ) -> Result<(), VcsError> {
        Ok(())
    }

    async fn close_pull_request(&self, _pull_request_number: u64) -> Result<(), VcsError> {
        Ok(())
    }
}
