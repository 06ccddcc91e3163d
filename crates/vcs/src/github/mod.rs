//! GitHub REST provider.

mod issues;
mod pulls;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use config::{DriftiveRepoConfig, GithubActionContext};

use crate::VcsError;

/// Public GitHub API endpoint.
const GITHUB_API_URL: &str = "https://api.github.com";

/// Page size used for all listing calls.
const PER_PAGE: usize = 100;

/// GitHub implementation of the [`crate::Vcs`] trait.
#[derive(Debug, Clone)]
pub struct GithubVcs {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    repo_config: DriftiveRepoConfig,
}

/// Issue shape returned by the GitHub API.
#[derive(Debug, Deserialize)]
pub(crate) struct IssueDto {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
}

/// Pull request shape returned by the GitHub API.
#[derive(Debug, Deserialize)]
pub(crate) struct PullDto {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
}

impl GithubVcs {
    /// Build a client for the repository named by the Actions context.
    ///
    /// # Errors
    ///
    /// Fails when the repository is not `owner/name` or the token cannot be
    /// used as a header value.
    pub fn new(
        token: &str,
        context: &GithubActionContext,
        repo_config: DriftiveRepoConfig,
    ) -> Result<Self, VcsError> {
        let parts: Vec<&str> = context.repository.split('/').collect();
        let [owner, repo] = parts.as_slice() else {
            return Err(VcsError::InvalidRepository);
        };
        if owner.is_empty() || repo.is_empty() {
            return Err(VcsError::InvalidRepository);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| VcsError::InvalidRepository)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("driftive"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            repo_config,
        })
    }

    /// Point the client at a different API root (tests, GitHub Enterprise).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn repo_config(&self) -> &DriftiveRepoConfig {
        &self.repo_config
    }

    /// `owner/name` of the tracked repository.
    pub fn repo_path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, path
        )
    }

    /// Turn a non-success response into [`VcsError::Api`].
    pub(crate) async fn checked(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, VcsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(VcsError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl crate::Vcs for GithubVcs {
    async fn get_all_open_issues(&self) -> Result<Vec<crate::types::VcsIssue>, VcsError> {
        self.list_open_issues().await
    }

    async fn get_all_open_prs(&self) -> Result<Vec<crate::types::VcsPullRequest>, VcsError> {
        self.list_open_prs().await
    }

    async fn get_changed_files_for_open_prs(
        &self,
        prs: &[crate::types::VcsPullRequest],
    ) -> Result<Vec<String>, VcsError> {
        self.changed_files_for_prs(prs).await
    }

    async fn create_or_update_issue(
        &self,
        issue: &crate::types::GithubIssue,
        open_issues: &[crate::types::VcsIssue],
        update_only: bool,
    ) -> crate::types::CreateOrUpdateIssueResult {
        self.upsert_issue(issue, open_issues, update_only).await
    }

    async fn create_issue_comment(&self, issue_number: u64) -> Result<(), VcsError> {
        self.comment_issue_resolved(issue_number).await
    }

    async fn close_issue(&self, issue_number: u64) -> Result<(), VcsError> {
        self.close_issue_by_number(issue_number).await
    }

    async fn branch_exists(&self, branch_name: &str) -> Result<bool, VcsError> {
        self.ref_exists(branch_name).await
    }

    async fn create_branch(&self, branch_name: &str) -> Result<(), VcsError> {
        self.create_branch_from_base(branch_name).await
    }

    async fn add_file_to_branch(
        &self,
        branch_name: &str,
        file_path: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), VcsError> {
        self.commit_file_to_branch(branch_name, file_path, content, commit_message)
            .await
    }

    async fn create_or_update_pull_request(
        &self,
        pull_request: &crate::types::GithubPullRequest,
        update_only: bool,
    ) -> crate::types::CreateOrUpdatePullRequestResult {
        self.upsert_pull_request(pull_request, update_only).await
    }

    async fn create_pull_request_comment(
        &self,
        pull_request_number: u64,
        comment: &str,
    ) -> Result<(), VcsError> {
        self.comment_pull_request(pull_request_number, comment).await
    }

    async fn close_pull_request(&self, pull_request_number: u64) -> Result<(), VcsError> {
        self.close_pull_request_by_number(pull_request_number).await
    }
}
