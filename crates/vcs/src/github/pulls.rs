//! Pull request and branch operations of the GitHub provider.

use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::types::{CreateOrUpdatePullRequestResult, GithubPullRequest, VcsPullRequest};
use crate::VcsError;

use super::{GithubVcs, PullDto, PER_PAGE};

/// File entry of the PR files listing.
#[derive(Debug, Deserialize)]
struct PullFileDto {
    filename: String,
}

/// Git reference shape returned by the GitHub API.
#[derive(Debug, Deserialize)]
struct RefDto {
    object: RefObjectDto,
}

#[derive(Debug, Deserialize)]
struct RefObjectDto {
    sha: String,
}

impl GithubVcs {
    fn to_vcs_pull_request(pr: PullDto) -> VcsPullRequest {
        VcsPullRequest {
            number: pr.number,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            state: pr.state,
            url: pr.html_url,
        }
    }

    pub(crate) async fn list_open_prs(&self) -> Result<Vec<VcsPullRequest>, VcsError> {
        info!("Fetching all open pull requests from the repository...");
        let mut open_prs = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .client()
                .get(self.url("pulls"))
                .query(&[
                    ("state", "open"),
                    ("per_page", &PER_PAGE.to_string()),
                    ("page", &page.to_string()),
                ])
                .send()
                .await?;
            let batch: Vec<PullDto> = Self::checked("list pull requests", response)
                .await?
                .json()
                .await?;
            let batch_len = batch.len();
            open_prs.extend(batch.into_iter().map(Self::to_vcs_pull_request));
            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }
        info!("Fetched {} open pull requests", open_prs.len());
        Ok(open_prs)
    }

    pub(crate) async fn changed_files_for_prs(
        &self,
        prs: &[VcsPullRequest],
    ) -> Result<Vec<String>, VcsError> {
        info!("Fetching changed files for all open pull requests...");
        let mut changed_files = Vec::new();
        for pr in prs {
            match self.changed_files(pr.number).await {
                Ok(files) => changed_files.extend(files),
                Err(err) => {
                    // One unreadable PR must not hide the others.
                    error!("Failed to get changed files for PR {}: {err}", pr.number);
                }
            }
        }
        info!("Found {} changed files", changed_files.len());
        Ok(changed_files)
    }

    async fn changed_files(&self, pr_number: u64) -> Result<Vec<String>, VcsError> {
        let mut files = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .client()
                .get(self.url(&format!("pulls/{pr_number}/files")))
                .query(&[
                    ("per_page", &PER_PAGE.to_string()),
                    ("page", &page.to_string()),
                ])
                .send()
                .await?;
            let batch: Vec<PullFileDto> = Self::checked("list pull request files", response)
                .await?
                .json()
                .await?;
            let batch_len = batch.len();
            files.extend(batch.into_iter().map(|f| f.filename));
            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    pub(crate) async fn ref_exists(&self, branch_name: &str) -> Result<bool, VcsError> {
        let response = self
            .client()
            .get(self.url(&format!("git/ref/heads/{branch_name}")))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        Self::checked("get branch ref", response).await?;
        Ok(true)
    }

    pub(crate) async fn create_branch_from_base(&self, branch_name: &str) -> Result<(), VcsError> {
        let base_branch = &self.repo_config().github.pull_requests.base_branch;

        let response = self
            .client()
            .get(self.url(&format!("git/ref/heads/{base_branch}")))
            .send()
            .await?;
        let base_ref: RefDto = Self::checked("get base branch ref", response)
            .await?
            .json()
            .await?;

        let response = self
            .client()
            .post(self.url("git/refs"))
            .json(&json!({
                "ref": format!("refs/heads/{branch_name}"),
                "sha": base_ref.object.sha,
            }))
            .send()
            .await?;
        Self::checked("create branch", response).await?;
        debug!(
            "Created branch {branch_name} in repository {}",
            self.repo_path()
        );
        Ok(())
    }

    async fn delete_branch(&self, branch_name: &str) -> Result<(), VcsError> {
        let response = self
            .client()
            .delete(self.url(&format!("git/refs/heads/{branch_name}")))
            .send()
            .await?;
        Self::checked("delete branch", response).await?;
        Ok(())
    }

    pub(crate) async fn commit_file_to_branch(
        &self,
        branch_name: &str,
        file_path: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), VcsError> {
        let encoded_path = urlencoding::encode(file_path);
        let response = self
            .client()
            .put(self.url(&format!("contents/{encoded_path}")))
            .json(&json!({
                "message": commit_message,
                "content": base64::engine::general_purpose::STANDARD.encode(content),
                "branch": branch_name,
            }))
            .send()
            .await?;
        Self::checked("add file to branch", response).await?;
        debug!(
            "Added file {file_path} to branch {branch_name} in repository {}",
            self.repo_path()
        );
        Ok(())
    }

    pub(crate) async fn upsert_pull_request(
        &self,
        driftive_pr: &GithubPullRequest,
        update_only: bool,
    ) -> CreateOrUpdatePullRequestResult {
        if update_only {
            warn!(
                "Max number of open pull requests reached. Skipping pull request creation for project {} (repo: {})",
                driftive_pr.project.dir.display(),
                self.repo_path()
            );
            return CreateOrUpdatePullRequestResult {
                created: false,
                rate_limited: true,
                pull_request: None,
            };
        }

        match self.ref_exists(&driftive_pr.branch).await {
            Ok(true) => {
                debug!("Branch {} already exists", driftive_pr.branch);
            }
            Ok(false) => {
                if let Err(err) = self.create_branch_from_base(&driftive_pr.branch).await {
                    error!("Failed to create branch {}: {err}", driftive_pr.branch);
                    return CreateOrUpdatePullRequestResult::default();
                }
            }
            Err(err) => {
                error!("Failed to check branch {}: {err}", driftive_pr.branch);
                return CreateOrUpdatePullRequestResult::default();
            }
        }

        let file_content = format!(
            "driftive remediation {}\n",
            driftive_pr.time.format("%a %b %e %H:%M:%S UTC %Y")
        );
        let commit_message = format!(
            "Adds driftive remediation file for project {}",
            driftive_pr.project.dir.display()
        );
        if let Err(err) = self
            .commit_file_to_branch(
                &driftive_pr.branch,
                "driftive-remediation.txt",
                &file_content,
                &commit_message,
            )
            .await
        {
            error!("Failed to add file to branch {}: {err}", driftive_pr.branch);
            if let Err(err) = self.delete_branch(&driftive_pr.branch).await {
                error!(
                    "Failed to delete branch {} after file addition failure: {err}",
                    driftive_pr.branch
                );
            }
            return CreateOrUpdatePullRequestResult::default();
        }

        let response = match self
            .client()
            .post(self.url("pulls"))
            .json(&json!({
                "title": driftive_pr.title,
                "head": driftive_pr.branch,
                "base": driftive_pr.base,
                "body": driftive_pr.body,
            }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!("Failed to create pull request: {err}");
                return CreateOrUpdatePullRequestResult::default();
            }
        };

        let created: PullDto = match Self::checked("create pull request", response).await {
            Ok(response) => match response.json().await {
                Ok(created) => created,
                Err(err) => {
                    error!("Failed to parse created pull request: {err}");
                    return CreateOrUpdatePullRequestResult::default();
                }
            },
            Err(err) => {
                error!("Failed to create pull request: {err}");
                return CreateOrUpdatePullRequestResult::default();
            }
        };

        if !driftive_pr.labels.is_empty() {
            if let Err(err) = self.add_labels(created.number, &driftive_pr.labels).await {
                error!(
                    "Failed to add labels to pull request {}: {err}",
                    created.number
                );
            }
        }

        CreateOrUpdatePullRequestResult {
            created: true,
            rate_limited: false,
            pull_request: Some(Self::to_vcs_pull_request(created)),
        }
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), VcsError> {
        let response = self
            .client()
            .post(self.url(&format!("issues/{number}/labels")))
            .json(&json!({ "labels": labels }))
            .send()
            .await?;
        Self::checked("add labels", response).await?;
        Ok(())
    }

    pub(crate) async fn comment_pull_request(
        &self,
        number: u64,
        comment: &str,
    ) -> Result<(), VcsError> {
        info!("Creating comment on pull request #{number}: {comment}");
        let response = self
            .client()
            .post(self.url(&format!("issues/{number}/comments")))
            .json(&json!({ "body": comment }))
            .send()
            .await?;
        Self::checked("comment pull request", response).await?;
        Ok(())
    }

    pub(crate) async fn close_pull_request_by_number(&self, number: u64) -> Result<(), VcsError> {
        let response = self
            .client()
            .patch(self.url(&format!("pulls/{number}")))
            .json(&json!({ "state": "closed" }))
            .send()
            .await?;
        Self::checked("close pull request", response).await?;
        Ok(())
    }
}
