//! Issue operations of the GitHub provider.

use serde_json::json;
use tracing::{error, info, warn};

use crate::types::{CreateOrUpdateIssueResult, GithubIssue, VcsIssue};
use crate::VcsError;

use super::{GithubVcs, IssueDto, PER_PAGE};

impl GithubVcs {
    fn to_vcs_issue(issue: IssueDto) -> VcsIssue {
        VcsIssue {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
        }
    }

    pub(crate) async fn list_open_issues(&self) -> Result<Vec<VcsIssue>, VcsError> {
        info!("Fetching all open issues from the repository...");
        let mut open_issues = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .client()
                .get(self.url("issues"))
                .query(&[
                    ("state", "open"),
                    ("per_page", &PER_PAGE.to_string()),
                    ("page", &page.to_string()),
                ])
                .send()
                .await?;
            let batch: Vec<IssueDto> = Self::checked("list issues", response)
                .await?
                .json()
                .await?;
            let batch_len = batch.len();
            open_issues.extend(batch.into_iter().map(Self::to_vcs_issue));
            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }
        info!(
            "Fetched {} open issues from the repository",
            open_issues.len()
        );
        Ok(open_issues)
    }

    pub(crate) async fn upsert_issue(
        &self,
        driftive_issue: &GithubIssue,
        open_issues: &[VcsIssue],
        update_only: bool,
    ) -> CreateOrUpdateIssueResult {
        for issue in open_issues {
            if issue.title != driftive_issue.title {
                continue;
            }
            if issue.body == driftive_issue.body {
                info!(
                    "Issue [{}] already exists for project {} (repo: {})",
                    driftive_issue.kind,
                    driftive_issue.project.dir.display(),
                    self.repo_path()
                );
                return CreateOrUpdateIssueResult::default();
            }
            if let Err(err) = self.edit_issue_body(issue.number, &driftive_issue.body).await {
                error!("Failed to update issue. {err}");
                return CreateOrUpdateIssueResult::default();
            }
            info!(
                "Updated issue [{}] for project {} (repo: {})",
                driftive_issue.kind,
                driftive_issue.project.dir.display(),
                self.repo_path()
            );
            return CreateOrUpdateIssueResult::default();
        }

        if update_only {
            warn!(
                "Max number of open issues reached. Skipping issue [{}] creation for project {} (repo: {})",
                driftive_issue.kind,
                driftive_issue.project.dir.display(),
                self.repo_path()
            );
            return CreateOrUpdateIssueResult {
                created: false,
                rate_limited: true,
                issue: None,
            };
        }

        info!(
            "Creating issue [{}] for project {} (repo: {})",
            driftive_issue.kind,
            driftive_issue.project.dir.display(),
            self.repo_path()
        );
        match self.create_issue(driftive_issue).await {
            Ok(created) => CreateOrUpdateIssueResult {
                created: true,
                rate_limited: false,
                issue: Some(created),
            },
            Err(err) => {
                error!("Failed to create issue. {err}");
                CreateOrUpdateIssueResult::default()
            }
        }
    }

    async fn create_issue(&self, issue: &GithubIssue) -> Result<VcsIssue, VcsError> {
        let response = self
            .client()
            .post(self.url("issues"))
            .json(&json!({
                "title": issue.title,
                "body": issue.body,
                "labels": issue.labels,
            }))
            .send()
            .await?;
        let created: IssueDto = Self::checked("create issue", response)
            .await?
            .json()
            .await?;
        Ok(Self::to_vcs_issue(created))
    }

    async fn edit_issue_body(&self, number: u64, body: &str) -> Result<(), VcsError> {
        let response = self
            .client()
            .patch(self.url(&format!("issues/{number}")))
            .json(&json!({ "body": body }))
            .send()
            .await?;
        Self::checked("update issue", response).await?;
        Ok(())
    }

    pub(crate) async fn comment_issue_resolved(&self, number: u64) -> Result<(), VcsError> {
        let response = self
            .client()
            .post(self.url(&format!("issues/{number}/comments")))
            .json(&json!({ "body": "Issue has been resolved." }))
            .send()
            .await?;
        Self::checked("comment issue", response).await?;
        Ok(())
    }

    pub(crate) async fn close_issue_by_number(&self, number: u64) -> Result<(), VcsError> {
        let response = self
            .client()
            .patch(self.url(&format!("issues/{number}")))
            .json(&json!({ "state": "closed" }))
            .send()
            .await?;
        Self::checked("close issue", response).await?;
        Ok(())
    }
}
