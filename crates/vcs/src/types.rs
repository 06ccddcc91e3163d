//! Tracked-object types exchanged with the VCS provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use config::Project;

use crate::metadata::IssueKind;

/// An open issue as fetched from the tracking system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// An open pull request as fetched from the tracking system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsPullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub url: String,
}

/// Outcome of an issue upsert.
#[derive(Debug, Clone, Default)]
pub struct CreateOrUpdateIssueResult {
    pub created: bool,
    pub rate_limited: bool,
    pub issue: Option<VcsIssue>,
}

/// Outcome of a pull request upsert.
#[derive(Debug, Clone, Default)]
pub struct CreateOrUpdatePullRequestResult {
    pub created: bool,
    pub rate_limited: bool,
    pub pull_request: Option<VcsPullRequest>,
}

/// An issue driftive wants to exist.
#[derive(Debug, Clone)]
pub struct GithubIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub project: Project,
    pub kind: IssueKind,
}

/// A remediation pull request driftive wants to exist.
#[derive(Debug, Clone)]
pub struct GithubPullRequest {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub branch: String,
    pub base: String,
    pub project: Project,
    pub kind: IssueKind,
    /// Stamped into the marker file committed to the remediation branch.
    pub time: DateTime<Utc>,
}
