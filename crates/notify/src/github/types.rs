//! Reconciliation state types.

use serde::Serialize;

use vcs::metadata::IssueKind;
use vcs::types::{VcsIssue, VcsPullRequest};

/// A driftive-managed issue recovered from (or just written to) GitHub.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectIssue {
    /// Project directory relative to the repository root.
    pub dir: String,
    pub issue: VcsIssue,
    pub kind: IssueKind,
}

/// A driftive-managed pull request.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPullRequest {
    /// Project directory relative to the repository root.
    pub dir: String,
    pub pr: VcsPullRequest,
    pub kind: IssueKind,
}

/// Outcome of one reconciliation pass. The VCS itself is the durable
/// store; callers render this state instead of re-querying.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GithubState {
    pub drift_issues_open: Vec<ProjectIssue>,
    pub drift_issues_resolved: Vec<ProjectIssue>,

    pub error_issues_open: Vec<ProjectIssue>,
    pub error_issues_resolved: Vec<ProjectIssue>,

    pub drift_pull_requests_open: Vec<ProjectPullRequest>,
    pub drift_pull_requests_resolved: Vec<ProjectPullRequest>,

    /// Projects refused an object because the per-kind open cap was hit.
    pub rate_limited_drifts: Vec<String>,
}
