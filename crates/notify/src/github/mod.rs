//! GitHub reconciliation: issues, pull requests and the summary issue.

pub mod issues;
pub mod pulls;
pub mod summary;
pub mod types;

use std::path::Path;
use std::sync::LazyLock;

use handlebars::Handlebars;
use serde_json::json;
use tracing::{debug, warn};

use drift::DriftProjectResult;
use vcs::metadata::{self, IssueKind, ProjectMetadata};
use vcs::types::{VcsIssue, VcsPullRequest};

use types::{ProjectIssue, ProjectPullRequest};

const ISSUE_TITLE_PREFIX: &str = "drift detected";
const ERROR_ISSUE_TITLE_PREFIX: &str = "plan error";

/// Lower than GitHub's 65535 body limit to leave room for the metadata
/// block and markdown scaffolding.
const MAX_ISSUE_BODY_SIZE: usize = 64_000;

const ISSUE_BODY_TEMPLATE: &str = include_str!("templates/gh-issue-description.md");
const ERROR_ISSUE_BODY_TEMPLATE: &str = include_str!("templates/gh-error-issue-description.md");
const SUMMARY_BODY_TEMPLATE: &str = include_str!("templates/gh-summary-description.md");

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut registry = Handlebars::new();
    registry
        .register_template_string("gh-issue", ISSUE_BODY_TEMPLATE.trim_matches([' ', '\n']))
        .expect("issue body template must parse");
    registry
        .register_template_string(
            "gh-error-issue",
            ERROR_ISSUE_BODY_TEMPLATE.trim_matches([' ', '\n']),
        )
        .expect("error issue body template must parse");
    registry
        .register_template_string("gh-summary", SUMMARY_BODY_TEMPLATE.trim_matches([' ', '\n']))
        .expect("summary template must parse");
    registry
});

/// Issue title for a drifted project.
pub(crate) fn drift_issue_title(dir: &str) -> String {
    format!("{ISSUE_TITLE_PREFIX}: {dir}")
}

/// Issue title for a failed project.
pub(crate) fn error_issue_title(dir: &str) -> String {
    format!("{ERROR_ISSUE_TITLE_PREFIX}: {dir}")
}

/// Project directory relative to the repository root. Titles and metadata
/// must survive across runs, so they never contain the (possibly
/// temporary) checkout path.
pub(crate) fn relative_dir(repo_dir: &Path, project_dir: &Path) -> String {
    project_dir
        .strip_prefix(repo_dir)
        .unwrap_or(project_dir)
        .to_string_lossy()
        .trim_matches('/')
        .to_string()
}

/// Build the tracked-object body for a project result: embedded metadata
/// block first, then the human-readable excerpt section.
pub(crate) fn build_object_body(
    project_result: &DriftProjectResult,
    project_dir: &str,
    template: BodyTemplate,
) -> String {
    let kind = if !project_result.drifted && !project_result.succeeded {
        IssueKind::Error
    } else {
        IssueKind::Drift
    };
    let metadata = metadata::embed(&ProjectMetadata::new(project_dir, kind));

    let output = if project_result.succeeded {
        &project_result.plan_output
    } else if project_result.plan_output.is_empty() {
        &project_result.init_output
    } else {
        &project_result.plan_output
    };

    let data = json!({
        "metadata": metadata,
        "project_dir": project_dir,
        "output": truncate_on_char_boundary(output, MAX_ISSUE_BODY_SIZE),
    });

    match TEMPLATES.render(template.name(), &data) {
        Ok(body) => body,
        Err(err) => {
            // Unreachable with the embedded templates; degrade to the bare
            // metadata block so reconciliation still works.
            warn!("Failed to render {} template: {err}", template.name());
            metadata
        }
    }
}

/// Which body template to render.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BodyTemplate {
    Drift,
    Error,
}

impl BodyTemplate {
    fn name(self) -> &'static str {
        match self {
            Self::Drift => "gh-issue",
            Self::Error => "gh-error-issue",
        }
    }
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Recover driftive-managed issues from raw open issues. Objects without a
/// valid metadata block are not managed by driftive and are skipped.
pub(crate) fn project_issues_from_bodies(issues: &[VcsIssue]) -> Vec<ProjectIssue> {
    issues
        .iter()
        .filter_map(|issue| match metadata::extract(&issue.body) {
            Some(meta) => Some(ProjectIssue {
                dir: meta.project.dir,
                issue: issue.clone(),
                kind: meta.kind,
            }),
            None => {
                debug!("Project not found in issue metadata. Issue: {}", issue.title);
                None
            }
        })
        .collect()
}

/// Recover driftive-managed pull requests from raw open pull requests.
pub(crate) fn project_prs_from_bodies(prs: &[VcsPullRequest]) -> Vec<ProjectPullRequest> {
    prs.iter()
        .filter_map(|pr| match metadata::extract(&pr.body) {
            Some(meta) => Some(ProjectPullRequest {
                dir: meta.project.dir,
                pr: pr.clone(),
                kind: meta.kind,
            }),
            None => {
                debug!("Project not found in pull request metadata. PR: {}", pr.title);
                None
            }
        })
        .collect()
}

/// Remove the issues present in `to_remove`, keyed by (dir, kind).
pub(crate) fn filter_issues(
    issues: Vec<ProjectIssue>,
    to_remove: &[ProjectIssue],
) -> Vec<ProjectIssue> {
    issues
        .into_iter()
        .filter(|issue| {
            !to_remove
                .iter()
                .any(|removed| removed.dir == issue.dir && removed.kind == issue.kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Project, ProjectKind};

    fn drifted_result(dir: &str, plan_output: &str) -> DriftProjectResult {
        DriftProjectResult {
            project: Project::new(dir, ProjectKind::Terraform),
            drifted: true,
            succeeded: true,
            init_output: String::new(),
            plan_output: plan_output.to_string(),
            skipped_due_to_pr: false,
        }
    }

    #[test]
    fn body_embeds_metadata_and_excerpt() {
        let result = drifted_result("/repo/infra/a", "Terraform will perform the following actions:");
        let body = build_object_body(&result, "infra/a", BodyTemplate::Drift);

        let meta = metadata::extract(&body).unwrap();
        assert_eq!(meta.project.dir, "infra/a");
        assert_eq!(meta.kind, IssueKind::Drift);
        assert!(body.contains("infra/a"));
        assert!(body.contains("Terraform will perform the following actions:"));
    }

    #[test]
    fn failed_result_gets_error_kind() {
        let result = DriftProjectResult {
            project: Project::new("/repo/infra/b", ProjectKind::Tofu),
            drifted: false,
            succeeded: false,
            init_output: String::new(),
            plan_output: "Error: timeout".to_string(),
            skipped_due_to_pr: false,
        };
        let body = build_object_body(&result, "infra/b", BodyTemplate::Error);
        assert_eq!(metadata::extract(&body).unwrap().kind, IssueKind::Error);
        assert!(body.contains("Error: timeout"));
    }

    #[test]
    fn oversized_output_is_capped() {
        let result = drifted_result("/repo/infra/a", &"x".repeat(100_000));
        let body = build_object_body(&result, "infra/a", BodyTemplate::Drift);
        assert!(body.len() < 66_000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "aé".repeat(10);
        let truncated = truncate_on_char_boundary(&text, 4);
        assert!(truncated.len() <= 4);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn relative_dir_strips_checkout_prefix() {
        assert_eq!(
            relative_dir(Path::new("/tmp/clone"), Path::new("/tmp/clone/infra/a")),
            "infra/a"
        );
        assert_eq!(
            relative_dir(Path::new("/tmp/clone"), Path::new("infra/a")),
            "infra/a"
        );
    }
}
