//! Slack webhook notification.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use drift::DriftDetectionResult;

use crate::DriftIssuesState;

/// Errors from delivering the Slack message.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("failed to send slack message: {0}")]
    Http(#[from] reqwest::Error),

    #[error("slack webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Webhook payload.
#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
}

/// Sends one drift summary message to a Slack incoming webhook.
pub struct Slack {
    url: String,
    issues_state: DriftIssuesState,
    client: reqwest::Client,
}

impl Slack {
    pub fn new(url: String, issues_state: DriftIssuesState) -> Self {
        Self {
            url,
            issues_state,
            client: reqwest::Client::new(),
        }
    }

    /// Deliver the summary. Skipped entirely when there is nothing to say:
    /// no unsuppressed drift and no issues resolved this run.
    pub async fn send(&self, drift_result: &DriftDetectionResult) -> Result<(), SlackError> {
        if drift_result.total_drifted == 0 && !self.did_resolve_issues() {
            info!("No drift detected. Skipping slack notification");
            return Ok(());
        }

        let message = SlackMessage {
            text: build_message(drift_result, &self.issues_state),
        };

        let response = self.client.post(&self.url).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn did_resolve_issues(&self) -> bool {
        self.issues_state.state_updated && self.issues_state.num_resolved_issues > 0
    }
}

fn build_message(drift_result: &DriftDetectionResult, issues_state: &DriftIssuesState) -> String {
    let mut message = String::from(":bangbang: State Drift detected in projects\n");
    message.push_str(&format!(
        ":gear: Drifts `{}`/`{}`\n",
        drift_result.total_drifted, drift_result.total_projects
    ));
    message.push_str(&format!(
        ":clock1: Analysis duration `{}`\n",
        format_duration(drift_result.duration)
    ));

    if issues_state.state_updated && issues_state.num_resolved_issues > 0 {
        message.push_str(&format!(
            ":white_check_mark: Resolved issues since last analysis `{}`\n",
            issues_state.num_resolved_issues
        ));
    }

    if drift_result.total_drifted > 0 {
        message.push_str(":point_down: Projects with state drifts \n\n```");
        for project in drift_result.unsuppressed_drifts() {
            message.push_str(&format!("{}\n", project.project.dir.display()));
        }
        message.push_str("```");
    }

    message
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{mins}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Project, ProjectKind};
    use drift::DriftProjectResult;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result_with_drifts(drifted: &[&str], skipped: &[&str]) -> DriftDetectionResult {
        let project_results: Vec<DriftProjectResult> = drifted
            .iter()
            .map(|dir| DriftProjectResult {
                project: Project::new(*dir, ProjectKind::Terraform),
                drifted: true,
                succeeded: true,
                init_output: String::new(),
                plan_output: String::new(),
                skipped_due_to_pr: skipped.contains(dir),
            })
            .collect();
        let total_drifted = project_results
            .iter()
            .filter(|r| !r.skipped_due_to_pr)
            .count();
        DriftDetectionResult {
            total_drifted,
            total_projects: project_results.len(),
            total_checked: project_results.len(),
            project_results,
            duration: Duration::from_secs(330),
        }
    }

    #[test]
    fn message_counts_and_lists_unsuppressed_drifts() {
        let result = result_with_drifts(&["infra/a", "infra/b"], &["infra/b"]);
        let message = build_message(&result, &DriftIssuesState::default());

        assert!(message.contains("Drifts `1`/`2`"));
        assert!(message.contains("`5m30s`"));
        assert!(message.contains("infra/a"));
        assert!(!message.contains("infra/b"));
    }

    #[test]
    fn resolved_issues_line_requires_updated_state() {
        let result = result_with_drifts(&["infra/a"], &[]);
        let state = DriftIssuesState {
            num_resolved_issues: 2,
            state_updated: true,
            ..DriftIssuesState::default()
        };
        let message = build_message(&result, &state);
        assert!(message.contains("Resolved issues since last analysis `2`"));

        let stale = DriftIssuesState {
            num_resolved_issues: 2,
            state_updated: false,
            ..DriftIssuesState::default()
        };
        let message = build_message(&result, &stale);
        assert!(!message.contains("Resolved issues"));
    }

    #[tokio::test]
    async fn delivers_message_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_string_contains("State Drift detected"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let slack = Slack::new(format!("{}/hook", server.uri()), DriftIssuesState::default());
        slack
            .send(&result_with_drifts(&["infra/a"], &[]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn nothing_to_report_skips_delivery() {
        // No mock mounted: a request would fail the test via the error.
        let server = MockServer::start().await;
        let slack = Slack::new(format!("{}/hook", server.uri()), DriftIssuesState::default());
        slack.send(&result_with_drifts(&[], &[])).await.unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let slack = Slack::new(server.uri(), DriftIssuesState::default());
        let err = slack
            .send(&result_with_drifts(&["infra/a"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Rejected { status: 500, .. }));
    }
}
