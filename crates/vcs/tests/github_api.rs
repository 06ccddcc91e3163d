//! GitHub provider tests against a mock API server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use config::{DriftiveRepoConfig, GithubActionContext, Project, ProjectKind};
use vcs::github::GithubVcs;
use vcs::metadata::IssueKind;
use vcs::types::{GithubIssue, VcsIssue};
use vcs::Vcs;

fn github_for(server: &MockServer) -> GithubVcs {
    let context = GithubActionContext {
        repository: "acme/infra".to_string(),
        repository_owner: "acme".to_string(),
    };
    GithubVcs::new("test-token", &context, DriftiveRepoConfig::default())
        .unwrap()
        .with_api_url(server.uri())
}

fn drift_issue(title: &str, body: &str) -> GithubIssue {
    GithubIssue {
        title: title.to_string(),
        body: body.to_string(),
        labels: vec!["drift".to_string()],
        project: Project::new("/repo/infra/a", ProjectKind::Terraform),
        kind: IssueKind::Drift,
    }
}

#[tokio::test]
async fn lists_open_issues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/issues"))
        .and(query_param("state", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 7, "title": "drift detected: infra/a", "body": "b1"},
            {"number": 9, "title": "plan error: infra/b", "body": null},
        ])))
        .mount(&server)
        .await;

    let issues = github_for(&server).get_all_open_issues().await.unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].number, 7);
    assert_eq!(issues[1].body, "");
}

#[tokio::test]
async fn listing_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/issues"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(github_for(&server).get_all_open_issues().await.is_err());
}

#[tokio::test]
async fn identical_issue_is_a_noop() {
    // No mock mounted: any HTTP call would fail the upsert.
    let server = MockServer::start().await;
    let open = vec![VcsIssue {
        number: 1,
        title: "drift detected: infra/a".to_string(),
        body: "same body".to_string(),
    }];

    let result = github_for(&server)
        .create_or_update_issue(&drift_issue("drift detected: infra/a", "same body"), &open, false)
        .await;

    assert!(!result.created);
    assert!(!result.rate_limited);
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn changed_body_updates_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/infra/issues/1"))
        .and(body_partial_json(json!({"body": "new body"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 1, "title": "drift detected: infra/a", "body": "new body"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let open = vec![VcsIssue {
        number: 1,
        title: "drift detected: infra/a".to_string(),
        body: "old body".to_string(),
    }];

    let result = github_for(&server)
        .create_or_update_issue(&drift_issue("drift detected: infra/a", "new body"), &open, false)
        .await;

    assert!(!result.created);
    assert!(!result.rate_limited);
}

#[tokio::test]
async fn unmatched_issue_is_created_with_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/infra/issues"))
        .and(body_partial_json(json!({
            "title": "drift detected: infra/a",
            "labels": ["drift"],
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "number": 42, "title": "drift detected: infra/a", "body": "body"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = github_for(&server)
        .create_or_update_issue(&drift_issue("drift detected: infra/a", "body"), &[], false)
        .await;

    assert!(result.created);
    assert_eq!(result.issue.unwrap().number, 42);
}

#[tokio::test]
async fn update_only_refuses_creation() {
    let server = MockServer::start().await;

    let result = github_for(&server)
        .create_or_update_issue(&drift_issue("drift detected: infra/a", "body"), &[], true)
        .await;

    assert!(!result.created);
    assert!(result.rate_limited);
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn create_failure_reports_not_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/infra/issues"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = github_for(&server)
        .create_or_update_issue(&drift_issue("drift detected: infra/a", "body"), &[], false)
        .await;

    assert!(!result.created);
    assert!(!result.rate_limited);
    assert!(result.issue.is_none());
}

#[tokio::test]
async fn closes_issue_after_comment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/infra/issues/5/comments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/infra/issues/5"))
        .and(body_partial_json(json!({"state": "closed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 5, "title": "t", "body": "b"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gh = github_for(&server);
    gh.create_issue_comment(5).await.unwrap();
    gh.close_issue(5).await.unwrap();
}

#[tokio::test]
async fn changed_files_aggregates_across_prs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/pulls/1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"filename": "infra/a/main.tf"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/pulls/2/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"filename": "infra/b/main.tf"},
            {"filename": "infra/b/vars.tf"},
        ])))
        .mount(&server)
        .await;

    let prs = vec![
        vcs::types::VcsPullRequest {
            number: 1,
            ..Default::default()
        },
        vcs::types::VcsPullRequest {
            number: 2,
            ..Default::default()
        },
    ];

    let files = github_for(&server)
        .get_changed_files_for_open_prs(&prs)
        .await
        .unwrap();
    assert_eq!(
        files,
        vec!["infra/a/main.tf", "infra/b/main.tf", "infra/b/vars.tf"]
    );
}

#[tokio::test]
async fn branch_exists_distinguishes_missing_ref() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/git/ref/heads/present"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": {"sha": "abc123"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/infra/git/ref/heads/absent"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gh = github_for(&server);
    assert!(gh.branch_exists("present").await.unwrap());
    assert!(!gh.branch_exists("absent").await.unwrap());
}
