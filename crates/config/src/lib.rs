//! Configuration layer for driftive.
//!
//! Covers the three sources a run is assembled from: command line flags,
//! the GitHub Actions context (`GITHUB_CONTEXT` env var) and the repository
//! `driftive.y(a)ml` file. Also hosts project auto-discovery, since the
//! discovery rules live in the repository config.

pub mod cli;
pub mod context;
pub mod discover;
pub mod error;
pub mod models;
pub mod repo;

pub use cli::Cli;
pub use context::GithubActionContext;
pub use error::ConfigError;
pub use models::{Project, ProjectKind};
pub use repo::DriftiveRepoConfig;

use std::path::PathBuf;

/// Resolved runtime configuration for one driftive invocation.
#[derive(Debug, Clone)]
pub struct DriftiveConfig {
    /// Repository URL to clone. Ignored when `repository_path` is set.
    pub repository_url: Option<String>,
    /// Branch to clone when `repository_url` is used.
    pub branch: Option<String>,
    /// Local path to an already checked-out repository.
    pub repository_path: Option<PathBuf>,
    /// Number of projects analyzed concurrently.
    pub concurrency: usize,
    /// Log level passed to the tracing subscriber.
    pub log_level: String,
    /// Print the drift result to stdout at the end of the run.
    pub stdout_result: bool,
    /// Slack incoming-webhook URL, when Slack notifications are wanted.
    pub slack_webhook_url: Option<String>,
    /// GitHub API token.
    pub github_token: Option<String>,
    /// GitHub Actions context, when running inside a workflow.
    pub github_context: Option<GithubActionContext>,
    /// Exit with code 1 when unsuppressed drift is found.
    pub exit_code: bool,
}

impl DriftiveConfig {
    /// Build the runtime configuration from parsed CLI flags and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRepository`] when neither a repository
    /// path nor a URL+branch pair is provided.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.repo_url.is_none() && cli.repo_path.is_none() {
            return Err(ConfigError::MissingRepository);
        }
        if cli.repo_path.is_none() && cli.branch.is_none() {
            return Err(ConfigError::MissingBranch);
        }

        let github_context = match context::from_env() {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                tracing::warn!("Failed to parse github action context: {err}");
                None
            }
        };

        Ok(Self {
            repository_url: cli.repo_url,
            branch: cli.branch,
            repository_path: cli.repo_path.map(|p| PathBuf::from(strip_trailing_slash(&p))),
            concurrency: cli.concurrency,
            log_level: cli.log_level,
            stdout_result: cli.stdout,
            slack_webhook_url: cli.slack_url,
            github_token: cli.github_token,
            github_context,
            exit_code: cli.exit_code,
        })
    }

    /// True when enough GitHub context is available to talk to the API.
    pub fn github_enabled(&self) -> bool {
        self.github_token.is_some()
            && self
                .github_context
                .as_ref()
                .is_some_and(GithubActionContext::is_valid)
    }
}

fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}
