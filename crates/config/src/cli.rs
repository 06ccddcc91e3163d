//! Command line interface definition.

use clap::Parser;

/// Detects infrastructure-as-code state drift and keeps GitHub issues,
/// pull requests and Slack in sync with the result.
#[derive(Debug, Parser)]
#[command(name = "driftive")]
#[command(about = "IaC drift detection with GitHub and Slack notifications")]
#[command(version)]
pub struct Cli {
    /// Path to the repository. If provided, the repository will not be cloned.
    #[arg(long)]
    pub repo_path: Option<String>,

    /// Repository URL, e.g. https://<token>@github.com/<org>/<repo>.
    /// Ignored when --repo-path is provided.
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Repository branch. Required when --repo-url is used.
    #[arg(long)]
    pub branch: Option<String>,

    /// Slack webhook URL
    #[arg(long)]
    pub slack_url: Option<String>,

    /// Number of concurrent projects to check
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Log level. Options: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print drift results to stdout
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub stdout: bool,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Exit with code 1 if any state drift is detected
    #[arg(long, default_value_t = false)]
    pub exit_code: bool,
}
