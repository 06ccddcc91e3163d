//! driftive entry point.
//!
//! Wires the collaborators together for one run: config assembly,
//! repository checkout, project discovery, drift analysis and notification
//! dispatch. The process exit code reflects only whether unsuppressed
//! drift was found, never non-fatal channel errors.

mod git;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Cli, DriftiveConfig, DriftiveRepoConfig};
use drift::DriftDetector;
use notify::NotificationHandler;
use vcs::Vcs;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DriftiveConfig::from_cli(cli)?;

    // Keep the temp checkout alive for the whole run; dropped on exit.
    let (repo_dir, _checkout) = determine_repository_dir(&config).await?;

    let repo_config = config::repo::repo_config_or_default(config::repo::detect_repo_config(
        &repo_dir,
    ))
    .context("Failed to load repository config")?;
    config::repo::validate_repo_config(&repo_config)?;

    show_init_message(&config, &repo_config)?;

    let vcs: Arc<dyn Vcs> = Arc::from(vcs::new_vcs(&config, &repo_config)?);

    let open_pr_changed_files = prepare_changed_files(&config, &repo_config, vcs.as_ref()).await?;

    let projects = config::discover::auto_discover_projects(&repo_dir, &repo_config);
    info!("Projects detected: {}", projects.len());

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, cancelling in-flight analyses...");
            signal_cancel.cancel();
        }
    });

    let detector = DriftDetector::new(
        repo_dir.clone(),
        projects,
        &config,
        &repo_config,
        open_pr_changed_files,
    );
    let analysis_result = detector.detect_drift(&cancel).await;

    NotificationHandler::new(
        config.clone(),
        repo_config,
        repo_dir,
        Arc::clone(&vcs),
    )
    .handle_notifications(&analysis_result)
    .await;

    if analysis_result.total_drifted == 0 {
        info!("No drifts detected");
    } else if config.exit_code {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Resolve the repository directory: an existing checkout when
/// `--repo-path` is given, otherwise a fresh clone into a temp dir that is
/// deleted when the run finishes.
async fn determine_repository_dir(
    config: &DriftiveConfig,
) -> Result<(PathBuf, Option<tempfile::TempDir>)> {
    if let Some(path) = &config.repository_path {
        return Ok((path.clone(), None));
    }

    let (Some(url), Some(branch)) = (&config.repository_url, &config.branch) else {
        bail!("repository URL and branch are required when no repository path is given");
    };

    let checkout = tempfile::Builder::new()
        .prefix("driftive")
        .tempdir()
        .context("Failed to create temp dir for checkout")?;
    git::clone_repo(url, branch, checkout.path()).await?;
    info!("Cloned repo to {}", checkout.path().display());

    Ok((checkout.path().to_path_buf(), Some(checkout)))
}

/// Fetch the changed files of all open PRs when the suppression filter is
/// active. Listing failures here are fatal, like any reconciliation
/// listing.
async fn prepare_changed_files(
    config: &DriftiveConfig,
    repo_config: &DriftiveRepoConfig,
    vcs: &dyn Vcs,
) -> Result<Vec<String>> {
    if !config.github_enabled() {
        return Ok(Vec::new());
    }
    if !repo_config.settings.skip_if_open_pr {
        info!("Not checking for changed files in open PRs because skip_if_open_pr is not enabled.");
        return Ok(Vec::new());
    }

    let open_prs = vcs
        .get_all_open_prs()
        .await
        .context("Failed to get open pull requests")?;
    let changed_files = vcs
        .get_changed_files_for_open_prs(&open_prs)
        .await
        .context("Failed to get changed files for open PRs")?;
    Ok(changed_files)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn show_init_message(config: &DriftiveConfig, repo_config: &DriftiveRepoConfig) -> Result<()> {
    info!("Starting driftive...");
    info!(
        "Options: concurrency: {}. github issues: {}. github pull requests: {}. slack: {}. close resolved issues: {}. max opened issues: {}",
        config.concurrency,
        on_off(repo_config.github.issues.enabled),
        on_off(repo_config.github.pull_requests.enabled),
        on_off(config.slack_webhook_url.is_some()),
        on_off(repo_config.github.issues.close_resolved),
        repo_config.github.issues.max_open_issues,
    );

    if (repo_config.github.issues.enabled || repo_config.github.pull_requests.enabled)
        && !config.github_enabled()
    {
        bail!(
            "Github issues are enabled but the required Github token or context is not provided. \
             Use the --github-token flag or set the GITHUB_TOKEN environment variable. \
             Also, ensure that the GITHUB_CONTEXT environment variable is set in Github Actions."
        );
    }
    Ok(())
}
