//! Repository configuration (`driftive.yml`).
//!
//! Declared by the analyzed repository itself, either as a YAML file at its
//! root or inline through the `DRIFTIVE_REPO_CONFIG` environment variable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Environment variable that overrides the on-disk repository config.
pub const ENV_REPO_CONFIG: &str = "DRIFTIVE_REPO_CONFIG";

/// Repository-level driftive configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftiveRepoConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub auto_discover: AutoDiscoverConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// GitHub notification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub issues: IssuesConfig,
    #[serde(default)]
    pub pull_requests: PullRequestsConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Drift issue lane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuesConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Close issues whose project no longer drifts. Explicit opt-in.
    #[serde(default)]
    pub close_resolved: bool,
    #[serde(default = "default_max_open_issues")]
    pub max_open_issues: usize,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub errors: ErrorIssuesConfig,
}

impl Default for IssuesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            close_resolved: false,
            max_open_issues: default_max_open_issues(),
            labels: Vec::new(),
            errors: ErrorIssuesConfig::default(),
        }
    }
}

/// Error (plan failure) issue lane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorIssuesConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_max_open_error_issues")]
    pub max_open_issues: usize,
}

impl Default for ErrorIssuesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            labels: Vec::new(),
            max_open_issues: default_max_open_error_issues(),
        }
    }
}

/// Drift remediation pull request configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub close_resolved: bool,
    #[serde(default = "default_max_open_pull_requests")]
    pub max_open_pull_requests: usize,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_branch_name_prefix")]
    pub branch_name_prefix: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for PullRequestsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            close_resolved: false,
            max_open_pull_requests: default_max_open_pull_requests(),
            base_branch: default_base_branch(),
            branch_name_prefix: default_branch_name_prefix(),
            labels: Vec::new(),
        }
    }
}

/// Summary issue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_summary_issue_title")]
    pub issue_title: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issue_title: default_summary_issue_title(),
        }
    }
}

/// Project auto-discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoDiscoverConfig {
    /// Glob patterns of files that mark candidate project directories.
    #[serde(default)]
    pub inclusions: Vec<String>,
    /// Glob patterns excluded from discovery.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Per-directory rules mapping marker files to executables.
    #[serde(default)]
    pub project_rules: Vec<AutoDiscoverRule>,
}

impl Default for AutoDiscoverConfig {
    fn default() -> Self {
        Self {
            inclusions: vec!["**/terragrunt.hcl".to_string(), "**/*.tf".to_string()],
            exclusions: vec![
                ".git/**".to_string(),
                "**/modules/**".to_string(),
                "**/.terragrunt-cache/**".to_string(),
                "**/.terraform".to_string(),
                "/terragrunt.hcl".to_string(),
            ],
            project_rules: vec![
                AutoDiscoverRule {
                    pattern: "terragrunt.hcl".to_string(),
                    executable: "terragrunt".to_string(),
                },
                AutoDiscoverRule {
                    pattern: "*.tf".to_string(),
                    executable: "terraform".to_string(),
                },
            ],
        }
    }
}

/// One discovery rule: a filename pattern and the tool that plans
/// directories containing a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoDiscoverRule {
    pub pattern: String,
    pub executable: String,
}

/// Misc repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Suppress drift notifications for projects already touched by an
    /// open pull request.
    #[serde(default = "default_true")]
    pub skip_if_open_pr: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            skip_if_open_pr: true,
        }
    }
}

fn default_max_open_issues() -> usize {
    10
}
fn default_max_open_error_issues() -> usize {
    5
}
fn default_max_open_pull_requests() -> usize {
    10
}
fn default_base_branch() -> String {
    "main".to_string()
}
fn default_branch_name_prefix() -> String {
    "drift-remediation".to_string()
}
fn default_summary_issue_title() -> String {
    "Driftive Summary".to_string()
}
fn default_true() -> bool {
    true
}

/// Locate and parse the repository config.
///
/// Resolution order: `DRIFTIVE_REPO_CONFIG` env var, `driftive.yml`,
/// `driftive.yaml`.
///
/// # Errors
///
/// [`ConfigError::MissingRepoConfig`] when no source is found; IO/YAML
/// errors when a source exists but cannot be parsed.
pub fn detect_repo_config(repo_dir: &Path) -> Result<DriftiveRepoConfig, ConfigError> {
    if let Ok(raw) = std::env::var(ENV_REPO_CONFIG) {
        if !raw.is_empty() {
            info!("Loading repo config from {ENV_REPO_CONFIG}");
            return Ok(serde_yaml::from_str(&raw)?);
        }
    }

    for name in ["driftive.yml", "driftive.yaml"] {
        let path = repo_dir.join(name);
        if path.is_file() {
            info!("Loading repo config from {}", path.display());
            let raw = std::fs::read_to_string(&path)?;
            return Ok(serde_yaml::from_str(&raw)?);
        }
    }

    Err(ConfigError::MissingRepoConfig)
}

/// Fall back to the built-in defaults when the repository has no config.
pub fn repo_config_or_default(
    detected: Result<DriftiveRepoConfig, ConfigError>,
) -> Result<DriftiveRepoConfig, ConfigError> {
    match detected {
        Ok(cfg) => {
            info!("Using detected driftive.y(a)ml configuration.");
            Ok(cfg)
        }
        Err(ConfigError::MissingRepoConfig) => {
            info!("No repository config detected. Using default auto-discovery rules.");
            Ok(DriftiveRepoConfig::default())
        }
        Err(err) => Err(err),
    }
}

/// Validate the repository config.
///
/// # Errors
///
/// Empty label names and labels shared between the drift and error issue
/// lanes are rejected; both would otherwise corrupt the managed-object
/// bookkeeping on the GitHub side.
pub fn validate_repo_config(cfg: &DriftiveRepoConfig) -> Result<(), ConfigError> {
    for label in &cfg.github.issues.labels {
        if label.is_empty() {
            return Err(ConfigError::InvalidLabelName);
        }
        if cfg.github.issues.errors.enabled {
            for error_label in &cfg.github.issues.errors.labels {
                if error_label.is_empty() {
                    return Err(ConfigError::InvalidLabelName);
                }
                if error_label == label {
                    return Err(ConfigError::ConflictingLabels(label.clone()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = DriftiveRepoConfig::default();
        assert_eq!(cfg.github.issues.max_open_issues, 10);
        assert_eq!(cfg.github.issues.errors.max_open_issues, 5);
        assert_eq!(cfg.github.pull_requests.base_branch, "main");
        assert_eq!(cfg.github.summary.issue_title, "Driftive Summary");
        assert!(cfg.settings.skip_if_open_pr);
        assert!(!cfg.github.issues.enabled);
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let raw = r"
github:
  issues:
    enabled: true
    labels: [drift]
";
        let cfg: DriftiveRepoConfig = serde_yaml::from_str(raw).unwrap();
        assert!(cfg.github.issues.enabled);
        assert_eq!(cfg.github.issues.labels, vec!["drift".to_string()]);
        assert_eq!(cfg.github.issues.max_open_issues, 10);
        assert!(cfg.settings.skip_if_open_pr);
    }

    #[test]
    fn conflicting_labels_are_rejected() {
        let mut cfg = DriftiveRepoConfig::default();
        cfg.github.issues.labels = vec!["drift".to_string()];
        cfg.github.issues.errors.enabled = true;
        cfg.github.issues.errors.labels = vec!["drift".to_string()];
        assert!(matches!(
            validate_repo_config(&cfg),
            Err(ConfigError::ConflictingLabels(_))
        ));
    }

    #[test]
    fn distinct_labels_pass_validation() {
        let mut cfg = DriftiveRepoConfig::default();
        cfg.github.issues.labels = vec!["drift".to_string()];
        cfg.github.issues.errors.enabled = true;
        cfg.github.issues.errors.labels = vec!["plan-error".to_string()];
        assert!(validate_repo_config(&cfg).is_ok());
    }

    #[test]
    fn loads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("driftive.yml"),
            "github:\n  issues:\n    enabled: true\n",
        )
        .unwrap();
        let cfg = detect_repo_config(dir.path()).unwrap();
        assert!(cfg.github.issues.enabled);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let detected = detect_repo_config(dir.path());
        assert!(matches!(detected, Err(ConfigError::MissingRepoConfig)));
        let cfg = repo_config_or_default(detected).unwrap();
        assert_eq!(cfg.auto_discover.project_rules.len(), 2);
    }
}
