//! Error types for configuration loading and validation.

use thiserror::Error;

/// Errors raised while assembling or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither --repo-path nor --repo-url was provided.
    #[error("repository URL or path is required")]
    MissingRepository,

    /// --repo-url without --branch.
    #[error("branch is required when a repository URL is provided")]
    MissingBranch,

    /// No driftive.yml or driftive.yaml at the repository root.
    #[error("driftive.yml not found")]
    MissingRepoConfig,

    /// The repository config file exists but cannot be read.
    #[error("failed to read repository config: {0}")]
    Io(#[from] std::io::Error),

    /// The repository config file is not valid YAML.
    #[error("failed to parse repository config: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// GITHUB_CONTEXT env var is absent.
    #[error("GITHUB_CONTEXT is not defined")]
    MissingGithubContext,

    /// GITHUB_CONTEXT env var holds invalid JSON.
    #[error("failed to parse github action context: {0}")]
    InvalidGithubContext(#[source] serde_json::Error),

    /// A label in the repository config is empty.
    #[error("invalid label name")]
    InvalidLabelName,

    /// The same label is configured for both drift and error issues.
    #[error("label '{0}' is used for both drift and error issues")]
    ConflictingLabels(String),

    /// A discovery glob pattern does not compile.
    #[error("invalid discovery pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
