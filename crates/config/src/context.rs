//! GitHub Actions context parsing.
//!
//! GitHub Actions exposes workflow metadata as a JSON document; workflows
//! using driftive export it via `GITHUB_CONTEXT: ${{ toJson(github) }}`.
//! Only the repository coordinates are needed here.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable carrying the serialized workflow context.
pub const ENV_GITHUB_CONTEXT: &str = "GITHUB_CONTEXT";

/// Subset of the GitHub Actions context relevant to driftive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubActionContext {
    /// Repository in `owner/name` form.
    #[serde(default)]
    pub repository: String,
    /// Repository owner.
    #[serde(default)]
    pub repository_owner: String,
}

impl GithubActionContext {
    /// True when the context carries usable repository coordinates.
    pub fn is_valid(&self) -> bool {
        !self.repository.is_empty()
            && !self.repository_owner.is_empty()
            && !self.repository_name().is_empty()
    }

    /// The `name` half of `owner/name`.
    pub fn repository_name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// The `owner` half of `owner/name`.
    pub fn owner(&self) -> &str {
        &self.repository_owner
    }
}

/// Parse a context document from a JSON string.
pub fn parse(raw: &str) -> Result<GithubActionContext, ConfigError> {
    serde_json::from_str(raw).map_err(ConfigError::InvalidGithubContext)
}

/// Parse the context from the `GITHUB_CONTEXT` environment variable.
pub fn from_env() -> Result<GithubActionContext, ConfigError> {
    let raw = std::env::var(ENV_GITHUB_CONTEXT)
        .map_err(|_| ConfigError::MissingGithubContext)?;
    parse(&raw)
}
