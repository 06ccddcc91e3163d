//! Shared project model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tool used to plan a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Terraform,
    Tofu,
    Terragrunt,
}

impl ProjectKind {
    /// Name of the external binary for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Tofu => "tofu",
            Self::Terragrunt => "terragrunt",
        }
    }

    /// Map a configured executable name to a kind. Unknown names fall back
    /// to terraform, matching the discovery rules' permissive behavior.
    pub fn from_executable(executable: &str) -> Self {
        match executable {
            "tofu" => Self::Tofu,
            "terragrunt" => Self::Terragrunt,
            "terraform" => Self::Terraform,
            other => {
                tracing::warn!("Unknown executable type {other}, assuming terraform");
                Self::Terraform
            }
        }
    }
}

/// One independently plannable infrastructure directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Absolute directory of the project. Identity of the project.
    pub dir: PathBuf,
    /// Tool used to plan it.
    pub kind: ProjectKind,
}

impl Project {
    pub fn new(dir: impl Into<PathBuf>, kind: ProjectKind) -> Self {
        Self {
            dir: dir.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectKind;

    #[test]
    fn executable_mapping() {
        assert_eq!(ProjectKind::from_executable("tofu"), ProjectKind::Tofu);
        assert_eq!(
            ProjectKind::from_executable("terragrunt"),
            ProjectKind::Terragrunt
        );
        assert_eq!(
            ProjectKind::from_executable("something-else"),
            ProjectKind::Terraform
        );
    }
}
