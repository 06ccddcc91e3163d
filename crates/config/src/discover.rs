//! Project auto-discovery.
//!
//! Walks the repository, keeps files matched by the inclusion globs and not
//! by the exclusion globs, then classifies each candidate directory with the
//! first project rule whose filename pattern matches a file directly inside
//! it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::models::{Project, ProjectKind};
use crate::repo::DriftiveRepoConfig;

/// Discover all projects under `root_dir` according to the repository
/// config's auto-discovery rules.
pub fn auto_discover_projects(root_dir: &Path, config: &DriftiveRepoConfig) -> Vec<Project> {
    let candidates = match candidate_dirs(root_dir, config) {
        Ok(dirs) => dirs,
        Err(err) => {
            error!("Project discovery failed: {err}");
            return Vec::new();
        }
    };

    // BTreeMap keyed by dir: one project per directory, deterministic order.
    let mut projects: BTreeMap<PathBuf, Project> = BTreeMap::new();
    for dir in candidates {
        for rule in &config.auto_discover.project_rules {
            if dir_has_match(&dir, &rule.pattern) {
                projects.insert(
                    dir.clone(),
                    Project::new(dir.clone(), ProjectKind::from_executable(&rule.executable)),
                );
                break;
            }
        }
    }

    projects.into_values().collect()
}

/// Directories containing at least one included, non-excluded file.
fn candidate_dirs(root_dir: &Path, config: &DriftiveRepoConfig) -> Result<Vec<PathBuf>, ConfigError> {
    let inclusions = build_glob_set(&config.auto_discover.inclusions)?;
    let exclusions = build_glob_set(&config.auto_discover.exclusions)?;

    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root_dir) else {
            continue;
        };
        if inclusions.is_match(relative) && !excluded(&exclusions, relative) {
            if let Some(parent) = entry.path().parent() {
                let parent = parent.to_path_buf();
                if !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        }
    }
    Ok(dirs)
}

/// A path is excluded when the path itself or any of its ancestors matches.
fn excluded(set: &GlobSet, relative: &Path) -> bool {
    if set.is_match(relative) {
        return true;
    }
    relative.ancestors().skip(1).any(|a| set.is_match(a))
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Leading "/" anchors a pattern at the repository root; relative
        // candidate paths carry no leading separator.
        let normalized = pattern.strip_prefix('/').unwrap_or(pattern);
        let glob = Glob::new(normalized).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::InvalidPattern {
        pattern: String::new(),
        source,
    })
}

/// True when a file directly inside `dir` matches the rule pattern.
fn dir_has_match(dir: &Path, pattern: &str) -> bool {
    let Ok(glob) = Glob::new(pattern) else {
        debug!("Skipping invalid project rule pattern: {pattern}");
        return false;
    };
    let matcher = glob.compile_matcher();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .any(|e| matcher.is_match(PathBuf::from(e.file_name())))
}

#[cfg(test)]
mod tests {
    use super::auto_discover_projects;
    use crate::models::ProjectKind;
    use crate::repo::DriftiveRepoConfig;
    use std::fs;

    fn touch(path: &std::path::Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn discovers_terraform_and_terragrunt_projects() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("infra/a/main.tf"));
        touch(&root.path().join("infra/b/terragrunt.hcl"));
        touch(&root.path().join("README.md"));

        let projects = auto_discover_projects(root.path(), &DriftiveRepoConfig::default());
        assert_eq!(projects.len(), 2);

        let a = projects
            .iter()
            .find(|p| p.dir.ends_with("infra/a"))
            .unwrap();
        assert_eq!(a.kind, ProjectKind::Terraform);

        let b = projects
            .iter()
            .find(|p| p.dir.ends_with("infra/b"))
            .unwrap();
        assert_eq!(b.kind, ProjectKind::Terragrunt);
    }

    #[test]
    fn root_terragrunt_file_is_not_a_project() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("terragrunt.hcl"));
        touch(&root.path().join("infra/a/terragrunt.hcl"));

        let projects = auto_discover_projects(root.path(), &DriftiveRepoConfig::default());
        assert_eq!(projects.len(), 1);
        assert!(projects[0].dir.ends_with("infra/a"));
    }

    #[test]
    fn cache_and_module_dirs_are_excluded() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("infra/a/main.tf"));
        touch(&root.path().join("infra/a/.terragrunt-cache/x/main.tf"));
        touch(&root.path().join("modules/vpc/main.tf"));

        let projects = auto_discover_projects(root.path(), &DriftiveRepoConfig::default());
        assert_eq!(projects.len(), 1);
        assert!(projects[0].dir.ends_with("infra/a"));
    }

    #[test]
    fn first_matching_rule_wins() {
        // A directory with both marker files is classified by the
        // terragrunt rule, which is listed first in the defaults.
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("infra/mixed/terragrunt.hcl"));
        touch(&root.path().join("infra/mixed/main.tf"));

        let projects = auto_discover_projects(root.path(), &DriftiveRepoConfig::default());
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].kind, ProjectKind::Terragrunt);
    }
}
