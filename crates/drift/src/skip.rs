//! PR suppression filter.
//!
//! A drifted project whose directory is already touched by an open pull
//! request is being fixed by a human; notifying about it again would
//! duplicate the effort. Matching is exact folder equality between the
//! changed file's directory and the project directory, both relative to
//! the repository root.

use std::path::Path;

use tracing::warn;

use crate::models::DriftDetectionResult;

/// Mark drifted projects covered by open-PR changes as skipped and deduct
/// them from the drift total.
pub(crate) fn handle_skip_if_contains_pr_changes(
    repo_dir: &Path,
    open_pr_changed_files: &[String],
    result: &mut DriftDetectionResult,
) {
    if result.total_drifted == 0 || open_pr_changed_files.is_empty() {
        return;
    }

    for project_result in &mut result.project_results {
        if !project_result.drifted || project_result.skipped_due_to_pr {
            continue;
        }
        let project_folder = remove_repo_dir_prefix(repo_dir, &project_result.project.dir);
        for file in open_pr_changed_files {
            if folder_of(file) == project_folder {
                project_result.skipped_due_to_pr = true;
                result.total_drifted -= 1;
                warn!(
                    "Marking project {} as skipped due to open PR",
                    project_result.project.dir.display()
                );
                break;
            }
        }
    }
}

/// Containing folder of a repo-relative file path, without trailing slash.
fn folder_of(file: &str) -> &str {
    Path::new(file)
        .parent()
        .and_then(Path::to_str)
        .unwrap_or("")
}

/// Project directory relative to the repository root, without trailing
/// slash.
fn remove_repo_dir_prefix(repo_dir: &Path, project_dir: &Path) -> String {
    project_dir
        .strip_prefix(repo_dir)
        .unwrap_or(project_dir)
        .to_string_lossy()
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DriftDetectionResult, DriftProjectResult};
    use config::{Project, ProjectKind};
    use std::time::Duration;

    fn mocked_result(repo_dir: &str, total: usize, drifted: usize) -> DriftDetectionResult {
        let project_results = (0..total)
            .map(|i| DriftProjectResult {
                project: Project::new(
                    format!("{repo_dir}gcp/myproject/app{}", i + 1),
                    ProjectKind::Terragrunt,
                ),
                drifted: i < drifted,
                succeeded: true,
                init_output: "FakeInitOutput".to_string(),
                plan_output: "FakePlanOutput".to_string(),
                skipped_due_to_pr: false,
            })
            .collect();

        DriftDetectionResult {
            project_results,
            total_drifted: drifted,
            total_projects: total,
            total_checked: total,
            duration: Duration::from_secs(300),
        }
    }

    #[test]
    fn skips_projects_touched_by_open_prs() {
        let repo_dir = "/home/user/repo_dir/";
        let mut result = mocked_result(repo_dir, 4, 3);
        let changed_files = vec![
            "gcp/myproject/app1/main.tf".to_string(),
            "gcp/myproject/app1/something.tf".to_string(),
            "gcp/myproject/app2/main.tf".to_string(),
        ];

        handle_skip_if_contains_pr_changes(
            Path::new(repo_dir),
            &changed_files,
            &mut result,
        );

        let total_skipped = result
            .project_results
            .iter()
            .filter(|r| r.skipped_due_to_pr)
            .count();
        assert_eq!(total_skipped, 2);
        assert_eq!(result.total_drifted, 1);
    }

    #[test]
    fn unrelated_changed_files_do_not_suppress() {
        let repo_dir = "/home/user/repo_dir/";
        let mut result = mocked_result(repo_dir, 2, 2);
        let changed_files = vec!["gcp/myproject/app1/main.tf".to_string()];

        handle_skip_if_contains_pr_changes(
            Path::new(repo_dir),
            &changed_files,
            &mut result,
        );

        let app1 = &result.project_results[0];
        let app2 = &result.project_results[1];
        assert!(app1.skipped_due_to_pr);
        assert!(!app2.skipped_due_to_pr);
        assert_eq!(result.total_drifted, 1);
    }

    #[test]
    fn empty_changed_files_is_a_noop() {
        let repo_dir = "/home/user/repo_dir/";
        let mut result = mocked_result(repo_dir, 2, 2);

        handle_skip_if_contains_pr_changes(Path::new(repo_dir), &[], &mut result);

        assert_eq!(result.total_drifted, 2);
        assert!(result.project_results.iter().all(|r| !r.skipped_due_to_pr));
    }

    #[test]
    fn folder_helpers_normalize_slashes() {
        assert_eq!(folder_of("gcp/myproject/app1/main.tf"), "gcp/myproject/app1");
        assert_eq!(
            remove_repo_dir_prefix(
                Path::new("/home/user/repo_dir"),
                Path::new("/home/user/repo_dir/gcp/myproject/app1"),
            ),
            "gcp/myproject/app1"
        );
    }
}
