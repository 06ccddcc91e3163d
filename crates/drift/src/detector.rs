//! Bounded-concurrency drift analysis scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use config::{DriftiveConfig, DriftiveRepoConfig, Project};

use crate::exec::{ExecutorProvider, PlanExecutor, ToolExecutors};
use crate::models::{DriftDetectionResult, DriftProjectResult};
use crate::parsing;
use crate::skip;

const INIT_ARGS: [&str; 3] = ["-upgrade", "-lock=false", "-no-color"];
const PLAN_ARGS: [&str; 2] = ["-lock=false", "-no-color"];

/// Runs the drift analysis over a set of projects.
pub struct DriftDetector {
    repo_dir: PathBuf,
    projects: Vec<Project>,
    concurrency: usize,
    skip_if_open_pr: bool,
    open_pr_changed_files: Vec<String>,
    executors: Arc<dyn ExecutorProvider>,
}

impl DriftDetector {
    pub fn new(
        repo_dir: impl Into<PathBuf>,
        projects: Vec<Project>,
        config: &DriftiveConfig,
        repo_config: &DriftiveRepoConfig,
        open_pr_changed_files: Vec<String>,
    ) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            projects,
            concurrency: config.concurrency,
            skip_if_open_pr: repo_config.settings.skip_if_open_pr,
            open_pr_changed_files,
            executors: Arc::new(ToolExecutors),
        }
    }

    /// Replace the executor source. Used by tests to avoid spawning real
    /// planner binaries.
    pub fn with_executors(mut self, executors: Arc<dyn ExecutorProvider>) -> Self {
        self.executors = executors;
        self
    }

    /// Analyze every project and aggregate the results.
    ///
    /// One task per project, bounded by a semaphore of `concurrency`
    /// permits (clamped to at least one). A failing project never aborts
    /// the batch. Result order is not guaranteed to match input order.
    pub async fn detect_drift(&self, cancel: &CancellationToken) -> DriftDetectionResult {
        info!(
            "Starting drift analysis in {}. Concurrency: {}",
            self.repo_dir.display(),
            self.concurrency
        );

        let total_projects = self.projects.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<DriftProjectResult>(total_projects.max(1));
        let mut tasks = JoinSet::new();
        let mut total_checked = 0usize;
        let start = Instant::now();

        for (idx, project) in self.projects.iter().enumerate() {
            // The repository root itself is never a project.
            let Some(project_dir) = relative_project_dir(&self.repo_dir, &project.dir) else {
                continue;
            };

            total_checked += 1;
            info!(
                "Checking drift in project {}/{}: {} ({})",
                idx + 1,
                total_projects,
                project_dir,
                project.kind.as_str()
            );

            let executor = self.executors.executor_for(project, cancel.child_token());
            let project = project.clone();
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = analyze_project(executor.as_ref(), project, &project_dir).await;
                // Channel capacity equals the task count; send cannot block.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        // Join barrier: aggregation must not observe a partial batch.
        while tasks.join_next().await.is_some() {}

        let mut project_results = Vec::with_capacity(total_checked);
        while let Some(result) = rx.recv().await {
            project_results.push(result);
        }

        let total_drifted = project_results.iter().filter(|r| r.drifted).count();

        let mut result = DriftDetectionResult {
            project_results,
            total_drifted,
            total_projects,
            total_checked,
            duration: start.elapsed(),
        };

        if self.skip_if_open_pr {
            skip::handle_skip_if_contains_pr_changes(
                &self.repo_dir,
                &self.open_pr_changed_files,
                &mut result,
            );
        }

        result
    }
}

/// Project directory relative to the repository root, or `None` for the
/// root itself.
fn relative_project_dir(repo_dir: &Path, project_dir: &Path) -> Option<String> {
    let relative = project_dir.strip_prefix(repo_dir).unwrap_or(project_dir);
    let display = relative.to_string_lossy();
    let trimmed = display.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

async fn analyze_project(
    executor: &dyn PlanExecutor,
    project: Project,
    project_dir: &str,
) -> DriftProjectResult {
    if let Err(err) = executor.init(&INIT_ARGS).await {
        info!("Error running init command in {}: {err}", project.dir.display());
        return DriftProjectResult {
            project,
            drifted: false,
            succeeded: false,
            init_output: err.output().to_string(),
            plan_output: String::new(),
            skipped_due_to_pr: false,
        };
    }

    match executor.plan(&PLAN_ARGS).await {
        Ok(output) => {
            let drifted = parsing::is_drift_detected(&output);
            if drifted {
                info!("Drift detected in project {project_dir}");
            }
            let plan_output = if drifted {
                executor.parse_plan(&output)
            } else {
                output
            };
            DriftProjectResult {
                project,
                drifted,
                succeeded: true,
                init_output: String::new(),
                plan_output,
                skipped_due_to_pr: false,
            }
        }
        Err(err) => {
            info!("Error running plan command in {}: {err}", project.dir.display());
            DriftProjectResult {
                project,
                drifted: false,
                succeeded: false,
                init_output: String::new(),
                plan_output: executor.parse_error_output(err.output()),
                skipped_due_to_pr: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecError, ExecutorProvider, PlanExecutor};
    use async_trait::async_trait;
    use config::{DriftiveConfig, DriftiveRepoConfig, ProjectKind};
    use std::collections::HashMap;
    use std::collections::HashSet;

    const NO_DRIFT_OUTPUT: &str = "No changes. Your infrastructure matches the configuration.";
    const DRIFT_OUTPUT: &str = "Terraform will perform the following actions:\n  ~ resource";

    struct FakeExecutor {
        plan_output: Result<String, String>,
    }

    #[async_trait]
    impl PlanExecutor for FakeExecutor {
        async fn init(&self, _args: &[&str]) -> Result<String, ExecError> {
            Ok("Initialized".to_string())
        }

        async fn plan(&self, _args: &[&str]) -> Result<String, ExecError> {
            match &self.plan_output {
                Ok(output) => Ok(output.clone()),
                Err(output) => {
                    use std::os::unix::process::ExitStatusExt;
                    Err(ExecError::Failed {
                        program: "terraform".to_string(),
                        status: std::process::ExitStatus::from_raw(256),
                        output: output.clone(),
                    })
                }
            }
        }
    }

    /// Maps project dirs to canned plan outputs.
    struct FakeProvider {
        outputs: HashMap<String, Result<String, String>>,
    }

    impl ExecutorProvider for FakeProvider {
        fn executor_for(
            &self,
            project: &Project,
            _cancel: CancellationToken,
        ) -> Box<dyn PlanExecutor> {
            let plan_output = self
                .outputs
                .get(project.dir.to_str().unwrap())
                .cloned()
                .unwrap_or_else(|| Ok(NO_DRIFT_OUTPUT.to_string()));
            Box::new(FakeExecutor { plan_output })
        }
    }

    fn detector_with(
        repo_dir: &str,
        projects: Vec<Project>,
        concurrency: usize,
        outputs: HashMap<String, Result<String, String>>,
    ) -> DriftDetector {
        let config = DriftiveConfig {
            repository_url: None,
            branch: None,
            repository_path: Some(repo_dir.into()),
            concurrency,
            log_level: "info".to_string(),
            stdout_result: false,
            slack_webhook_url: None,
            github_token: None,
            github_context: None,
            exit_code: false,
        };
        let repo_config = DriftiveRepoConfig::default();
        DriftDetector::new(repo_dir, projects, &config, &repo_config, Vec::new())
            .with_executors(Arc::new(FakeProvider { outputs }))
    }

    #[tokio::test]
    async fn returns_one_result_per_project_for_all_concurrency_levels() {
        let repo_dir = "/repo";
        let projects: Vec<Project> = (0..7)
            .map(|i| Project::new(format!("/repo/infra/p{i}"), ProjectKind::Terraform))
            .collect();

        for concurrency in [1, 2, 8] {
            let detector =
                detector_with(repo_dir, projects.clone(), concurrency, HashMap::new());
            let result = detector.detect_drift(&CancellationToken::new()).await;

            assert_eq!(result.project_results.len(), 7, "concurrency={concurrency}");
            assert_eq!(result.total_checked, 7);
            assert_eq!(result.total_projects, 7);

            let dirs: HashSet<_> = result
                .project_results
                .iter()
                .map(|r| r.project.dir.clone())
                .collect();
            let expected: HashSet<_> = projects.iter().map(|p| p.dir.clone()).collect();
            assert_eq!(dirs, expected);
        }
    }

    #[tokio::test]
    async fn repo_root_is_never_analyzed() {
        let projects = vec![
            Project::new("/repo", ProjectKind::Terraform),
            Project::new("/repo/infra/a", ProjectKind::Terraform),
        ];
        let detector = detector_with("/repo", projects, 2, HashMap::new());
        let result = detector.detect_drift(&CancellationToken::new()).await;

        assert_eq!(result.project_results.len(), 1);
        assert_eq!(result.total_checked, 1);
        assert_eq!(result.total_projects, 2);
    }

    #[tokio::test]
    async fn classifies_drifted_and_clean_projects() {
        let projects = vec![
            Project::new("/repo/infra/a", ProjectKind::Terraform),
            Project::new("/repo/infra/b", ProjectKind::Terragrunt),
        ];
        let mut outputs = HashMap::new();
        outputs.insert("/repo/infra/a".to_string(), Ok(NO_DRIFT_OUTPUT.to_string()));
        outputs.insert("/repo/infra/b".to_string(), Ok(DRIFT_OUTPUT.to_string()));

        let detector = detector_with("/repo", projects, 2, outputs);
        let result = detector.detect_drift(&CancellationToken::new()).await;

        assert_eq!(result.total_drifted, 1);
        assert_eq!(result.total_projects, 2);

        let a = result
            .project_results
            .iter()
            .find(|r| r.project.dir.ends_with("infra/a"))
            .unwrap();
        assert!(!a.drifted);
        assert!(a.succeeded);

        let b = result
            .project_results
            .iter()
            .find(|r| r.project.dir.ends_with("infra/b"))
            .unwrap();
        assert!(b.drifted);
        assert!(
            b.plan_output
                .starts_with("Terraform will perform the following actions:")
        );
    }

    #[tokio::test]
    async fn one_failing_project_does_not_abort_the_batch() {
        let projects = vec![
            Project::new("/repo/infra/bad", ProjectKind::Terraform),
            Project::new("/repo/infra/good", ProjectKind::Terraform),
        ];
        let mut outputs = HashMap::new();
        outputs.insert(
            "/repo/infra/bad".to_string(),
            Err("Refreshing state...\nError: backend unreachable".to_string()),
        );

        let detector = detector_with("/repo", projects, 1, outputs);
        let result = detector.detect_drift(&CancellationToken::new()).await;

        assert_eq!(result.project_results.len(), 2);

        let bad = result
            .project_results
            .iter()
            .find(|r| r.project.dir.ends_with("bad"))
            .unwrap();
        assert!(!bad.succeeded);
        assert!(!bad.drifted);
        assert_eq!(bad.plan_output, "Error: backend unreachable");

        let good = result
            .project_results
            .iter()
            .find(|r| r.project.dir.ends_with("good"))
            .unwrap();
        assert!(good.succeeded);
    }
}
