//! Execution adapters for the supported planning tools.
//!
//! Each adapter invokes its external binary inside the project directory.
//! Output is captured combined (stdout then stderr) because the planners
//! split diagnostics across both streams and the classifier needs all of it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use config::{Project, ProjectKind};

use crate::parsing;

/// Terragrunt wraps terraform/tofu and by default swallows the wrapped
/// planner's stdout; the forward toggle keeps the native text inline so the
/// classifier can pattern-match it.
const TERRAGRUNT_FORWARD_ENV: (&str, &str) = ("TERRAGRUNT_FORWARD_TF_STDOUT", "true");

/// Errors from invoking an external planning tool.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The tool ran but exited non-zero. Carries the combined output so the
    /// caller can keep an excerpt.
    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        output: String,
    },

    /// The tool could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled by a process-level shutdown.
    #[error("{program} was cancelled")]
    Cancelled { program: String },
}

impl ExecError {
    /// Combined output captured before the failure, if any.
    pub fn output(&self) -> &str {
        match self {
            Self::Failed { output, .. } => output,
            Self::Spawn { .. } | Self::Cancelled { .. } => "",
        }
    }
}

/// Run `program` with `args` inside `dir`, returning the combined output.
///
/// The child is killed when `cancel` fires; in-flight planners must not
/// outlive a shutdown.
pub async fn run_command_in_dir(
    cancel: &CancellationToken,
    dir: &Path,
    program: &str,
    envs: &[(&str, &str)],
    args: &[&str],
) -> Result<String, ExecError> {
    debug!(dir = %dir.display(), program, ?args, "Running command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?,
        () = cancel.cancelled() => {
            return Err(ExecError::Cancelled {
                program: program.to_string(),
            });
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        Err(ExecError::Failed {
            program: program.to_string(),
            status: output.status,
            output: combined,
        })
    }
}

/// Capability interface of a planning tool: init and plan inside one
/// project directory, plus output classification helpers.
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn init(&self, args: &[&str]) -> Result<String, ExecError>;
    async fn plan(&self, args: &[&str]) -> Result<String, ExecError>;

    /// Extract the displayable excerpt from a drifted plan output.
    fn parse_plan(&self, output: &str) -> String {
        parsing::parse_plan(output)
    }

    /// Extract the displayable excerpt from a failed command's output.
    fn parse_error_output(&self, output: &str) -> String {
        parsing::parse_error_output(output)
    }
}

fn subcommand<'a>(name: &'a str, args: &[&'a str]) -> Vec<&'a str> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(name);
    full.extend_from_slice(args);
    full
}

pub struct TerraformExecutor {
    dir: PathBuf,
    cancel: CancellationToken,
}

impl TerraformExecutor {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            dir: dir.into(),
            cancel,
        }
    }
}

#[async_trait]
impl PlanExecutor for TerraformExecutor {
    async fn init(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "terraform",
            &[],
            &subcommand("init", args),
        )
        .await
    }

    async fn plan(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "terraform",
            &[],
            &subcommand("plan", args),
        )
        .await
    }
}

pub struct TofuExecutor {
    dir: PathBuf,
    cancel: CancellationToken,
}

impl TofuExecutor {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            dir: dir.into(),
            cancel,
        }
    }
}

#[async_trait]
impl PlanExecutor for TofuExecutor {
    async fn init(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "tofu",
            &[],
            &subcommand("init", args),
        )
        .await
    }

    async fn plan(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "tofu",
            &[],
            &subcommand("plan", args),
        )
        .await
    }
}

pub struct TerragruntExecutor {
    dir: PathBuf,
    cancel: CancellationToken,
}

impl TerragruntExecutor {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            dir: dir.into(),
            cancel,
        }
    }
}

#[async_trait]
impl PlanExecutor for TerragruntExecutor {
    async fn init(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "terragrunt",
            &[TERRAGRUNT_FORWARD_ENV],
            &subcommand("init", args),
        )
        .await
    }

    async fn plan(&self, args: &[&str]) -> Result<String, ExecError> {
        run_command_in_dir(
            &self.cancel,
            &self.dir,
            "terragrunt",
            &[TERRAGRUNT_FORWARD_ENV],
            &subcommand("plan", args),
        )
        .await
    }
}

/// Build the executor for a project kind.
pub fn new_executor(
    dir: &Path,
    kind: ProjectKind,
    cancel: CancellationToken,
) -> Box<dyn PlanExecutor> {
    match kind {
        ProjectKind::Terraform => Box::new(TerraformExecutor::new(dir, cancel)),
        ProjectKind::Tofu => Box::new(TofuExecutor::new(dir, cancel)),
        ProjectKind::Terragrunt => Box::new(TerragruntExecutor::new(dir, cancel)),
    }
}

/// Source of executors for the detector. Production code uses
/// [`ToolExecutors`]; tests substitute canned-output fakes.
pub trait ExecutorProvider: Send + Sync {
    fn executor_for(&self, project: &Project, cancel: CancellationToken) -> Box<dyn PlanExecutor>;
}

/// Dispatches to the real external binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolExecutors;

impl ExecutorProvider for ToolExecutors {
    fn executor_for(&self, project: &Project, cancel: CancellationToken) -> Box<dyn PlanExecutor> {
        new_executor(&project.dir, project.kind, cancel)
    }
}
