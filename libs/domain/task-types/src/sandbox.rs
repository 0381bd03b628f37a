use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{instrument, warn};

use crate::errors::SandboxError;

/// Outcome of one sandboxed run. `timed_out` distinguishes a wall-clock
/// kill from a normal exit for the comparator/scoring layer above.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_time: Duration,
    pub timed_out: bool,
}

/// Process-isolation seam used by task-type executors. CPU and memory
/// ceilings beyond wall-clock are left to a real isolation layer
/// (cgroups/seccomp); this baseline only bounds wall-clock time, per the
/// sandbox-internals exclusion in §1.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(
        &self,
        executable: &Path,
        args: &[String],
        stdin_path: Option<&Path>,
        wall_time_limit: Duration,
    ) -> Result<SandboxOutcome, SandboxError>;
}

pub struct ProcessSandbox;

#[async_trait]
impl Sandbox for ProcessSandbox {
    #[instrument(skip(self, args))]
    async fn run(
        &self,
        executable: &Path,
        args: &[String],
        stdin_path: Option<&Path>,
        wall_time_limit: Duration,
    ) -> Result<SandboxOutcome, SandboxError> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        if let Some(path) = stdin_path {
            let stdin_file = std::fs::File::open(path)?;
            command.stdin(std::process::Stdio::from(stdin_file));
        } else {
            command.stdin(std::process::Stdio::null());
        }

        let start = std::time::Instant::now();
        let child = command.spawn()?;

        match timeout(wall_time_limit, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(SandboxOutcome {
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
                wall_time: start.elapsed(),
                timed_out: false,
            }),
            Ok(Err(io_err)) => Err(SandboxError::Spawn(io_err)),
            Err(_) => {
                warn!(?wall_time_limit, "sandboxed process exceeded wall-clock budget");
                Ok(SandboxOutcome {
                    exit_code: None,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    wall_time: wall_time_limit,
                    timed_out: true,
                })
            }
        }
    }
}
