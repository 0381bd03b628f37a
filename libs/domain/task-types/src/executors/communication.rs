use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{render_args, CompileOutcome, EvaluateOutcome, TaskType};
use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

#[derive(Debug, Deserialize)]
struct CommunicationParameters {
    manager: String,
    #[serde(default = "default_manager_args")]
    manager_args: Vec<String>,
}

fn default_manager_args() -> Vec<String> {
    vec!["{input}".into(), "{expected_output}".into()]
}

/// Two-process evaluation: the contestant's program communicates over
/// pipes with a task-provided manager; the manager's exit code and
/// stdout drive the outcome (§4.6).
pub struct CommunicationTaskType;

#[async_trait]
impl TaskType for CommunicationTaskType {
    async fn compile(
        &self,
        sources: &HashMap<String, PathBuf>,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        workdir: &Path,
    ) -> Result<CompileOutcome, ExecutorError> {
        // Communication tasks compile the contestant program the same
        // way Batch does; the manager itself ships precompiled as a
        // dataset manager file and is never rebuilt here.
        super::batch::compile_with(sources, parameters, sandbox, workdir).await
    }

    async fn evaluate(
        &self,
        executables: &HashMap<String, PathBuf>,
        input_path: &Path,
        expected_output: &Path,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        time_limit: Duration,
    ) -> Result<EvaluateOutcome, ExecutorError> {
        let params: CommunicationParameters = serde_json::from_value(parameters.clone())
            .map_err(|e| ExecutorError::InvalidParameters(e.to_string()))?;

        let contestant = executables
            .get("main")
            .ok_or_else(|| ExecutorError::InvalidParameters("missing 'main' executable".into()))?;

        let contestant_run = sandbox
            .run(contestant, &[], Some(input_path), time_limit)
            .await?;

        if contestant_run.timed_out {
            return Ok(EvaluateOutcome {
                outcome: 0.0,
                text: Some("Time limit exceeded".into()),
                execution_time: contestant_run.wall_time,
            });
        }

        let manager_output_path = input_path.with_extension("manager_in");
        std::fs::write(&manager_output_path, &contestant_run.stdout)?;

        let mut vars = HashMap::new();
        let input_str = input_path.to_string_lossy();
        let expected_str = expected_output.to_string_lossy();
        vars.insert("input", input_str.as_ref());
        vars.insert("expected_output", expected_str.as_ref());
        let args = render_args(&params.manager_args, &vars);

        let manager_run = sandbox
            .run(
                Path::new(&params.manager),
                &args,
                Some(&manager_output_path),
                time_limit,
            )
            .await?;

        let accepted = !manager_run.timed_out && manager_run.exit_code == Some(0);
        Ok(EvaluateOutcome {
            outcome: if accepted { 1.0 } else { 0.0 },
            text: Some(String::from_utf8_lossy(&manager_run.stdout).to_string()),
            execution_time: contestant_run.wall_time + manager_run.wall_time,
        })
    }
}
