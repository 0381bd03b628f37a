use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{CompileOutcome, EvaluateOutcome, TaskType};
use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

/// Documented only by its parameter schema (§4.6). A Custom task type
/// delegates both phases to an external checker named in `parameters`,
/// invoked as a single sandboxed process that receives the input and
/// expected output paths and reports a `[0, 1]` outcome on stdout.
pub struct CustomTaskType;

#[derive(Debug, serde::Deserialize)]
struct CustomParameters {
    checker: String,
}

#[async_trait]
impl TaskType for CustomTaskType {
    async fn compile(
        &self,
        sources: &HashMap<String, PathBuf>,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        workdir: &Path,
    ) -> Result<CompileOutcome, ExecutorError> {
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
        let params: CustomParameters = serde_json::from_value(parameters.clone())
            .map_err(|e| ExecutorError::InvalidParameters(e.to_string()))?;

        let executable = executables
            .get("main")
            .ok_or_else(|| ExecutorError::InvalidParameters("missing 'main' executable".into()))?;

        let run = sandbox.run(executable, &[], Some(input_path), time_limit).await?;
        if run.timed_out {
            return Ok(EvaluateOutcome {
                outcome: 0.0,
                text: Some("Time limit exceeded".into()),
                execution_time: run.wall_time,
            });
        }

        let contestant_output_path = input_path.with_extension("contestant_out");
        std::fs::write(&contestant_output_path, &run.stdout)?;

        let checker_args = vec![
            input_path.to_string_lossy().to_string(),
            contestant_output_path.to_string_lossy().to_string(),
            expected_output.to_string_lossy().to_string(),
        ];
        let checker_run = sandbox
            .run(Path::new(&params.checker), &checker_args, None, time_limit)
            .await?;

        let outcome = String::from_utf8_lossy(&checker_run.stdout)
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Ok(EvaluateOutcome {
            outcome,
            text: Some(String::from_utf8_lossy(&checker_run.stderr).to_string()),
            execution_time: run.wall_time + checker_run.wall_time,
        })
    }
}
