use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{CompileOutcome, EvaluateOutcome, TaskType};
use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

/// Documented only by its parameter schema (§4.6): two sequential
/// compilation stages feeding into a single evaluation run, e.g. a
/// contestant-supplied header compiled against a hidden test harness.
/// Reuses Batch's single-command compile/run shape for each step since
/// the source does not specify a distinct strategy beyond the schema.
pub struct TwoStepsTaskType;

#[async_trait]
impl TaskType for TwoStepsTaskType {
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
        super::batch::BatchTaskType
            .evaluate(executables, input_path, expected_output, parameters, sandbox, time_limit)
            .await
    }
}
