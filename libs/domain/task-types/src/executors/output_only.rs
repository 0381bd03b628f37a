use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CompileOutcome, EvaluateOutcome, TaskType};
use crate::comparator::Comparator;
use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

#[derive(Debug, Deserialize, Default)]
struct OutputOnlyParameters {
    #[serde(default)]
    comparator: OutputOnlyComparator,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum OutputOnlyComparator {
    #[default]
    Exact,
    WhitespaceNormalized,
}

impl From<OutputOnlyComparator> for Comparator {
    fn from(value: OutputOnlyComparator) -> Self {
        match value {
            OutputOnlyComparator::Exact => Comparator::Exact,
            OutputOnlyComparator::WhitespaceNormalized => Comparator::WhitespaceNormalized,
        }
    }
}

/// No compilation: the submission *is* the set of per-testcase outputs.
/// Evaluation just compares the submitted file for a testcase's
/// codename against the expected output (§4.6).
pub struct OutputOnlyTaskType;

#[async_trait]
impl TaskType for OutputOnlyTaskType {
    async fn compile(
        &self,
        sources: &HashMap<String, PathBuf>,
        _parameters: &serde_json::Value,
        _sandbox: &dyn Sandbox,
        _workdir: &Path,
    ) -> Result<CompileOutcome, ExecutorError> {
        Ok(CompileOutcome {
            success: true,
            text: None,
            executables: sources.clone(),
        })
    }

    async fn evaluate(
        &self,
        executables: &HashMap<String, PathBuf>,
        input_path: &Path,
        expected_output: &Path,
        parameters: &serde_json::Value,
        _sandbox: &dyn Sandbox,
        _time_limit: Duration,
    ) -> Result<EvaluateOutcome, ExecutorError> {
        let params: OutputOnlyParameters = if parameters.is_null() {
            OutputOnlyParameters::default()
        } else {
            serde_json::from_value(parameters.clone())
                .map_err(|e| ExecutorError::InvalidParameters(e.to_string()))?
        };

        let codename = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let Some(submitted) = executables.get(codename) else {
            return Ok(EvaluateOutcome {
                outcome: 0.0,
                text: Some(format!("No output submitted for {codename}")),
                execution_time: Duration::ZERO,
            });
        };

        let actual = std::fs::read(submitted)?;
        let expected = std::fs::read(expected_output)?;
        let comparator: Comparator = params.comparator.into();
        let matches = comparator.compare(&actual, &expected);

        Ok(EvaluateOutcome {
            outcome: if matches { 1.0 } else { 0.0 },
            text: Some(if matches { "Output is correct".into() } else { "Wrong answer".into() }),
            execution_time: Duration::ZERO,
        })
    }
}
