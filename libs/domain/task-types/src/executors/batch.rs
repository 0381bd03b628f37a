use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{render_args, CompileOutcome, EvaluateOutcome, TaskType};
use crate::comparator::Comparator;
use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

#[derive(Debug, Deserialize)]
pub(crate) struct BatchCompileParams {
    compiler: String,
    #[serde(default = "default_compile_args")]
    compile_args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchParameters {
    #[serde(flatten)]
    compile: BatchCompileParams,
    #[serde(default)]
    comparator: BatchComparator,
}

fn default_compile_args() -> Vec<String> {
    vec!["-O2".into(), "-o".into(), "{output}".into(), "{input}".into()]
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum BatchComparator {
    #[default]
    Exact,
    WhitespaceNormalized,
}

impl From<BatchComparator> for Comparator {
    fn from(value: BatchComparator) -> Self {
        match value {
            BatchComparator::Exact => Comparator::Exact,
            BatchComparator::WhitespaceNormalized => Comparator::WhitespaceNormalized,
        }
    }
}

/// Single-source compilation to one executable; evaluation runs that
/// executable on each testcase's input and compares stdout to the
/// expected output (§4.6).
pub struct BatchTaskType;

/// Shared compile step: invoke a configured compiler against the first
/// submitted source file. Reused by Batch and Communication, which
/// compile the contestant program identically and only differ in how
/// evaluation drives it (§4.6).
pub(crate) async fn compile_with(
    sources: &HashMap<String, PathBuf>,
    parameters: &serde_json::Value,
    sandbox: &dyn Sandbox,
    workdir: &Path,
) -> Result<CompileOutcome, ExecutorError> {
    let params: BatchCompileParams = serde_json::from_value(parameters.clone())
        .map_err(|e| ExecutorError::InvalidParameters(e.to_string()))?;

    let Some(source) = sources.values().next() else {
        return Ok(CompileOutcome {
            success: false,
            text: Some("no source files submitted".into()),
            executables: HashMap::new(),
        });
    };

    let output_path = workdir.join("a.out");
    let mut vars = HashMap::new();
    let input_str = source.to_string_lossy();
    let output_str = output_path.to_string_lossy();
    vars.insert("input", input_str.as_ref());
    vars.insert("output", output_str.as_ref());
    let args = render_args(&params.compile_args, &vars);

    let compiler_path = Path::new(&params.compiler);
    let outcome = sandbox
        .run(compiler_path, &args, None, Duration::from_secs(30))
        .await?;

    if outcome.timed_out || outcome.exit_code != Some(0) {
        return Ok(CompileOutcome {
            success: false,
            text: Some(String::from_utf8_lossy(&outcome.stderr).to_string()),
            executables: HashMap::new(),
        });
    }

    let mut executables = HashMap::new();
    executables.insert("main".to_string(), output_path);
    Ok(CompileOutcome {
        success: true,
        text: None,
        executables,
    })
}

#[async_trait]
impl TaskType for BatchTaskType {
    async fn compile(
        &self,
        sources: &HashMap<String, PathBuf>,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        workdir: &Path,
    ) -> Result<CompileOutcome, ExecutorError> {
        compile_with(sources, parameters, sandbox, workdir).await
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
        let params: BatchParameters = serde_json::from_value(parameters.clone())
            .map_err(|e| ExecutorError::InvalidParameters(e.to_string()))?;

        let executable = executables
            .get("main")
            .ok_or_else(|| ExecutorError::InvalidParameters("missing 'main' executable".into()))?;

        let outcome = sandbox
            .run(executable, &[], Some(input_path), time_limit)
            .await?;

        if outcome.timed_out {
            return Ok(EvaluateOutcome {
                outcome: 0.0,
                text: Some("Time limit exceeded".into()),
                execution_time: outcome.wall_time,
            });
        }
        if outcome.exit_code != Some(0) {
            return Ok(EvaluateOutcome {
                outcome: 0.0,
                text: Some(format!("Runtime error (exit code {:?})", outcome.exit_code)),
                execution_time: outcome.wall_time,
            });
        }

        let expected = std::fs::read(expected_output)?;
        let comparator: Comparator = params.comparator.into();
        let matches = comparator.compare(&outcome.stdout, &expected);

        Ok(EvaluateOutcome {
            outcome: if matches { 1.0 } else { 0.0 },
            text: Some(if matches { "Output is correct".into() } else { "Wrong answer".into() }),
            execution_time: outcome.wall_time,
        })
    }
}
