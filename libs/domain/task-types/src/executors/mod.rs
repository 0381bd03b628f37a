pub mod batch;
pub mod communication;
pub mod custom;
pub mod output_only;
pub mod two_steps;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ExecutorError;
use crate::sandbox::Sandbox;

/// Result of the `prepare`/compile phase.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    pub text: Option<String>,
    /// Named output files produced on disk, keyed the same way the Job
    /// expects its executables map to be keyed.
    pub executables: HashMap<String, std::path::PathBuf>,
}

/// Result of the `execute`/`collect` phase for one testcase.
#[derive(Debug, Clone)]
pub struct EvaluateOutcome {
    pub outcome: f64,
    pub text: Option<String>,
    pub execution_time: Duration,
}

/// Closed set of task-type strategies (§4.6). Each implementation
/// declares, by construction, which input files it needs and which
/// `plus`-worthy diagnostics it produces; the worker is responsible for
/// materializing Digests to local paths before calling in and pushing
/// resulting files back through the File Cache afterward.
#[async_trait]
pub trait TaskType: Send + Sync {
    async fn compile(
        &self,
        sources: &HashMap<String, std::path::PathBuf>,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        workdir: &Path,
    ) -> Result<CompileOutcome, ExecutorError>;

    async fn evaluate(
        &self,
        executables: &HashMap<String, std::path::PathBuf>,
        input_path: &Path,
        expected_output: &Path,
        parameters: &serde_json::Value,
        sandbox: &dyn Sandbox,
        time_limit: Duration,
    ) -> Result<EvaluateOutcome, ExecutorError>;
}

/// Substitutes `{name}` placeholders in an argv template with concrete
/// paths. Shared by every task-type implementation that shells out to a
/// configured compiler or checker command.
pub(crate) fn render_args(template: &[String], vars: &HashMap<&str, &str>) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let mut rendered = arg.clone();
            for (key, value) in vars {
                rendered = rendered.replace(&format!("{{{key}}}"), value);
            }
            rendered
        })
        .collect()
}

/// Resolves a task-type name to its strategy implementation. The kind
/// space is closed; new kinds require a coordinated change here and in
/// the queue fabric (§4.2, §9).
pub fn dispatch(name: &str) -> Result<Box<dyn TaskType>, ExecutorError> {
    match name {
        "Batch" => Ok(Box::new(batch::BatchTaskType)),
        "Communication" => Ok(Box::new(communication::CommunicationTaskType)),
        "OutputOnly" => Ok(Box::new(output_only::OutputOnlyTaskType)),
        "TwoSteps" => Ok(Box::new(two_steps::TwoStepsTaskType)),
        "Custom" => Ok(Box::new(custom::CustomTaskType)),
        other => Err(ExecutorError::UnknownTaskType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_resolves_every_known_kind() {
        for kind in ["Batch", "Communication", "OutputOnly", "TwoSteps", "Custom"] {
            assert!(dispatch(kind).is_ok(), "{kind} should resolve");
        }
    }

    #[test]
    fn dispatch_rejects_unknown_kind() {
        assert!(matches!(
            dispatch("Fortran77Legacy"),
            Err(ExecutorError::UnknownTaskType(_))
        ));
    }

    #[test]
    fn render_args_substitutes_named_placeholders() {
        let template = vec!["-o".to_string(), "{output}".to_string(), "{input}".to_string()];
        let mut vars = HashMap::new();
        vars.insert("output", "/tmp/a.out");
        vars.insert("input", "/tmp/main.c");
        let rendered = render_args(&template, &vars);
        assert_eq!(rendered, vec!["-o", "/tmp/a.out", "/tmp/main.c"]);
    }
}
