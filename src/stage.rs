//! One external-tool invocation with declared inputs and outputs.
//!
//! The declarations turn two classic failure modes into immediate, precise
//! errors: a missing input is reported before the tool ever starts, and a
//! tool that exits zero without producing its outputs is still a failure.
use crate::environment::EnvironmentHandle;
use crate::error::FailureClass;
use crate::process::{ProcessOutput, ProcessRunner};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Condition under which a stage runs. `IfPresent` makes degraded-mode
/// branches (skip taxonomy when no reference set is configured) first-class
/// instead of incidental file checks.
#[derive(Debug, Clone)]
pub enum StageGate {
    Always,
    IfPresent(Vec<PathBuf>),
    Off(String),
}

/// Declarative description of a stage, constructed immediately before
/// execution from the resolved run config.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub id: String,
    pub program: String,
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub gate: StageGate,
    /// When set, the child's stdout is written here and counted as a
    /// declared output (used by the version-capture stages).
    pub stdout_to: Option<PathBuf>,
}

impl StageSpec {
    pub fn new(id: &str, program: &str, args: Vec<String>) -> Self {
        StageSpec {
            id: id.to_string(),
            program: program.to_string(),
            args,
            inputs: Vec::new(),
            outputs: Vec::new(),
            gate: StageGate::Always,
            stdout_to: None,
        }
    }

    pub fn input(mut self, path: &Path) -> Self {
        self.inputs.push(path.to_path_buf());
        self
    }

    pub fn output(mut self, path: &Path) -> Self {
        self.outputs.push(path.to_path_buf());
        self
    }

    pub fn gate(mut self, gate: StageGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout_to = Some(path.to_path_buf());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub class: FailureClass,
    pub message: String,
}

/// Recorded result of one stage, persisted in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == StageStatus::Failed
    }

    fn skipped(stage: &str, reason: String) -> Self {
        StageOutcome {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
            exit_code: None,
            duration_ms: 0,
            log: None,
            skip_reason: Some(reason),
            failure: None,
        }
    }

    fn failed_before_start(stage: &str, class: FailureClass, message: String) -> Self {
        StageOutcome {
            stage: stage.to_string(),
            status: StageStatus::Failed,
            exit_code: None,
            duration_ms: 0,
            log: None,
            skip_reason: None,
            failure: Some(StageFailure { class, message }),
        }
    }

    /// Synthetic outcome for a pre-stage validation failure, recorded in the
    /// track result as if it were the track's first stage.
    pub fn invalid_input(stage: &str, message: String) -> Self {
        StageOutcome::failed_before_start(stage, FailureClass::InvalidInput, message)
    }
}

/// Execute one stage inside the environment, capturing streams in full to a
/// log file named after the stage identifier. Logs are overwritten
/// deterministically within a given output root; operators choose a fresh
/// root per run to keep history.
pub fn run_stage(
    runner: &dyn ProcessRunner,
    env: &EnvironmentHandle,
    spec: &StageSpec,
    log_dir: &Path,
) -> Result<StageOutcome> {
    match &spec.gate {
        StageGate::Always => {}
        StageGate::Off(reason) => {
            tracing::info!(stage = %spec.id, %reason, "stage switched off");
            return Ok(StageOutcome::skipped(&spec.id, reason.clone()));
        }
        StageGate::IfPresent(paths) => {
            if let Some(missing) = paths.iter().find(|path| !path.exists()) {
                let reason = format!("optional input {} is absent", missing.display());
                tracing::info!(stage = %spec.id, %reason, "stage skipped");
                return Ok(StageOutcome::skipped(&spec.id, reason));
            }
        }
    }

    if let Some(missing) = spec.inputs.iter().find(|path| !path.exists()) {
        return Ok(StageOutcome::failed_before_start(
            &spec.id,
            FailureClass::MissingInput,
            format!("required input {} does not exist", missing.display()),
        ));
    }

    fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;
    let log_path = log_dir.join(format!("{}.log", spec.id));

    let request = env.command(&spec.program, spec.args.clone());
    tracing::info!(stage = %spec.id, command = %request.command_line(), "stage starting");
    let started = Instant::now();
    let result = runner.run(&request);
    let duration_ms = started.elapsed().as_millis();

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            fs::write(&log_path, format!("{err:#}\n"))
                .with_context(|| format!("write {}", log_path.display()))?;
            return Ok(finished(spec, None, duration_ms, &log_path, Some(StageFailure {
                class: FailureClass::ExternalTool,
                message: format!("failed to start external process: {err:#}"),
            })));
        }
    };

    write_logs(spec, &log_path, &output)?;

    if !output.success() {
        return Ok(finished(
            spec,
            output.exit_code,
            duration_ms,
            &log_path,
            Some(StageFailure {
                class: FailureClass::ExternalTool,
                message: format!(
                    "external process exited with {:?}; see {}",
                    output.exit_code,
                    log_path.display()
                ),
            }),
        ));
    }

    let mut declared = spec.outputs.clone();
    if let Some(capture) = &spec.stdout_to {
        declared.push(capture.clone());
    }
    if let Some(missing) = declared.iter().find(|path| !output_satisfied(path)) {
        return Ok(finished(
            spec,
            output.exit_code,
            duration_ms,
            &log_path,
            Some(StageFailure {
                class: FailureClass::IncompleteOutput,
                message: format!(
                    "process exited 0 but declared output {} is missing or empty",
                    missing.display()
                ),
            }),
        ));
    }

    tracing::info!(stage = %spec.id, duration_ms = duration_ms as u64, "stage passed");
    Ok(finished(spec, output.exit_code, duration_ms, &log_path, None))
}

fn finished(
    spec: &StageSpec,
    exit_code: Option<i32>,
    duration_ms: u128,
    log_path: &Path,
    failure: Option<StageFailure>,
) -> StageOutcome {
    let status = if failure.is_some() {
        StageStatus::Failed
    } else {
        StageStatus::Passed
    };
    StageOutcome {
        stage: spec.id.clone(),
        status,
        exit_code,
        duration_ms,
        log: Some(log_path.display().to_string()),
        skip_reason: None,
        failure,
    }
}

/// Stream capture policy: stderr always goes to the stage log; stdout joins
/// it unless the spec redirects stdout to a declared capture file.
fn write_logs(spec: &StageSpec, log_path: &Path, output: &ProcessOutput) -> Result<()> {
    let mut log = Vec::new();
    if let Some(capture) = &spec.stdout_to {
        if let Some(parent) = capture.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(capture, &output.stdout)
            .with_context(|| format!("write {}", capture.display()))?;
    } else {
        log.extend_from_slice(&output.stdout);
    }
    log.extend_from_slice(&output.stderr);
    fs::write(log_path, &log).with_context(|| format!("write {}", log_path.display()))?;
    Ok(())
}

fn output_satisfied(path: &Path) -> bool {
    if path.is_dir() {
        return fs::read_dir(path).map(|mut dir| dir.next().is_some()).unwrap_or(false);
    }
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}
