//! Failure taxonomy for the orchestrator.
//!
//! Two layers: `PipelineError` covers run-fatal pre-flight problems that abort
//! before either track starts, while `FailureClass` labels per-stage failures
//! that abort only the containing track and are recorded in its result.
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Run-fatal errors. Each maps to a distinct process exit code so automation
/// can tell failure classes apart without parsing messages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("environment bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("download failed for {name} from {url}: {reason}")]
    Download {
        name: String,
        url: String,
        reason: String,
    },

    #[error(
        "integrity mismatch for {name} at {path}: expected sha256 {expected}, found {actual}; \
         the file was left in place for inspection"
    )]
    Integrity {
        name: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Process exit code for this error. Code 5 (track failure) is not
    /// represented here because a failed track still produces a report.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Bootstrap(_) => 3,
            PipelineError::Download { .. } | PipelineError::Integrity { .. } => 4,
            PipelineError::Internal(_) => 1,
        }
    }
}

/// Classification of a stage failure, persisted in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// A declared required input was absent before the external process started.
    MissingInput,
    /// The external process exited zero but a declared output is absent or empty.
    IncompleteOutput,
    /// The external process exited non-zero or could not be spawned.
    ExternalTool,
    /// Stage input content failed validation (e.g. unpaired manifest rows).
    InvalidInput,
}
