//! Ordered execution of one track's stages.
//!
//! Stages encode a strict dependency chain, so the first failure stops the
//! track: continuing would operate on stale or missing artifacts. Skipped
//! stages are degraded-mode branches, not failures, and do not stop the run.
use crate::environment::EnvironmentHandle;
use crate::process::ProcessRunner;
use crate::stage::{run_stage, StageOutcome, StageSpec};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Aggregate outcome of one track, persisted in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    pub track: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<usize>,
    pub outcomes: Vec<StageOutcome>,
}

impl TrackResult {
    /// Result for a track that failed validation before its first stage; the
    /// synthetic outcome is recorded at index zero.
    pub fn failed_before_stages(track: &str, outcome: StageOutcome) -> Self {
        TrackResult {
            track: track.to_string(),
            success: false,
            first_failure: Some(0),
            outcomes: vec![outcome],
        }
    }

    /// Identifier of the first failing stage, if any.
    pub fn first_failing_stage(&self) -> Option<&str> {
        let index = self.first_failure?;
        self.outcomes.get(index).map(|outcome| outcome.stage.as_str())
    }
}

/// Run `stages` in declared order, stopping at the first failure.
pub fn run_track(
    runner: &dyn ProcessRunner,
    env: &EnvironmentHandle,
    track: &str,
    stages: &[StageSpec],
    log_dir: &Path,
) -> Result<TrackResult> {
    tracing::info!(track, stages = stages.len(), "track starting");
    let mut outcomes = Vec::with_capacity(stages.len());
    let mut first_failure = None;

    for (index, spec) in stages.iter().enumerate() {
        let outcome = run_stage(runner, env, spec, log_dir)?;
        let failed = outcome.failed();
        if failed {
            tracing::error!(
                track,
                stage = %spec.id,
                message = outcome
                    .failure
                    .as_ref()
                    .map(|failure| failure.message.as_str())
                    .unwrap_or("unknown"),
                "stage failed; aborting track"
            );
        }
        outcomes.push(outcome);
        if failed {
            first_failure = Some(index);
            break;
        }
    }

    let success = first_failure.is_none();
    tracing::info!(track, success, "track finished");
    Ok(TrackResult {
        track: track.to_string(),
        success,
        first_failure,
        outcomes,
    })
}
