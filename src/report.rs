//! Final run report written for reproducibility.
use crate::pipeline::TrackResult;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Top-level aggregate of both track results plus timing and environment
/// version metadata.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub started_epoch_ms: u128,
    pub finished_epoch_ms: u128,
    pub duration_ms: u128,
    pub environment: EnvironmentInfo,
    pub tracks: Vec<TrackResult>,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentInfo {
    pub name: String,
    /// Output of the toolkit's version introspection, when captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<String>,
}

impl RunReport {
    pub fn new(
        started_epoch_ms: u128,
        finished_epoch_ms: u128,
        environment: EnvironmentInfo,
        tracks: Vec<TrackResult>,
    ) -> Self {
        let success = tracks.iter().all(|track| track.success);
        RunReport {
            schema_version: REPORT_SCHEMA_VERSION,
            started_epoch_ms,
            finished_epoch_ms,
            duration_ms: finished_epoch_ms.saturating_sub(started_epoch_ms),
            environment,
            tracks,
            success,
        }
    }
}

/// Persist the report as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
