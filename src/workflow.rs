//! Top-level driver: resolve config, ensure the environment and classifier,
//! run both tracks, and aggregate the run report.
//!
//! Pre-flight failures (config, bootstrap, artifact) abort before any track
//! starts. Per-stage failures abort only their track: the tracks are
//! independent, comparable analyses, so a primary-track failure never hides
//! the secondary track's results. Tracks run sequentially because they share
//! one thread budget.
use crate::artifact::{ensure_artifact, ExternalArtifact};
use crate::config::{self, RunConfig};
use crate::environment::{ensure_environment, EnvironmentHandle, ENVIRONMENT_NAME};
use crate::error::PipelineError;
use crate::layout::{OutputLayout, DADA2_TRACK, QIIME_TRACK};
use crate::manifest::load_manifest;
use crate::pipeline::{run_track, TrackResult};
use crate::process::ProcessRunner;
use crate::report::{write_report, EnvironmentInfo, RunReport};
use crate::stage::StageOutcome;
use crate::tracks::{dada2, qiime};
use crate::util::now_epoch_ms;
use std::path::{Path, PathBuf};

/// Pretrained classifier artifact published for the pinned toolkit release.
pub const CLASSIFIER_URL: &str =
    "https://data.qiime2.org/2024.10/common/gg-13-8-99-515-806-nb-classifier.qza";

/// Resolved invocation options, read-only for the whole run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub output: PathBuf,
    pub cache_dir: PathBuf,
    pub conda: String,
}

/// Execute the full pipeline and return the aggregated report.
///
/// An `Ok` report with `success == false` means one or both tracks failed;
/// the caller maps that to the track-failure exit code.
pub fn run(options: &RunOptions, runner: &dyn ProcessRunner) -> Result<RunReport, PipelineError> {
    let result = run_phases(options, runner);
    if result.is_err() {
        tracing::error!(phase = "aborted", "run aborted before tracks completed");
    }
    result
}

fn run_phases(
    options: &RunOptions,
    runner: &dyn ProcessRunner,
) -> Result<RunReport, PipelineError> {
    let started = now_epoch_ms()?;

    let config = config::resolve(&options.config)?;
    tracing::info!(phase = "config_resolved", config = %options.config.display());

    let (env, _existed) = ensure_environment(runner, &options.conda, &options.cache_dir)?;
    tracing::info!(phase = "environment_ready", name = %env.name);

    ensure_artifact(&ExternalArtifact::new(
        "classifier",
        CLASSIFIER_URL,
        config.classifier_qza.clone(),
        Some(config.classifier_sha256.clone()),
    ))?;
    tracing::info!(phase = "artifact_ready", classifier = %config.classifier_qza.display());

    let layout = OutputLayout::new(options.output.clone());
    layout.create()?;

    let qiime_result = run_qiime_track(runner, &env, &config, &layout)?;
    let dada2_result = run_dada2_track(runner, &env, &config, &layout)?;

    let finished = now_epoch_ms()?;
    let report = RunReport::new(
        started,
        finished,
        EnvironmentInfo {
            name: ENVIRONMENT_NAME.to_string(),
            versions: env.version_info.clone(),
        },
        vec![qiime_result, dada2_result],
    );
    write_report(&layout.report_path(), &report)?;
    tracing::info!(phase = "reported", success = report.success);

    for track in &report.tracks {
        match track.first_failing_stage() {
            None => println!("track {}: succeeded", track.track),
            Some(stage) => println!("track {}: failed at stage {stage}", track.track),
        }
    }
    println!("Wrote run report to {}", layout.report_path().display());
    Ok(report)
}

fn run_qiime_track(
    runner: &dyn ProcessRunner,
    env: &EnvironmentHandle,
    config: &RunConfig,
    layout: &OutputLayout,
) -> Result<TrackResult, PipelineError> {
    let stages = qiime::build_stages(config, layout);
    let result = run_track(runner, env, QIIME_TRACK, &stages, &layout.log_dir(QIIME_TRACK))?;
    Ok(result)
}

fn run_dada2_track(
    runner: &dyn ProcessRunner,
    env: &EnvironmentHandle,
    config: &RunConfig,
    layout: &OutputLayout,
) -> Result<TrackResult, PipelineError> {
    // Pairing is validated before any external denoising step can start.
    let manifest = match load_manifest(&config.manifest).and_then(|manifest| {
        manifest.paired_sample_ids()?;
        Ok(manifest)
    }) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::error!(track = DADA2_TRACK, error = %err, "manifest validation failed");
            return Ok(TrackResult::failed_before_stages(
                DADA2_TRACK,
                StageOutcome::invalid_input("validate-manifest", format!("{err:#}")),
            ));
        }
    };

    let driver = dada2::install_driver(layout)?;
    let stages = dada2::build_stages(config, &manifest, layout, &driver);
    let result = run_track(runner, env, DADA2_TRACK, &stages, &layout.log_dir(DADA2_TRACK))?;
    Ok(result)
}

/// Bootstrap-only mode: ensure the shared environment and exit. Idempotent;
/// reports immediately when the environment is already present.
pub fn bootstrap(
    conda: &str,
    cache_dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<(), PipelineError> {
    let (env, existed) = ensure_environment(runner, conda, cache_dir)?;
    if existed {
        println!("Environment {} already present.", env.name);
    } else {
        println!("Environment {} created.", env.name);
    }
    Ok(())
}
