//! Idempotent materialization of large external artifacts.
//!
//! An artifact already on disk is verified, never re-downloaded: a digest
//! mismatch surfaces as an integrity failure with the file left in place for
//! inspection. Downloads stage into a temp file in the destination directory
//! and move into place atomically only after the digest checks out, so a
//! failed transfer leaves nothing behind.
use crate::error::PipelineError;
use crate::util::sha256_file;
use anyhow::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A large downloadable dependency, cached across runs and never deleted by
/// this system.
#[derive(Debug, Clone)]
pub struct ExternalArtifact {
    pub name: String,
    pub url: String,
    pub dest: PathBuf,
    pub sha256: Option<String>,
}

impl ExternalArtifact {
    pub fn new(name: &str, url: &str, dest: PathBuf, sha256: Option<String>) -> Self {
        ExternalArtifact {
            name: name.to_string(),
            url: url.to_string(),
            dest,
            sha256,
        }
    }
}

/// Ensure the artifact is present and digest-verified, returning its path.
///
/// No network access happens when the destination already exists. There is no
/// retry: transport failures surface immediately and callers decide policy.
pub fn ensure_artifact(artifact: &ExternalArtifact) -> Result<PathBuf, PipelineError> {
    if artifact.dest.exists() {
        if let Some(expected) = &artifact.sha256 {
            let actual = sha256_file(&artifact.dest)
                .with_context(|| format!("hash existing artifact {}", artifact.name))?;
            if &actual != expected {
                return Err(PipelineError::Integrity {
                    name: artifact.name.clone(),
                    path: artifact.dest.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        tracing::debug!(name = %artifact.name, "artifact already present");
        return Ok(artifact.dest.clone());
    }

    download(artifact)?;
    Ok(artifact.dest.clone())
}

fn download(artifact: &ExternalArtifact) -> Result<(), PipelineError> {
    let parent = artifact
        .dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)
        .with_context(|| format!("create artifact directory {}", parent.display()))?;

    // Staged in the destination directory so the final rename stays on one
    // filesystem; the temp file is discarded on any failure.
    let mut staged = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("create staging file in {}", parent.display()))?;

    tracing::info!(name = %artifact.name, url = %artifact.url, "downloading artifact");
    let mut response = ureq::get(artifact.url.as_str())
        .call()
        .map_err(|err| download_error(artifact, format!("request failed: {err}")))?;
    let mut reader = response.body_mut().as_reader();
    io::copy(&mut reader, &mut staged)
        .map_err(|err| download_error(artifact, format!("transfer failed: {err}")))?;

    if let Some(expected) = &artifact.sha256 {
        let actual = sha256_file(staged.path())
            .with_context(|| format!("hash downloaded artifact {}", artifact.name))?;
        if &actual != expected {
            return Err(PipelineError::Download {
                name: artifact.name.clone(),
                url: artifact.url.clone(),
                reason: format!(
                    "downloaded content digest {actual} does not match expected {expected}"
                ),
            });
        }
    }

    staged
        .persist(&artifact.dest)
        .with_context(|| format!("move artifact into place at {}", artifact.dest.display()))?;
    tracing::info!(name = %artifact.name, dest = %artifact.dest.display(), "artifact ready");
    Ok(())
}

fn download_error(artifact: &ExternalArtifact, reason: String) -> PipelineError {
    PipelineError::Download {
        name: artifact.name.clone(),
        url: artifact.url.clone(),
        reason,
    }
}
