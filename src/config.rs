//! Run configuration: load, validate, and resolve once at startup.
//!
//! Every downstream stage assumes a well-formed [`RunConfig`] and never
//! re-validates primitive fields. Validation performs read-only filesystem
//! checks only, so resolving the same file twice yields the same config.
use crate::error::PipelineError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Pinned digest of the default pretrained classifier artifact. A config may
/// override it with `classifier_sha256` when pointing at a different build.
pub const DEFAULT_CLASSIFIER_SHA256: &str =
    "7d2ff1c6b8e6eae3bd8efcc5d5dbbd7a1f1d4d9053c5e078cd9bfd0fe6ec6a2b";

/// Bases accepted in primer sequences (IUPAC nucleotide codes).
const IUPAC_BASES: &str = "ACGTURYSWKMBDHVN";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    manifest: String,
    metadata: String,
    primer_f: String,
    primer_r: String,
    trim_left_f: u32,
    trim_left_r: u32,
    trunc_len_f: u32,
    trunc_len_r: u32,
    sampling_depth: u32,
    threads: u32,
    classifier_qza: String,
    classifier_sha256: Option<String>,
    dada2: RawDada2,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDada2 {
    max_ee_f: f64,
    max_ee_r: f64,
    trunc_q: u32,
    min_len: u32,
    pool: PoolMode,
    tax_train_set: Option<String>,
    tax_species: Option<String>,
}

/// DADA2 sample-pooling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Pseudo,
    True,
    Independent,
}

impl PoolMode {
    /// Value the R driver passes to `dada(..., pool = )`.
    pub fn as_driver_arg(&self) -> &'static str {
        match self {
            PoolMode::Pseudo => "pseudo",
            PoolMode::True => "TRUE",
            PoolMode::Independent => "FALSE",
        }
    }
}

/// Immutable, validated parameter set for one run. Constructed once by
/// [`resolve`], read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub manifest: PathBuf,
    pub metadata: PathBuf,
    pub primer_f: String,
    pub primer_r: String,
    pub trim_left_f: u32,
    pub trim_left_r: u32,
    pub trunc_len_f: u32,
    pub trunc_len_r: u32,
    pub sampling_depth: u32,
    pub threads: u32,
    pub classifier_qza: PathBuf,
    pub classifier_sha256: String,
    pub dada2: Dada2Config,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dada2Config {
    pub max_ee_f: f64,
    pub max_ee_r: f64,
    pub trunc_q: u32,
    pub min_len: u32,
    pub pool: PoolMode,
    pub tax_train_set: Option<PathBuf>,
    pub tax_species: Option<PathBuf>,
}

/// Load and validate the config document at `path`.
///
/// Fails with a configuration error on a missing file, malformed JSON,
/// unknown or missing keys, nonexistent manifest/metadata, out-of-range
/// numerics, or non-IUPAC primer sequences. Relative paths resolve against
/// the config file's directory.
pub fn resolve(path: &Path) -> Result<RunConfig, PipelineError> {
    let bytes = fs::read(path).map_err(|err| {
        PipelineError::Config(format!("read config {}: {err}", path.display()))
    })?;
    let raw: RawConfig = serde_json::from_slice(&bytes).map_err(|err| {
        PipelineError::Config(format!("parse config {}: {err}", path.display()))
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let manifest = resolve_path(base, &raw.manifest);
    let metadata = resolve_path(base, &raw.metadata);
    require_file(&manifest, "manifest")?;
    require_file(&metadata, "metadata")?;

    validate_primer(&raw.primer_f, "primer_f")?;
    validate_primer(&raw.primer_r, "primer_r")?;
    require_min(raw.sampling_depth, 1, "sampling_depth")?;
    require_min(raw.threads, 1, "threads")?;
    require_min(raw.dada2.min_len, 1, "dada2.min_len")?;
    validate_max_ee(raw.dada2.max_ee_f, "dada2.max_ee_f")?;
    validate_max_ee(raw.dada2.max_ee_r, "dada2.max_ee_r")?;

    let classifier_sha256 = match raw.classifier_sha256 {
        Some(digest) => validate_digest(&digest)?,
        None => DEFAULT_CLASSIFIER_SHA256.to_string(),
    };

    let tax_train_set = resolve_optional(base, raw.dada2.tax_train_set, "dada2.tax_train_set");
    let tax_species = resolve_optional(base, raw.dada2.tax_species, "dada2.tax_species");

    Ok(RunConfig {
        manifest,
        metadata,
        primer_f: raw.primer_f.to_ascii_uppercase(),
        primer_r: raw.primer_r.to_ascii_uppercase(),
        trim_left_f: raw.trim_left_f,
        trim_left_r: raw.trim_left_r,
        trunc_len_f: raw.trunc_len_f,
        trunc_len_r: raw.trunc_len_r,
        sampling_depth: raw.sampling_depth,
        threads: raw.threads,
        classifier_qza: resolve_path(base, &raw.classifier_qza),
        classifier_sha256,
        dada2: Dada2Config {
            max_ee_f: raw.dada2.max_ee_f,
            max_ee_r: raw.dada2.max_ee_r,
            trunc_q: raw.dada2.trunc_q,
            min_len: raw.dada2.min_len,
            pool: raw.dada2.pool,
            tax_train_set,
            tax_species,
        },
    })
}

fn resolve_path(base: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Optional reference paths degrade a later stage instead of failing the run;
/// a configured-but-missing path only earns a warning here.
fn resolve_optional(base: &Path, value: Option<String>, key: &str) -> Option<PathBuf> {
    let path = resolve_path(base, &value?);
    if !path.is_file() {
        tracing::warn!(
            key,
            path = %path.display(),
            "configured reference file is missing; dependent stages will be skipped"
        );
    }
    Some(path)
}

fn require_file(path: &Path, key: &str) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{key} file does not exist: {}",
            path.display()
        )))
    }
}

fn require_min(value: u32, min: u32, key: &str) -> Result<(), PipelineError> {
    if value >= min {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{key} must be >= {min} (got {value})"
        )))
    }
}

fn validate_max_ee(value: f64, key: &str) -> Result<(), PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{key} must be a positive number (got {value})"
        )))
    }
}

fn validate_primer(primer: &str, key: &str) -> Result<(), PipelineError> {
    if primer.is_empty() {
        return Err(PipelineError::Config(format!("{key} must be non-empty")));
    }
    for base in primer.chars() {
        if !IUPAC_BASES.contains(base.to_ascii_uppercase()) {
            return Err(PipelineError::Config(format!(
                "{key} contains non-IUPAC base {base:?}"
            )));
        }
    }
    Ok(())
}

fn validate_digest(digest: &str) -> Result<String, PipelineError> {
    let normalized = digest.to_ascii_lowercase();
    let valid = normalized.len() == 64 && normalized.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(normalized)
    } else {
        Err(PipelineError::Config(format!(
            "classifier_sha256 must be 64 hex characters (got {digest:?})"
        )))
    }
}
