//! Shared runtime environment: idempotent creation and command wrapping.
//!
//! Both tracks execute their tools inside one conda environment. Creation is
//! expensive and non-deterministic to retry blindly, so a failed create is
//! fatal and an existing environment is reused without any network access.
use crate::artifact::{ensure_artifact, ExternalArtifact};
use crate::error::PipelineError;
use crate::process::{ProcessRequest, ProcessRunner};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Logical name of the managed environment.
pub const ENVIRONMENT_NAME: &str = "ampliflow-qiime2";

/// Environment definition published by the toolkit distribution; carries no
/// digest because the distribution updates it in place.
pub const ENVIRONMENT_DEFINITION_URL: &str =
    "https://data.qiime2.org/distro/amplicon/qiime2-amplicon-2024.10-py310-linux-conda.yml";

const DEFINITION_FILE: &str = "qiime2-amplicon-conda.yml";
const VERSIONS_FILE: &str = "environment_versions.txt";

/// Handle to the ready environment. Read-only after creation: no stage
/// mutates the installed package set.
#[derive(Debug, Clone)]
pub struct EnvironmentHandle {
    pub name: String,
    manager: Vec<String>,
    pub version_info: Option<String>,
}

impl EnvironmentHandle {
    /// Wrap `program args…` so it executes inside this environment.
    pub fn command(&self, program: &str, args: Vec<String>) -> ProcessRequest {
        let mut full = self.manager[1..].to_vec();
        full.extend([
            "run".to_string(),
            "-n".to_string(),
            self.name.clone(),
            "--no-capture-output".to_string(),
            program.to_string(),
        ]);
        full.extend(args);
        ProcessRequest::new(self.manager[0].clone(), full)
    }

    #[cfg(test)]
    pub fn for_tests(name: &str, manager: &str) -> Self {
        EnvironmentHandle {
            name: name.to_string(),
            manager: vec![manager.to_string()],
            version_info: None,
        }
    }

    /// Manager-level invocation (list, create) outside any environment.
    fn manager_command(&self, args: Vec<String>) -> ProcessRequest {
        let mut full = self.manager[1..].to_vec();
        full.extend(args);
        ProcessRequest::new(self.manager[0].clone(), full)
    }
}

#[derive(Debug, Deserialize)]
struct EnvListing {
    envs: Vec<PathBuf>,
}

/// Ensure the shared environment exists, returning a handle to it.
///
/// Idempotent: when the environment manager already lists the name, no
/// definition download and no create happen. Returns `true` in the second
/// tuple slot when the environment was already present.
pub fn ensure_environment(
    runner: &dyn ProcessRunner,
    manager_command: &str,
    cache_dir: &Path,
) -> Result<(EnvironmentHandle, bool), PipelineError> {
    let manager = resolve_manager(manager_command)?;
    let mut handle = EnvironmentHandle {
        name: ENVIRONMENT_NAME.to_string(),
        manager,
        version_info: None,
    };

    let listing = runner
        .run(&handle.manager_command(vec![
            "env".to_string(),
            "list".to_string(),
            "--json".to_string(),
        ]))
        .context("list environments")?;
    if !listing.success() {
        return Err(PipelineError::Bootstrap(format!(
            "environment listing exited with {:?}: {}",
            listing.exit_code,
            String::from_utf8_lossy(&listing.stderr).trim()
        )));
    }
    let parsed: EnvListing = serde_json::from_slice(&listing.stdout)
        .context("parse environment listing JSON")?;
    let exists = parsed
        .envs
        .iter()
        .any(|path| path.file_name().is_some_and(|name| name == ENVIRONMENT_NAME));

    let versions_path = cache_dir.join(VERSIONS_FILE);
    if exists {
        tracing::info!(name = ENVIRONMENT_NAME, "environment already present");
        handle.version_info = fs::read_to_string(&versions_path).ok();
        return Ok((handle, true));
    }

    let definition = ensure_artifact(&ExternalArtifact::new(
        "environment-definition",
        ENVIRONMENT_DEFINITION_URL,
        cache_dir.join(DEFINITION_FILE),
        None,
    ))?;

    tracing::info!(name = ENVIRONMENT_NAME, "creating environment");
    let created = runner
        .run(&handle.manager_command(vec![
            "env".to_string(),
            "create".to_string(),
            "-n".to_string(),
            ENVIRONMENT_NAME.to_string(),
            "--file".to_string(),
            definition.display().to_string(),
        ]))
        .context("create environment")?;
    if !created.success() {
        return Err(PipelineError::Bootstrap(format!(
            "environment creation exited with {:?}: {}",
            created.exit_code,
            String::from_utf8_lossy(&created.stderr).trim()
        )));
    }

    // Version introspection output is persisted for the final report.
    let info = runner
        .run(&handle.command("qiime", vec!["info".to_string()]))
        .context("capture environment version info")?;
    if info.success() {
        let text = String::from_utf8_lossy(&info.stdout).to_string();
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("create cache dir {}", cache_dir.display()))?;
        fs::write(&versions_path, &text)
            .with_context(|| format!("write {}", versions_path.display()))?;
        handle.version_info = Some(text);
    } else {
        tracing::warn!(
            exit_code = ?info.exit_code,
            "version introspection failed; report will omit environment versions"
        );
    }

    Ok((handle, false))
}

fn resolve_manager(manager_command: &str) -> Result<Vec<String>, PipelineError> {
    let parts = shell_words::split(manager_command).map_err(|err| {
        PipelineError::Bootstrap(format!("parse manager command {manager_command:?}: {err}"))
    })?;
    let Some(program) = parts.first() else {
        return Err(PipelineError::Bootstrap(
            "environment manager command is empty".to_string(),
        ));
    };
    let resolved = which::which(program).map_err(|err| {
        PipelineError::Bootstrap(format!(
            "environment manager {program:?} not found on PATH: {err}"
        ))
    })?;

    let mut manager = vec![resolved.display().to_string()];
    manager.extend(parts.into_iter().skip(1));
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{exit_with, stdout_output, ScriptedRunner};

    fn handle() -> EnvironmentHandle {
        EnvironmentHandle {
            name: ENVIRONMENT_NAME.to_string(),
            manager: vec!["/opt/conda/bin/conda".to_string()],
            version_info: None,
        }
    }

    #[test]
    fn command_wraps_program_in_environment_run() {
        let request = handle().command("qiime", vec!["info".to_string()]);
        assert_eq!(request.program, "/opt/conda/bin/conda");
        assert_eq!(
            request.args,
            vec!["run", "-n", ENVIRONMENT_NAME, "--no-capture-output", "qiime", "info"]
        );
    }

    #[test]
    fn command_preserves_extra_manager_args() {
        let mut handle = handle();
        handle.manager = vec!["/usr/bin/micromamba".to_string(), "--no-rc".to_string()];
        let request = handle.command("Rscript", vec!["driver.R".to_string()]);
        assert_eq!(request.args[0], "--no-rc");
        assert_eq!(request.args[1], "run");
    }

    fn listing_with(envs: &[&str]) -> String {
        serde_json::json!({ "envs": envs }).to_string()
    }

    #[cfg(unix)]
    #[test]
    fn existing_environment_skips_creation() {
        // `sh` stands in for the manager binary; the scripted runner answers
        // before anything would actually execute.
        let dir = tempfile::tempdir().expect("create temp dir");
        let listing = listing_with(&["/opt/conda/envs/base", "/opt/conda/envs/ampliflow-qiime2"]);
        let runner = ScriptedRunner::new(move |request| {
            assert!(request.args.contains(&"list".to_string()));
            Ok(stdout_output(&listing))
        });

        let (handle, existed) =
            ensure_environment(&runner, "sh", dir.path()).expect("ensure environment");
        assert!(existed);
        assert_eq!(handle.name, ENVIRONMENT_NAME);
        assert_eq!(runner.invocation_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn failed_creation_is_a_bootstrap_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        // Definition already cached so no download is attempted.
        std::fs::write(dir.path().join(DEFINITION_FILE), "channels: []\n")
            .expect("write definition");
        let listing = listing_with(&["/opt/conda/envs/base"]);
        let runner = ScriptedRunner::new(move |request| {
            if request.args.contains(&"list".to_string()) {
                Ok(stdout_output(&listing))
            } else {
                Ok(exit_with(1))
            }
        });

        let err = ensure_environment(&runner, "sh", dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Bootstrap(_)));
    }

    #[cfg(unix)]
    #[test]
    fn creation_persists_version_info() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join(DEFINITION_FILE), "channels: []\n")
            .expect("write definition");
        let listing = listing_with(&[]);
        let runner = ScriptedRunner::new(move |request| {
            if request.args.contains(&"list".to_string()) {
                Ok(stdout_output(&listing))
            } else if request.args.contains(&"info".to_string()) {
                Ok(stdout_output("QIIME 2 release: 2024.10\n"))
            } else {
                Ok(exit_with(0))
            }
        });

        let (handle, existed) =
            ensure_environment(&runner, "sh", dir.path()).expect("ensure environment");
        assert!(!existed);
        assert_eq!(
            handle.version_info.as_deref(),
            Some("QIIME 2 release: 2024.10\n")
        );
        let persisted = std::fs::read_to_string(dir.path().join(VERSIONS_FILE))
            .expect("read persisted versions");
        assert!(persisted.contains("2024.10"));
    }

    #[test]
    fn missing_manager_binary_is_a_bootstrap_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let runner = ScriptedRunner::always_ok();
        let err =
            ensure_environment(&runner, "ampliflow-no-such-manager", dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Bootstrap(_)));
        assert_eq!(runner.invocation_count(), 0);
    }
}
