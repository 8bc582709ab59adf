//! Bootstrap-only mode against a shim environment manager on PATH.
#![cfg(unix)]

mod common;

use common::ampliflow_bin;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

/// Install a fake `conda` that reports the managed environment as present.
fn install_conda_shim(dir: &Path) {
    let shim = dir.join("conda");
    fs::write(
        &shim,
        "#!/bin/sh\n\
         if [ \"$1\" = \"env\" ] && [ \"$2\" = \"list\" ]; then\n\
           echo '{\"envs\": [\"/opt/conda/envs/ampliflow-qiime2\"]}'\n\
           exit 0\n\
         fi\n\
         echo \"unexpected invocation: $*\" >&2\n\
         exit 1\n",
    )
    .expect("write conda shim");
    fs::set_permissions(&shim, fs::Permissions::from_mode(0o755)).expect("chmod shim");
}

#[test]
fn bootstrap_exits_zero_when_environment_already_present() {
    let dir = tempfile::tempdir().expect("create temp dir");
    install_conda_shim(dir.path());

    let path_var = format!(
        "{}:{}",
        dir.path().display(),
        std::env::var("PATH").unwrap_or_default()
    );
    let output = Command::new(ampliflow_bin())
        .arg("--bootstrap-environment")
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .env("PATH", path_var)
        .output()
        .expect("run ampliflow");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("already present"));
}

#[test]
fn bootstrap_fails_with_bootstrap_code_when_listing_breaks() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let shim = dir.path().join("conda");
    fs::write(&shim, "#!/bin/sh\nexit 7\n").expect("write conda shim");
    fs::set_permissions(&shim, fs::Permissions::from_mode(0o755)).expect("chmod shim");

    let path_var = format!(
        "{}:{}",
        dir.path().display(),
        std::env::var("PATH").unwrap_or_default()
    );
    let output = Command::new(ampliflow_bin())
        .arg("--bootstrap-environment")
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .env("PATH", path_var)
        .output()
        .expect("run ampliflow");

    assert_eq!(output.status.code(), Some(3));
}
