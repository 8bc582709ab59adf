//! Single seam for spawning external processes.
//!
//! Every stage invocation, environment-manager call, and version capture goes
//! through [`ProcessRunner`], so tests can substitute a scripted runner and
//! assert which external commands were (or were not) started.
use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};

/// One external invocation: program and ordered args, run with the inherited
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        ProcessRequest {
            program: program.into(),
            args,
        }
    }

    /// Render as a single line for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        shell_words::join(parts.iter().map(String::as_str))
    }
}

/// Captured result of a finished external process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Blocking, synchronous process execution seam.
pub trait ProcessRunner {
    fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput>;
}

/// Production runner backed by `std::process::Command`.
///
/// The spawned child's pid is published so operator signals (SIGINT/SIGTERM/
/// SIGHUP) forward to the running external tool instead of orphaning it.
pub struct SystemRunner;

static ACTIVE_CHILD: AtomicI32 = AtomicI32::new(0);

impl ProcessRunner for SystemRunner {
    fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command
            .spawn()
            .with_context(|| format!("spawn {}", request.command_line()))?;
        ACTIVE_CHILD.store(child.id() as i32, Ordering::SeqCst);

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {}", request.program));
        ACTIVE_CHILD.store(0, Ordering::SeqCst);
        let output = output?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(unix)]
extern "C" fn forward_signal(signal: libc::c_int) {
    let pid = ACTIVE_CHILD.load(Ordering::SeqCst);
    if pid > 0 {
        unsafe {
            libc::kill(pid, signal);
        }
    }
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
}

/// Forward operator cancellation to the active child before terminating.
#[cfg(unix)]
pub fn install_signal_forwarding() {
    let handler = forward_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        libc::signal(libc::SIGHUP, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install_signal_forwarding() {}
