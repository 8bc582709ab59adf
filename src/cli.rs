//! CLI argument parsing for the pipeline orchestrator.
//!
//! The CLI is intentionally thin: it resolves paths and defaults, then hands
//! one immutable options value to the workflow.
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "ampliflow",
    version,
    about = "Dual-track amplicon pipeline orchestrator",
    after_help = "Exit codes:\n  0  success\n  1  internal error\n  2  configuration error\n  3  environment bootstrap error\n  4  artifact download/integrity error\n  5  one or both tracks failed\n\nExamples:\n  ampliflow --config run/config.json\n  ampliflow --config run/config.json --output results --verbose\n  ampliflow --bootstrap-environment",
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Run the full pipeline with this parameter file
    #[arg(long, value_name = "PATH", required_unless_present = "bootstrap_environment")]
    pub config: Option<PathBuf>,

    /// Only ensure the shared runtime environment exists, then exit
    #[arg(long)]
    pub bootstrap_environment: bool,

    /// Output directory, partitioned per track
    #[arg(long, value_name = "DIR", default_value = "ampliflow_out")]
    pub output: PathBuf,

    /// Cache directory for downloaded environment definitions and version info
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Environment manager command (split shell-style, e.g. "micromamba --no-rc")
    #[arg(long, value_name = "CMD", default_value = "conda")]
    pub conda: String,

    /// Emit debug-level logging
    #[arg(long)]
    pub verbose: bool,
}

impl RootArgs {
    /// Cache directory, defaulting to the platform cache root.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ampliflow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_run_requires_config() {
        assert!(RootArgs::try_parse_from(["ampliflow", "--output", "out"]).is_err());
        assert!(RootArgs::try_parse_from(["ampliflow", "--config", "c.json"]).is_ok());
    }

    #[test]
    fn bootstrap_mode_needs_no_config() {
        let args = RootArgs::try_parse_from(["ampliflow", "--bootstrap-environment"])
            .expect("parse bootstrap args");
        assert!(args.bootstrap_environment);
        assert!(args.config.is_none());
    }

    #[test]
    fn explicit_cache_dir_wins_over_default() {
        let args = RootArgs::try_parse_from([
            "ampliflow",
            "--bootstrap-environment",
            "--cache-dir",
            "/tmp/cache",
        ])
        .expect("parse args");
        assert_eq!(args.resolved_cache_dir(), PathBuf::from("/tmp/cache"));
    }
}
