use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod artifact;
mod cli;
mod config;
mod environment;
mod error;
mod layout;
mod manifest;
mod pipeline;
mod process;
mod report;
mod stage;
mod templates;
mod tracks;
mod util;
mod workflow;

use cli::RootArgs;
use error::PipelineError;
use process::SystemRunner;
use workflow::RunOptions;

/// Exit code when one or both tracks failed but the run still reported.
const TRACK_FAILURE_EXIT: u8 = 5;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);
    process::install_signal_forwarding();

    let runner = SystemRunner;
    let cache_dir = args.resolved_cache_dir();

    if args.bootstrap_environment {
        return match workflow::bootstrap(&args.conda, &cache_dir, &runner) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => report_error(err),
        };
    }

    let options = RunOptions {
        config: args.config.expect("clap enforces --config for full runs"),
        output: args.output,
        cache_dir,
        conda: args.conda,
    };
    match workflow::run(&options, &runner) {
        Ok(report) if report.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(TRACK_FAILURE_EXIT),
        Err(err) => report_error(err),
    }
}

fn report_error(err: PipelineError) -> ExitCode {
    eprintln!("error: {err:#}");
    ExitCode::from(err.exit_code())
}

/// Honors `RUST_LOG` when set, otherwise `info` (`debug` under --verbose).
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
