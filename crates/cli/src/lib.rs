//! # Overview
//!
//! `cli` is the user-facing shell around the WAA core: argument parsing,
//! the action registry, logging setup, and the work functions that wire a
//! [`waa::Session`], the [`engine`] passes, and an [`actions::Action`]
//! together into one invocation.
//!
//! The library exposes a single entry point, [`run`], which the `fsvc`
//! binary calls and turns into its exit code.

mod error;
mod frontend;
mod output;
pub mod registry;
mod work;

use std::error::Error;

use tracing_subscriber::EnvFilter;

pub use error::CliError;
pub use frontend::{build_command, parse, Invocation};

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "FSVC_LOG";

/// Parses the command line, runs the requested action, and returns the
/// process exit code.
#[must_use]
pub fn run() -> i32 {
    let invocation = match parse() {
        Ok(invocation) => invocation,
        Err(err) => {
            // clap renders its own message, including for --help.
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
        }
    };

    init_logging(invocation.verbosity);

    match run_action(&invocation) {
        Ok(()) => 0,
        Err(err) => {
            report(&err);
            1
        }
    }
}

fn init_logging(verbosity: i32) {
    let default = match verbosity {
        i32::MIN..=-1 => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_action(invocation: &Invocation) -> Result<(), CliError> {
    let spec = registry::find(invocation.action).unwrap_or(registry::ACTIONS[0]);

    if spec.matches("help") {
        return work::work_help();
    }

    let mut session =
        waa::Session::from_env(spec.is_import_export, invocation.options.clone())?;

    match spec.name() {
        "status" => work::work_status(&mut session, &invocation.paths),
        "add" | "unversion" => work::work_add_unversion(&mut session, spec, &invocation.paths),
        "_build-new-list" => work::work_build(&mut session, &invocation.paths),
        "info" => work::work_info(&mut session, &invocation.paths),
        _ => work::work_status(&mut session, &invocation.paths),
    }
}

fn report(err: &CliError) {
    eprintln!("fsvc: {err}");
    let mut source = err.source();
    while let Some(inner) = source {
        eprintln!("fsvc:   caused by: {inner}");
        source = inner.source();
    }
}
