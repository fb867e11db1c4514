//! # robotdev CLI
//!
//! This is the binary entry point for the `robotdev` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Reporting whatever error reaches the top as a single banner and
//!   exiting with status 1. Usage errors are reported by `clap` with
//!   status 2.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use robotdev::output::ErrorReport;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let output = cli.output_config();

    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", error_report(&err).render(&output));
            ExitCode::FAILURE
        }
    }
}

fn error_report(err: &anyhow::Error) -> ErrorReport {
    let kind = err
        .downcast_ref::<robotdev::error::Error>()
        .map(robotdev::error::Error::kind)
        .unwrap_or("Error");
    let mut report = ErrorReport::new(kind, err.to_string());
    report.causes = err.chain().skip(1).map(ToString::to_string).collect();
    report
}
