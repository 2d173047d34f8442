//! runtests - discover and run registered test fixtures
//!
//! Reads a target list, loads each artifact manifest, runs the fixtures of
//! the suite it names and reports results on stdout. Collected test output
//! goes to the shared log file.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use runtests::commands::Args;
use runtests::common::logging;
use runtests::testing::{ConsoleReporter, ManifestLoader};
use runtests::{cli, samples};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        logging::init_verbose();
    } else {
        logging::init_cli();
    }

    let loader = ManifestLoader::new(samples::suites());
    match cli::run(args, &loader, Arc::new(ConsoleReporter::new())).await {
        Ok(tally) if tally.all_passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_load_error() {
                eprintln!("Check the artifact paths and `requires` entries of the target list");
            }
            ExitCode::from(2)
        }
    }
}
