//! CLI argument definitions
//!
//! Defines the clap arguments for the test runner CLI.

use clap::Parser;
use std::path::PathBuf;

/// Usage line printed when no target list is given
pub const USAGE: &str = "Usage: runtests targets.json [filter1] [filter2] (filters are ANDed together - to OR, use a pipe in a regex)";

#[derive(Parser, Debug)]
#[command(name = "runtests", about = "Discover and run registered test fixtures")]
#[command(version, long_about = None)]
pub struct Args {
    /// Target list (JSON or YAML) naming the artifact manifests to run
    pub targets: Option<PathBuf>,

    /// Case-insensitive regexes matched against "{Type}.{Method}"; all must match
    pub filters: Vec<String>,

    /// File receiving collected test output (default: testoutput.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(long, short)]
    pub verbose: bool,
}
