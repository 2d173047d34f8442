//! CLI command handling
//!
//! Loads configuration and the target list, opens the shared log and hands
//! everything to the [`Runner`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::commands::{Args, USAGE};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{load_targets, ArtifactLoader, NameFilter, Reporter, RunOptions, Runner, Tally};

/// Run the harness for parsed command-line arguments
pub async fn run(args: Args, loader: &dyn ArtifactLoader, reporter: Arc<dyn Reporter>) -> Result<Tally> {
    let Some(targets_path) = args.targets else {
        println!("{}", USAGE);
        return Err(Error::Config("no target list given".to_string()));
    };

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let filter = NameFilter::new(&args.filters)?;
    let targets = load_targets(&targets_path)?;
    tracing::debug!(targets = targets.len(), path = %targets_path.display(), "loaded target list");

    let log_path: PathBuf = args.log_file.unwrap_or_else(|| config.output.log_file.clone());
    let mut log = tokio::fs::File::create(&log_path)
        .await
        .map_err(|e| Error::Config(format!("Failed to create log file '{}': {}", log_path.display(), e)))?;

    let runner = Runner::new(RunOptions::from_config(&config, filter), reporter);
    runner.run(&targets, loader, &mut log).await
}
