//! runtests - a standalone test-execution harness
//!
//! Discovers test methods on registered fixture types, builds each fixture
//! through a lazy dependency resolver, runs every invocation (expanding
//! data-driven tests into one invocation per data row) and collects
//! per-test output into a shared log.

pub mod cli;
pub mod commands;
pub mod common;
pub mod samples;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{Runner, Tally};
