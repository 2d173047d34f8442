//! Console status stream
//!
//! The engine reports progress through a [`Reporter`]. [`ConsoleReporter`]
//! renders it on stdout: a white header per fixture type, one progress line
//! per invocation rewritten in place with the result, and a colored summary.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use colored::Colorize;

use super::runner::Tally;

/// Receives engine progress events
pub trait Reporter: Send + Sync {
    /// Name filters in effect, reported once before the run
    fn on_filters(&self, _filters: &[String]) {}

    /// A fixture type with runnable methods is about to run
    fn on_fixture_start(&self, _short_name: &str) {}

    fn on_invocation_start(&self, _display_name: &str) {}

    fn on_invocation_passed(&self, _display_name: &str) {}

    fn on_invocation_failed(&self, _display_name: &str, _message: &str) {}

    fn on_fixture_end(&self, _short_name: &str) {}

    fn on_run_complete(&self, _tally: &Tally) {}
}

/// Colored output on stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    fn flush() {
        let _ = std::io::stdout().flush();
    }
}

impl Reporter for ConsoleReporter {
    fn on_filters(&self, filters: &[String]) {
        if filters.is_empty() {
            return;
        }
        println!("Using filters:");
        for filter in filters {
            println!("{}", filter);
        }
    }

    fn on_fixture_start(&self, short_name: &str) {
        println!("{}", format!("{}:", short_name).white());
    }

    fn on_invocation_start(&self, display_name: &str) {
        print!("{}", format!("  {}...", display_name).cyan());
        Self::flush();
    }

    fn on_invocation_passed(&self, display_name: &str) {
        println!("\r{} {}   ", "\u{2713}".green(), display_name.white());
    }

    fn on_invocation_failed(&self, display_name: &str, message: &str) {
        println!(
            "\r{} {} {}",
            "X".red(),
            display_name.white(),
            message.red()
        );
    }

    fn on_fixture_end(&self, _short_name: &str) {
        println!();
    }

    fn on_run_complete(&self, tally: &Tally) {
        let summary = tally.to_string();
        if tally.failed > 0 {
            println!("{}", summary.red());
        } else {
            println!("{}", summary.green());
        }
    }
}

/// One reported event, as captured by [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Filters(Vec<String>),
    FixtureStart(String),
    InvocationStart(String),
    Passed(String),
    Failed { name: String, message: String },
    FixtureEnd(String),
    RunComplete(Tally),
}

/// Keeps every event in memory, for inspecting a run
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Display names of passed invocations, in order
    pub fn passed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Passed(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// `(display name, message)` of failed invocations, in order
    pub fn failed(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Failed { name, message } => Some((name, message)),
                _ => None,
            })
            .collect()
    }

    /// Fixture headers, in order
    pub fn fixtures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::FixtureStart(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn on_filters(&self, filters: &[String]) {
        self.push(ReportEvent::Filters(filters.to_vec()));
    }

    fn on_fixture_start(&self, short_name: &str) {
        self.push(ReportEvent::FixtureStart(short_name.to_string()));
    }

    fn on_invocation_start(&self, display_name: &str) {
        self.push(ReportEvent::InvocationStart(display_name.to_string()));
    }

    fn on_invocation_passed(&self, display_name: &str) {
        self.push(ReportEvent::Passed(display_name.to_string()));
    }

    fn on_invocation_failed(&self, display_name: &str, message: &str) {
        self.push(ReportEvent::Failed {
            name: display_name.to_string(),
            message: message.to_string(),
        });
    }

    fn on_fixture_end(&self, short_name: &str) {
        self.push(ReportEvent::FixtureEnd(short_name.to_string()));
    }

    fn on_run_complete(&self, tally: &Tally) {
        self.push(ReportEvent::RunComplete(*tally));
    }
}
