//! Failure capture and classification
//!
//! Test bodies fail either by returning an error or by panicking (every
//! `assert!` does). Panics are caught with a quiet hook installed once per
//! process that records the location and backtrace instead of printing them.
//! The method invoker wraps whatever a body raised in an [`InvocationError`];
//! classification peels that single layer off again before deciding what to
//! show on the console.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::resolver::ResolutionError;
use super::value::{ArgumentError, CoercionError};
use crate::common::BoxError;

/// Boilerplate the default panic hook appends to panic reports
pub const BACKTRACE_HINT: &str =
    "note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace";

/// Delimiters around response content in the collected output
pub const RESPONSE_HEADER: &str = "======Response follows======";
pub const RESPONSE_FOOTER: &str = "============================";

static CRLF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\r\\n|\r\n").expect("CRLF pattern is valid"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static HOOK: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

#[derive(Default)]
struct PanicSite {
    location: Option<String>,
    backtrace: Option<String>,
}

/// A panic caught while running test code
#[derive(Debug, Clone)]
pub struct PanicError {
    message: String,
    location: Option<String>,
    backtrace: Option<String>,
}

impl PanicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            backtrace: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Message, location and (when captured) backtrace
    pub fn detail(&self) -> String {
        let mut out = match &self.location {
            Some(location) => format!("panicked at {}:\n{}", location, self.message),
            None => format!("panicked:\n{}", self.message),
        };
        if let Some(backtrace) = &self.backtrace {
            out.push_str("\nstack backtrace:\n");
            out.push_str(backtrace);
        }
        out
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for PanicError {}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let backtrace = Backtrace::capture();
                let site = PanicSite {
                    location: info.location().map(|l| l.to_string()),
                    backtrace: (backtrace.status() == BacktraceStatus::Captured)
                        .then(|| backtrace.to_string()),
                };
                LAST_PANIC.with(|last| *last.borrow_mut() = Some(site));
            } else {
                previous(info);
            }
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Run `f`, turning a panic into a [`PanicError`] without printing it
pub fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, PanicError> {
    install_hook();
    let was_capturing = CAPTURING.with(|c| c.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|c| c.set(was_capturing));

    result.map_err(|payload| {
        let site = LAST_PANIC
            .with(|last| last.borrow_mut().take())
            .unwrap_or_default();
        PanicError {
            message: payload_message(payload.as_ref()),
            location: site.location,
            backtrace: site.backtrace,
        }
    })
}

/// An explicit assertion failure returned by a test body
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AssertionError {
    message: String,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fail with an [`AssertionError`] unless `actual == expected`
pub fn ensure_eq<T: PartialEq + fmt::Debug>(actual: T, expected: T) -> Result<(), AssertionError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "expected {:?}\n  but was {:?}",
            expected, actual
        )))
    }
}

/// A failed request whose response body should be kept with the test output
#[derive(Error, Debug, Clone)]
#[error("request failed with status {status}")]
pub struct ResponseError {
    pub status: u16,
    pub response_content: String,
}

impl ResponseError {
    pub fn new(status: u16, response_content: impl Into<String>) -> Self {
        Self {
            status,
            response_content: response_content.into(),
        }
    }
}

/// Wraps whatever a test or setup method raised
#[derive(Error, Debug)]
#[error("{method} raised an error")]
pub struct InvocationError {
    pub method: String,
    #[source]
    pub source: BoxError,
}

impl InvocationError {
    pub fn new(method: &str, source: BoxError) -> Self {
        Self {
            method: method.to_string(),
            source,
        }
    }
}

/// What the harness shows for a failed invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Short message for the console line
    pub message: String,
    /// Full detail for the collected output
    pub detail: String,
    /// Response body, when the error carries one
    pub response_content: Option<String>,
}

/// Peel one layer of [`InvocationError`], if present
pub fn unwrap_invocation<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    match err.downcast_ref::<InvocationError>() {
        Some(invocation) => invocation.source.as_ref(),
        None => err,
    }
}

fn innermost<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

fn is_assertion(err: &(dyn StdError + 'static)) -> bool {
    err.is::<PanicError>() || err.is::<AssertionError>()
}

/// Short name for the kind of an error
pub fn kind_name(err: &(dyn StdError + 'static)) -> String {
    named_kind(err).unwrap_or_else(|| "Error".to_string())
}

/// Console label for an error that is not an assertion
///
/// Ad-hoc errors (`"prep failed".into()`) carry no type name, so their
/// message is shown instead.
fn console_kind(err: &(dyn StdError + 'static)) -> String {
    named_kind(err).unwrap_or_else(|| {
        let message = WHITESPACE.replace_all(&err.to_string(), " ").trim().to_string();
        if message.is_empty() {
            "Error".to_string()
        } else {
            message
        }
    })
}

fn named_kind(err: &(dyn StdError + 'static)) -> Option<String> {
    if let Some(io) = err.downcast_ref::<std::io::Error>() {
        return Some(format!("{:?}", io.kind()));
    }
    if err.is::<ResolutionError>() {
        return Some("ResolutionError".to_string());
    }
    if err.is::<ArgumentError>() {
        return Some("ArgumentError".to_string());
    }
    if err.is::<CoercionError>() {
        return Some("CoercionError".to_string());
    }
    if err.is::<ResponseError>() {
        return Some("ResponseError".to_string());
    }
    if err.is::<PanicError>() {
        return Some("Panic".to_string());
    }

    // Derived Debug output starts with the type or variant name
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Collapse whitespace runs and drop known boilerplate suffixes
pub fn normalize_assertion_message(message: &str, strip_suffixes: &[String]) -> String {
    let mut collapsed = WHITESPACE.replace_all(message, " ").into_owned();
    for suffix in std::iter::once(BACKTRACE_HINT).chain(strip_suffixes.iter().map(String::as_str)) {
        let suffix = WHITESPACE.replace_all(suffix, " ");
        collapsed = collapsed.replace(suffix.as_ref(), "");
    }
    collapsed.trim().to_string()
}

/// Split text on real or escaped (`\r\n` written out) CRLF sequences
pub fn split_crlf(text: &str) -> Vec<&str> {
    CRLF.split(text).collect()
}

/// Replace real or escaped CRLF sequences with `\n`
pub fn normalize_crlf(text: &str) -> String {
    CRLF.replace_all(text, "\n").into_owned()
}

fn detail(err: &(dyn StdError + 'static)) -> String {
    let mut out = match err.downcast_ref::<PanicError>() {
        Some(panic) => panic.detail(),
        None => format!("{}: {}", kind_name(err), err),
    };
    let mut current = err.source();
    while let Some(cause) = current {
        match cause.downcast_ref::<PanicError>() {
            Some(panic) => out.push_str(&format!("\n ---> {}", panic.detail())),
            None => out.push_str(&format!("\n ---> {}: {}", kind_name(cause), cause)),
        }
        current = cause.source();
    }
    out
}

/// Decide the console message and collected detail for a failure
pub fn classify(err: &(dyn StdError + 'static), strip_suffixes: &[String]) -> Classification {
    let err = unwrap_invocation(err);

    let message = if is_assertion(err) {
        normalize_assertion_message(&err.to_string(), strip_suffixes)
    } else if err.is::<ResolutionError>() {
        let cause = innermost(err);
        if is_assertion(cause) || cause.is::<ResolutionError>() {
            normalize_assertion_message(&cause.to_string(), strip_suffixes)
        } else {
            console_kind(cause)
        }
    } else {
        console_kind(err)
    };

    Classification {
        message,
        detail: detail(err),
        response_content: err
            .downcast_ref::<ResponseError>()
            .map(|r| r.response_content.clone()),
    }
}
