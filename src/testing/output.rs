//! Per-invocation output capture
//!
//! Fixtures receive an `Arc<dyn TestOutput>` through the resolver. Every
//! invocation gets its own [`OutputCollector`]; after the invocation the
//! engine flushes it into the shared log with [`OutputCollector::collect`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::failure::normalize_crlf;

/// Sink for diagnostic text written by test code
pub trait TestOutput: Send + Sync {
    fn write_line(&self, message: &str);

    /// Formatted variant: `output.write_fmt_line(format_args!("id={}", id))`
    fn write_fmt_line(&self, args: fmt::Arguments<'_>) {
        self.write_line(&args.to_string());
    }
}

/// Buffers one invocation's output until it is collected
#[derive(Debug)]
pub struct OutputCollector {
    type_name: String,
    method_name: String,
    suffix: String,
    buffer: Mutex<String>,
    has_written: AtomicBool,
}

impl OutputCollector {
    pub fn new(type_name: &str, method_name: &str, suffix: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
            suffix: suffix.to_string(),
            buffer: Mutex::new(String::new()),
            has_written: AtomicBool::new(false),
        }
    }

    pub fn has_written(&self) -> bool {
        self.has_written.load(Ordering::SeqCst)
    }

    /// `"{Type}.{Method}{Suffix}:"`
    pub fn header(&self) -> String {
        format!("{}.{}{}:", self.type_name, self.method_name, self.suffix)
    }

    /// The block `collect` would write, or `None` when there is nothing to show
    pub fn render(&self) -> Option<String> {
        if !self.has_written() {
            return None;
        }
        let body = normalize_crlf(&self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        if body.trim().is_empty() {
            return None;
        }
        Some(format!("{}\n\n\n{}\n", self.header(), body))
    }

    /// Write the buffered output to `sink` as a single block
    ///
    /// No-op when nothing, or only whitespace, was written.
    pub async fn collect<W>(&self, sink: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if let Some(block) = self.render() {
            sink.write_all(block.as_bytes()).await?;
            sink.flush().await?;
        }
        Ok(())
    }
}

impl TestOutput for OutputCollector {
    fn write_line(&self, message: &str) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push_str(message);
        buffer.push('\n');
        self.has_written.store(true, Ordering::SeqCst);
    }
}
