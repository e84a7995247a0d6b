//! Formatter implementations.
//!
//! Provides the core [`RecordFormatter`] trait used by the console and file
//! sinks, a shared trait-object wrapper, and the GELF serialiser used by the
//! network sink.

use std::{fmt, sync::Arc};

use chrono::Local;

use crate::log_record::LogRecord;

pub mod gelf;

pub use gelf::{GelfFormatter, to_gelf_json};

/// Trait for formatting log records into strings.
///
/// Implementors must be thread-safe (`Send + Sync`) because sinks format on
/// their own worker threads.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

impl<F> RecordFormatter for F
where
    F: Fn(&LogRecord) -> String + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> String {
        self(record)
    }
}

/// Shared formatter trait object used across sinks.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn RecordFormatter>,
}

impl SharedFormatter {
    pub fn new<F>(formatter: F) -> Self
    where
        F: RecordFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    pub fn format(&self, record: &LogRecord) -> String {
        self.inner.format(record)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn RecordFormatter>)")
    }
}

/// `2024-01-31 12:00:00 (host) SEVERITY: message`, in local time.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFormatter;

impl RecordFormatter for DefaultFormatter {
    fn format(&self, record: &LogRecord) -> String {
        format!(
            "{} ({}) {}: {}",
            record
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            record.metadata.host,
            record.severity,
            record.message
        )
    }
}

/// `SEVERITY: message`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConsoleFormatter;

impl RecordFormatter for ConsoleFormatter {
    fn format(&self, record: &LogRecord) -> String {
        format!("{}: {}", record.severity, record.message)
    }
}
