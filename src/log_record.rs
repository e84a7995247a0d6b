//! Log record representation.
//!
//! `LogRecord` is the fully populated structured entry handed to every
//! sink. `DeferredRecord` is the small value object a producer thread
//! captures at the call site; the logger's dispatch thread completes it
//! into a `LogRecord` by merging in the process-wide base fields.

use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};

use crate::level::Severity;

/// Value of an additional field attached to a record.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered key/value list with last-write-wins semantics.
pub type Fields = Vec<(String, FieldValue)>;

/// Insert or replace `key`, keeping the position of the first insertion.
pub fn set_field(fields: &mut Fields, key: impl Into<String>, value: impl Into<FieldValue>) {
    let key = key.into();
    let value = value.into();
    match fields.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => fields.push((key, value)),
    }
}

/// Process-level context stamped onto every record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordMetadata {
    /// Host name of the machine running the process.
    pub host: String,
    pub process_id: u32,
    pub process_name: String,
}

impl RecordMetadata {
    /// Capture host name, pid, and executable name of the current process.
    pub fn capture() -> Self {
        let process_id = std::process::id();
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();
        let process_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| process_id.to_string());
        Self {
            host,
            process_id,
            process_name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub message: String,
    /// Time the record was created on the producer thread.
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub metadata: RecordMetadata,
    /// Identifier of the thread that created the record.
    pub thread_id: String,
    /// Additional structured fields in insertion order.
    pub fields: Fields,
}

impl LogRecord {
    /// Construct a record stamped with the current time and thread.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            severity,
            metadata: RecordMetadata::default(),
            thread_id: current_thread_id(),
            fields: Fields::new(),
        }
    }

    /// Attach process metadata.
    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add or replace an additional field.
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        set_field(&mut self.fields, key, value);
    }

    /// Look up an additional field by key.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Call-site capture of a log event, completed later on the dispatch thread.
#[derive(Clone, Debug)]
pub struct DeferredRecord {
    pub severity: Severity,
    pub message: String,
    pub fields: Fields,
    pub thread_id: String,
    pub timestamp: DateTime<Utc>,
}

impl DeferredRecord {
    pub fn capture(severity: Severity, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            severity,
            message: message.into(),
            fields,
            thread_id: current_thread_id(),
            timestamp: Utc::now(),
        }
    }

    /// Merge base fields and metadata into a complete record. Fields given
    /// at the call site override base fields with the same key.
    pub fn complete(self, metadata: &RecordMetadata, base_fields: &Fields) -> LogRecord {
        let mut fields = base_fields.clone();
        for (key, value) in self.fields {
            set_field(&mut fields, key, value);
        }
        LogRecord {
            message: self.message,
            timestamp: self.timestamp,
            severity: self.severity,
            metadata: metadata.clone(),
            thread_id: self.thread_id,
            fields,
        }
    }
}

fn current_thread_id() -> String {
    format!("{:?}", thread::current().id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_field_is_last_write_wins() {
        let mut record = LogRecord::new(Severity::Info, "msg");
        record.add_field("a", 1);
        record.add_field("b", "x");
        record.add_field("a", 2.5);
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields[0].0, "a");
        assert_eq!(record.field("a"), Some(&FieldValue::Float(2.5)));
    }

    #[test]
    fn deferred_record_overrides_base_fields() {
        let mut base = Fields::new();
        set_field(&mut base, "service", "api");
        set_field(&mut base, "region", "eu");
        let mut call_site = Fields::new();
        set_field(&mut call_site, "region", "us");
        let deferred = DeferredRecord::capture(Severity::Error, "boom", call_site);
        let metadata = RecordMetadata {
            host: "box".into(),
            process_id: 42,
            process_name: "svc".into(),
        };
        let record = deferred.complete(&metadata, &base);
        assert_eq!(record.field("service"), Some(&FieldValue::from("api")));
        assert_eq!(record.field("region"), Some(&FieldValue::from("us")));
        assert_eq!(record.metadata.process_id, 42);
        assert_eq!(record.severity, Severity::Error);
    }

    #[test]
    fn capture_reports_current_process() {
        let metadata = RecordMetadata::capture();
        assert_eq!(metadata.process_id, std::process::id());
        assert!(!metadata.process_name.is_empty());
    }
}
