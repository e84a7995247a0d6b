//! GELF 1.1 serialisation.
//!
//! Each record becomes one JSON object. Process metadata and every extra
//! field are emitted as additional fields, whose names carry a leading
//! underscore.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::log_record::{FieldValue, LogRecord};

use super::RecordFormatter;

pub const GELF_VERSION: &str = "1.1";

#[derive(Serialize)]
struct GelfHeader<'a> {
    version: &'static str,
    host: &'a str,
    short_message: &'a str,
    /// Seconds since the epoch with millisecond precision.
    timestamp: f64,
    level: u8,
    #[serde(rename = "_process_id")]
    process_id: u32,
    #[serde(rename = "_process")]
    process: &'a str,
    #[serde(rename = "_thread_id")]
    thread_id: &'a str,
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Str(s) => Value::String(s.clone()),
        FieldValue::Int(i) => Value::Number((*i).into()),
        // Non-finite floats have no JSON representation.
        FieldValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
    }
}

/// Serialise `record` as a single-line GELF JSON document.
///
/// Extra fields are written after the header, so a field named like one
/// of the process fields (`process_id` becomes `_process_id`) replaces it.
pub fn to_gelf_json(record: &LogRecord) -> String {
    let header = GelfHeader {
        version: GELF_VERSION,
        host: &record.metadata.host,
        short_message: &record.message,
        timestamp: record.timestamp.timestamp_millis() as f64 / 1000.0,
        level: record.severity.as_u8(),
        process_id: record.metadata.process_id,
        process: &record.metadata.process_name,
        thread_id: &record.thread_id,
    };
    // The header holds only strings and finite numbers, which always serialise.
    let mut object = match serde_json::to_value(&header) {
        Ok(Value::Object(object)) => object,
        _ => Map::new(),
    };
    for (key, value) in &record.fields {
        object.insert(format!("_{key}"), field_to_json(value));
    }
    Value::Object(object).to_string()
}

/// [`RecordFormatter`] producing GELF JSON.
#[derive(Copy, Clone, Debug, Default)]
pub struct GelfFormatter;

impl RecordFormatter for GelfFormatter {
    fn format(&self, record: &LogRecord) -> String {
        to_gelf_json(record)
    }
}
