//! A simple handler that accumulates records in memory for test assertions.

use std::{any::Any, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
    handler::{HandlerError, LogHandler},
    log_record::LogRecord,
};

/// Handler that stores every record it receives for later inspection.
///
/// An optional capacity makes it reject records once that many are held,
/// and `set_flush_result` controls what [`LogHandler::flush`] reports.
#[derive(Clone, Default)]
pub struct CollectingHandler {
    records: Arc<Mutex<Vec<LogRecord>>>,
    capacity: Option<usize>,
    flush_result: Arc<Mutex<Option<bool>>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that rejects records beyond `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Return a snapshot of all records received so far.
    pub fn collected(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn set_flush_result(&self, result: bool) {
        *self.flush_result.lock() = Some(result);
    }
}

impl LogHandler for CollectingHandler {
    fn add_message(&self, record: &LogRecord) -> Result<(), HandlerError> {
        let mut records = self.records.lock();
        if self.capacity.is_some_and(|cap| records.len() >= cap) {
            return Err(HandlerError::QueueFull);
        }
        records.push(record.clone());
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> bool {
        (*self.flush_result.lock()).unwrap_or(true)
    }

    fn queue_size(&self) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
