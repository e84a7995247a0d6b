use std::{any::Any, time::Duration};

use thiserror::Error;

use crate::log_record::LogRecord;

/// Reasons a sink refused a record.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HandlerError {
    /// The sink's backlog is at capacity; the record was dropped.
    #[error("handler queue is full")]
    QueueFull,
    /// The sink has shut down.
    #[error("handler is closed")]
    Closed,
}

/// Trait implemented by every log sink.
///
/// Sinks are shared between the dispatch thread and the application, so they
/// must be `Send + Sync`. `add_message` never blocks on I/O: each sink hands
/// the record to its own background worker and drops it if that worker's
/// backlog is full.
pub trait LogHandler: Send + Sync {
    /// Queue a record for output.
    fn add_message(&self, record: &LogRecord) -> Result<(), HandlerError>;

    /// Wait up to `timeout` for previously queued records to be processed.
    fn flush(&self, timeout: Duration) -> bool;

    /// Approximate number of records waiting in this sink.
    fn queue_size(&self) -> usize;

    fn empty_queue(&self) -> bool {
        self.queue_size() == 0
    }

    /// Return `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}
