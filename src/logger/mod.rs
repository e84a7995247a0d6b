//! Dispatch layer fanning records out to registered handlers.
//!
//! [`Logger`] is an explicitly constructed context object. Producers call
//! [`Logger::log`], which captures the record on the calling thread and
//! hands it to the logger's [`SerialExecutor`]; the executor thread merges in
//! the base fields and process metadata and passes the completed record to
//! every handler.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::warn;
use parking_lot::RwLock;

use crate::{
    executor::SerialExecutor,
    handler::LogHandler,
    level::Severity,
    log_record::{DeferredRecord, FieldValue, Fields, RecordMetadata, set_field},
    rate_limited_warner::RateLimitedWarner,
    stream_handler::StreamHandler,
};


/// Records waiting for dispatch beyond this many are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type HandlerList = Arc<RwLock<Vec<Arc<dyn LogHandler>>>>;

pub struct Logger {
    min_severity: AtomicU8,
    handlers: HandlerList,
    base_fields: RwLock<Arc<Fields>>,
    metadata: Arc<RecordMetadata>,
    executor: SerialExecutor,
    capacity: usize,
    drop_warner: RateLimitedWarner,
}

impl Logger {
    /// Create a logger with no handlers and a minimum severity of
    /// [`Severity::Notice`].
    pub fn new() -> Self {
        Self::with_metadata(RecordMetadata::capture())
    }

    /// Create a logger stamping `metadata` onto every record.
    pub fn with_metadata(metadata: RecordMetadata) -> Self {
        Self {
            min_severity: AtomicU8::new(Severity::default().as_u8()),
            handlers: Arc::new(RwLock::new(Vec::new())),
            base_fields: RwLock::new(Arc::new(Fields::new())),
            metadata: Arc::new(metadata),
            executor: SerialExecutor::named("logger-dispatch"),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            drop_warner: RateLimitedWarner::default(),
        }
    }

    /// Limit the dispatch backlog to `capacity` records.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Register `handler`.
    ///
    /// At most one console [`StreamHandler`] is kept: adding one replaces
    /// any console handler registered earlier.
    pub fn add_handler(&self, handler: Arc<dyn LogHandler>) {
        let mut handlers = self.handlers.write();
        if is_console(handler.as_ref()) {
            handlers.retain(|existing| !is_console(existing.as_ref()));
        }
        handlers.push(handler);
    }

    pub fn remove_all_handlers(&self) {
        self.handlers.write().clear();
    }

    /// Snapshot of the registered handlers.
    pub fn handlers(&self) -> Vec<Arc<dyn LogHandler>> {
        self.handlers.read().clone()
    }

    /// Discard records less severe than `severity`.
    pub fn set_min_severity(&self, severity: Severity) {
        self.min_severity.store(severity.as_u8(), Ordering::Relaxed);
    }

    pub fn min_severity(&self) -> Severity {
        Severity::try_from(self.min_severity.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Attach `key = value` to every record logged from now on.
    pub fn add_field(&self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let mut guard = self.base_fields.write();
        let mut fields = Fields::clone(&guard);
        set_field(&mut fields, key, value);
        *guard = Arc::new(fields);
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.log_with_fields(severity, message, Fields::new());
    }

    /// Log with additional fields; these override base fields with the same key.
    pub fn log_with_fields(&self, severity: Severity, message: impl Into<String>, fields: Fields) {
        if !severity.is_enabled_for(self.min_severity()) {
            return;
        }
        let deferred = DeferredRecord::capture(severity, message, fields);
        let base = Arc::clone(&*self.base_fields.read());
        let metadata = Arc::clone(&self.metadata);
        let handlers = Arc::clone(&self.handlers);
        let accepted = self.executor.try_submit_within(
            move || {
                let record = deferred.complete(&metadata, &base);
                for handler in handlers.read().iter() {
                    // Handlers report their own drops.
                    let _ = handler.add_message(&record);
                }
            },
            self.capacity,
        );
        if !accepted {
            self.drop_warner.record_drop();
            self.drop_warner.warn_if_due(|count| {
                warn!("Logger: dispatch queue full, dropped {count} records");
            });
        }
    }

    /// Dispatch every record logged so far, then flush all handlers in
    /// parallel.
    ///
    /// Returns `true` only if dispatch and every handler finished before
    /// `timeout` elapsed.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.drop_warner.flush(|count| {
            warn!("Logger: dropped {count} records since last warning");
        });
        let deadline = Instant::now() + timeout;
        if !self.executor.barrier(timeout) {
            return false;
        }
        let handlers = self.handlers();
        thread::scope(|scope| {
            let flushes: Vec<_> = handlers
                .iter()
                .map(|handler| {
                    scope.spawn(move || {
                        handler.flush(deadline.saturating_duration_since(Instant::now()))
                    })
                })
                .collect();
            flushes
                .into_iter()
                .map(|flush| flush.join().unwrap_or(false))
                .fold(true, |all, ok| all && ok)
        })
    }

    /// Total number of records waiting in dispatch and in every handler.
    pub fn queue_size(&self) -> usize {
        self.executor.queue_size()
            + self
                .handlers
                .read()
                .iter()
                .map(|h| h.queue_size())
                .sum::<usize>()
    }

    pub fn empty_queue(&self) -> bool {
        self.executor.queue_size() == 0 && self.handlers.read().iter().all(|h| h.empty_queue())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_severity", &self.min_severity())
            .field("handlers", &self.handlers.read().len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

fn is_console(handler: &dyn LogHandler) -> bool {
    handler
        .as_any()
        .downcast_ref::<StreamHandler>()
        .is_some_and(StreamHandler::is_console)
}
