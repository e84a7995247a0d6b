//! Stream-based logging handler implementation.
//!
//! `StreamHandler` formats records and writes them to an `io::Write` on its
//! own [`SerialExecutor`], so the producer never blocks on I/O. Records
//! arriving while the executor backlog is at capacity are dropped.

use std::{
    any::Any,
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::bounded;
use log::warn;
use parking_lot::Mutex;

use crate::{
    executor::SerialExecutor,
    formatter::{ConsoleFormatter, RecordFormatter, SharedFormatter},
    handler::{HandlerError, LogHandler},
    log_record::LogRecord,
    rate_limited_warner::RateLimitedWarner,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Handler that writes formatted log records to a stream.
pub struct StreamHandler {
    writer: SharedWriter,
    formatter: SharedFormatter,
    executor: SerialExecutor,
    capacity: usize,
    console: bool,
    closed: AtomicBool,
    warner: Arc<RateLimitedWarner>,
    name: &'static str,
}

impl StreamHandler {
    /// Console handler writing to `stdout` with a [`ConsoleFormatter`].
    pub fn stdout() -> Self {
        let mut handler = Self::new(io::stdout(), ConsoleFormatter);
        handler.console = true;
        handler
    }

    /// Console handler writing to `stderr` with a [`ConsoleFormatter`].
    pub fn stderr() -> Self {
        let mut handler = Self::new(io::stderr(), ConsoleFormatter);
        handler.console = true;
        handler
    }

    /// Create a new handler from an arbitrary writer and formatter using the default capacity.
    pub fn new<W, F>(writer: W, formatter: F) -> Self
    where
        W: Write + Send + 'static,
        F: RecordFormatter + 'static,
    {
        Self::with_capacity(writer, formatter, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new handler whose backlog holds at most `capacity` records.
    pub fn with_capacity<W, F>(writer: W, formatter: F, capacity: usize) -> Self
    where
        W: Write + Send + 'static,
        F: RecordFormatter + 'static,
    {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            formatter: SharedFormatter::new(formatter),
            executor: SerialExecutor::named("stream-handler"),
            capacity,
            console: false,
            closed: AtomicBool::new(false),
            warner: Arc::new(RateLimitedWarner::default()),
            name: "StreamHandler",
        }
    }

    /// Replace the formatter used for records queued from now on.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: RecordFormatter + 'static,
    {
        self.formatter = SharedFormatter::new(formatter);
        self
    }

    pub(crate) fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Whether this handler writes to the process console.
    pub fn is_console(&self) -> bool {
        self.console
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting records and write out those already queued.
    ///
    /// Later calls to [`LogHandler::add_message`] fail with
    /// [`HandlerError::Closed`]. Returns the result of the final flush.
    pub fn close(&self, timeout: Duration) -> bool {
        self.closed.store(true, Ordering::Release);
        self.flush(timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn report_drop(&self) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!(
                "{}: queue full, dropped {count} records in the last interval",
                self.name
            );
        });
    }
}

impl LogHandler for StreamHandler {
    fn add_message(&self, record: &LogRecord) -> Result<(), HandlerError> {
        if self.is_closed() {
            return Err(HandlerError::Closed);
        }
        let line = self.formatter.format(record);
        let writer = Arc::clone(&self.writer);
        let name = self.name;
        let accepted = self.executor.try_submit_within(
            move || {
                let mut writer = writer.lock();
                if writeln!(writer, "{line}").is_err() {
                    warn!("{name}: write error");
                }
            },
            self.capacity,
        );
        if accepted {
            Ok(())
        } else {
            self.report_drop();
            Err(HandlerError::QueueFull)
        }
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.warner.flush(|count| {
            warn!("{}: dropped {count} records since last warning", self.name);
        });
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = bounded(1);
        let writer = Arc::clone(&self.writer);
        let name = self.name;
        self.executor.submit(move || {
            let ok = writer.lock().flush().is_ok();
            if !ok {
                warn!("{name}: flush error");
            }
            let _ = done_tx.send(ok);
        });
        let remaining = deadline.saturating_duration_since(Instant::now());
        matches!(done_rx.recv_timeout(remaining), Ok(true))
    }

    fn queue_size(&self) -> usize {
        self.executor.queue_size()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.name)
            .field("capacity", &self.capacity)
            .field("console", &self.console)
            .field("queue_size", &self.queue_size())
            .finish()
    }
}
