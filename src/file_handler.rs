//! File sink appending formatted records to a log file.

use std::{
    any::Any,
    fs::{File, OpenOptions},
    io::BufWriter,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    formatter::{DefaultFormatter, RecordFormatter},
    handler::{HandlerError, LogHandler},
    handlers::HandlerBuildError,
    log_record::LogRecord,
    stream_handler::{DEFAULT_CHANNEL_CAPACITY, StreamHandler},
};

/// Handler writing to a file opened in append mode.
///
/// Lines are buffered in user space; [`LogHandler::flush`] pushes them to
/// the operating system.
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    inner: StreamHandler,
}

impl FileHandler {
    /// Open (creating if needed) `path` and use the [`DefaultFormatter`].
    pub fn new(path: impl AsRef<Path>) -> Result<Self, HandlerBuildError> {
        Self::with_formatter(path, DefaultFormatter)
    }

    pub fn with_formatter<F>(path: impl AsRef<Path>, formatter: F) -> Result<Self, HandlerBuildError>
    where
        F: RecordFormatter + 'static,
    {
        Self::with_capacity(path, formatter, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity<F>(
        path: impl AsRef<Path>,
        formatter: F,
        capacity: usize,
    ) -> Result<Self, HandlerBuildError>
    where
        F: RecordFormatter + 'static,
    {
        if capacity == 0 {
            return Err(HandlerBuildError::InvalidConfig(
                "capacity must be greater than zero".into(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        let inner = StreamHandler::with_capacity(BufWriter::new(file), formatter, capacity)
            .named("FileHandler");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting records and flush those already queued to the file.
    pub fn close(&self, timeout: Duration) -> bool {
        self.inner.close(timeout)
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl LogHandler for FileHandler {
    fn add_message(&self, record: &LogRecord) -> Result<(), HandlerError> {
        self.inner.add_message(record)
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.inner.flush(timeout)
    }

    fn queue_size(&self) -> usize {
        self.inner.queue_size()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
