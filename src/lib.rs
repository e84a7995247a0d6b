//! Structured logging client for Graylog.
//!
//! Records are logged through a [`Logger`], which fans them out to any
//! number of [`LogHandler`] sinks: the console, a file, or a Graylog server
//! reached over a self-healing TCP connection that frames each GELF message
//! with a trailing NUL byte. No logging call ever blocks on I/O.

pub mod connection;
pub mod executor;
pub mod file_handler;
pub mod formatter;
pub mod graylog_handler;
pub mod handler;
pub mod handlers;
pub mod level;
pub mod log_record;
pub mod logger;
pub mod queue;
pub mod rate_limited_warner;
pub mod stream_handler;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use connection::{ConnectionConfig, ConnectionStatus, GraylogConnection};
pub use executor::SerialExecutor;
pub use file_handler::FileHandler;
pub use formatter::{
    ConsoleFormatter, DefaultFormatter, GelfFormatter, RecordFormatter, SharedFormatter,
};
pub use graylog_handler::GraylogHandler;
pub use handler::{HandlerError, LogHandler};
pub use handlers::{GraylogHandlerBuilder, HandlerBuildError, HandlerBuilderTrait};
pub use level::Severity;
pub use log_record::{FieldValue, Fields, LogRecord, RecordMetadata};
pub use logger::Logger;
pub use queue::MessageQueue;
pub use stream_handler::StreamHandler;
