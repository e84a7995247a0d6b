//! Network sink shipping GELF records to a Graylog server over TCP.

use std::{any::Any, time::Duration};

use crate::{
    connection::{ConnectionConfig, ConnectionStatus, GraylogConnection},
    formatter::to_gelf_json,
    handler::{HandlerError, LogHandler},
    log_record::LogRecord,
};

/// Handler that serialises each record to GELF and queues it on a
/// [`GraylogConnection`].
///
/// Construction never blocks: the connection resolves and connects on its
/// own thread, and records logged meanwhile wait in its bounded queue.
#[derive(Debug)]
pub struct GraylogHandler {
    connection: GraylogConnection,
}

impl GraylogHandler {
    pub fn new(host: impl Into<String>, port: u16, max_queue_length: usize) -> Self {
        Self::with_config(ConnectionConfig::new(host, port).with_max_queue_length(max_queue_length))
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            connection: GraylogConnection::with_config(config),
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.connection_status()
    }

    pub fn connection(&self) -> &GraylogConnection {
        &self.connection
    }
}

impl LogHandler for GraylogHandler {
    fn add_message(&self, record: &LogRecord) -> Result<(), HandlerError> {
        if self.connection.try_send_message(to_gelf_json(record)) {
            Ok(())
        } else {
            Err(HandlerError::QueueFull)
        }
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.connection.flush(timeout)
    }

    fn queue_size(&self) -> usize {
        self.connection.queue_size()
    }

    fn empty_queue(&self) -> bool {
        self.connection.queue_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
