//! Persistent TCP connection to a Graylog server.
//!
//! [`GraylogConnection`] accepts already-serialised messages from any number
//! of producer threads and ships them, NUL-delimited, over a single TCP
//! stream. A dedicated I/O thread resolves the server address, connects,
//! drains the message queue onto the socket, and recovers from every failure
//! by reconnecting. Nothing on the producer side ever blocks on the network.

mod config;
mod endpoint;
mod outbound;
mod status;
mod worker;

#[cfg(test)]
mod tests;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::warn;
use parking_lot::Mutex;

use crate::{
    executor::SerialExecutor, queue::MessageQueue, rate_limited_warner::RateLimitedWarner,
};

pub use config::{
    ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HIGH_WATER_MARK, DEFAULT_LONG_RETRY_DELAY,
    DEFAULT_MAX_QUEUE_LENGTH, DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_SHORT_RETRY_DELAY,
};
pub use endpoint::{EndpointCandidates, Resolve, SystemResolver};
pub use outbound::{FRAME_DELIMITER, OutboundBuffer};
pub use status::ConnectionStatus;

use status::SharedStatus;
use worker::{QueuedMessage, spawn_worker};

/// Flush barrier not yet known to have been released.
struct PendingBarrier {
    released: Receiver<()>,
    /// Value of the accepted-message counter when the barrier was created.
    accepted_at: u64,
}

/// Handle to a self-healing connection; dropping it stops the I/O thread.
pub struct GraylogConnection {
    messages: MessageQueue<QueuedMessage>,
    accepted: AtomicU64,
    pending_barrier: Mutex<Option<PendingBarrier>>,
    status: Arc<SharedStatus>,
    executor: SerialExecutor,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    max_queue_length: usize,
    warner: RateLimitedWarner,
    target: String,
}

impl GraylogConnection {
    /// Start connecting to `host:port` immediately; never blocks.
    pub fn new(host: impl Into<String>, port: u16, max_queue_length: usize) -> Self {
        Self::with_config(ConnectionConfig::new(host, port).with_max_queue_length(max_queue_length))
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        let messages = MessageQueue::new();
        let status = Arc::new(SharedStatus::new(ConnectionStatus::AddressLookup));
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let max_queue_length = config.max_queue_length;
        let warner = RateLimitedWarner::new(config.warn_interval);
        let target = format!("{}:{}", config.host, config.port);
        let handle = spawn_worker(config, messages.clone(), Arc::clone(&status), shutdown_rx);
        Self {
            messages,
            accepted: AtomicU64::new(0),
            pending_barrier: Mutex::new(None),
            status,
            executor: SerialExecutor::named("graylog-flush"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            max_queue_length,
            warner,
            target,
        }
    }

    /// Queue one message for transmission.
    ///
    /// Messages arriving while `max_queue_length` messages are already
    /// waiting are dropped; drops are reported through rate-limited warnings.
    pub fn send_message(&self, message: impl Into<String>) {
        let _ = self.try_send_message(message);
    }

    /// Queue one message, reporting whether it was accepted.
    pub fn try_send_message(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        if message.is_empty() {
            return true;
        }
        match self
            .messages
            .try_push_within(QueuedMessage::Text(message), self.max_queue_length)
        {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::AcqRel);
                true
            }
            Err(_) => {
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    warn!(
                        "GraylogConnection {} queue full; dropped {count} messages",
                        self.target
                    );
                });
                false
            }
        }
    }

    /// Wait up to `timeout` for every message queued so far to be taken by
    /// the I/O thread.
    ///
    /// `true` means the local queue was drained up to this point, not that
    /// the server received the bytes. Barriers do not count towards
    /// `max_queue_length`, and a flush shares the outstanding barrier when
    /// no message has been accepted since it was queued, so repeated flushes
    /// while disconnected do not grow the queue.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.warner.flush(|count| {
            warn!(
                "GraylogConnection {} dropped {count} messages in the last interval",
                self.target
            );
        });
        let released = self.barrier_for_current_messages();
        matches!(
            released.recv_timeout(timeout),
            Ok(()) | Err(RecvTimeoutError::Disconnected)
        )
    }

    fn barrier_for_current_messages(&self) -> Receiver<()> {
        let mut pending = self.pending_barrier.lock();
        let accepted = self.accepted.load(Ordering::Acquire);
        if let Some(barrier) = pending.as_ref()
            && barrier.accepted_at == accepted
        {
            return barrier.released.clone();
        }
        let (release_tx, released) = bounded(1);
        let messages = self.messages.clone();
        self.executor
            .submit(move || messages.push_uncounted(QueuedMessage::Barrier(release_tx)));
        *pending = Some(PendingBarrier {
            released: released.clone(),
            accepted_at: accepted,
        });
        released
    }

    /// Best-effort snapshot of the state machine, for diagnostics only.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Approximate number of queued messages.
    pub fn queue_size(&self) -> usize {
        self.messages.approximate_size()
    }

    pub fn queue_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }

    /// Executor that serialises flush requests; exposed so tests can stall it.
    #[cfg(any(test, feature = "test-util"))]
    pub fn executor(&self) -> &SerialExecutor {
        &self.executor
    }
}

impl Drop for GraylogConnection {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the worker from any wait.
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("GraylogConnection {}: I/O thread panicked", self.target);
        }
    }
}

impl std::fmt::Debug for GraylogConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraylogConnection")
            .field("target", &self.target)
            .field("status", &self.connection_status())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}
