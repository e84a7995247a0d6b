//! Configuration consumed by [`GraylogConnection`](super::GraylogConnection).
//!
//! `GraylogHandlerBuilder` validates user input before producing these
//! values; constructing a `ConnectionConfig` directly skips validation.

use std::{fmt, sync::Arc, time::Duration};

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

use super::endpoint::{Resolve, SystemResolver};

/// Default Graylog GELF TCP input port.
pub const DEFAULT_PORT: u16 = 12201;
/// Default number of messages held while the server is unreachable.
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 100;
/// Delay before retrying after resolution failure or endpoint exhaustion.
pub const DEFAULT_LONG_RETRY_DELAY: Duration = Duration::from_secs(10);
/// Delay before reconnecting after an established connection failed.
pub const DEFAULT_SHORT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Longest time the I/O thread waits on the message queue per iteration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Buffered bytes above which output is written without waiting for more messages.
pub const DEFAULT_HIGH_WATER_MARK: usize = 3000;
/// Upper bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters for one Graylog server.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub max_queue_length: usize,
    pub long_retry_delay: Duration,
    pub short_retry_delay: Duration,
    pub poll_interval: Duration,
    pub high_water_mark: usize,
    pub connect_timeout: Duration,
    pub warn_interval: Duration,
    pub resolver: Arc<dyn Resolve>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            long_retry_delay: DEFAULT_LONG_RETRY_DELAY,
            short_retry_delay: DEFAULT_SHORT_RETRY_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
            resolver: Arc::new(SystemResolver),
        }
    }
}

impl ConnectionConfig {
    /// Target `host:port` with default tuning.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_max_queue_length(mut self, max_queue_length: usize) -> Self {
        self.max_queue_length = max_queue_length;
        self
    }

    /// Override both reconnect delays.
    pub fn with_retry_delays(mut self, long: Duration, short: Duration) -> Self {
        self.long_retry_delay = long;
        self.short_retry_delay = short;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }

    /// Replace the address resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_queue_length", &self.max_queue_length)
            .field("long_retry_delay", &self.long_retry_delay)
            .field("short_retry_delay", &self.short_retry_delay)
            .field("poll_interval", &self.poll_interval)
            .field("high_water_mark", &self.high_water_mark)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
