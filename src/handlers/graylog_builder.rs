//! Builder for [`GraylogHandler`](crate::graylog_handler::GraylogHandler).
//!
//! Exposes the server address, queue capacity, reconnect timings, and the
//! warning interval. Unset options fall back to the `DEFAULT_*` constants in
//! [`crate::connection`].

use std::{sync::Arc, time::Duration};

use crate::{
    connection::{ConnectionConfig, DEFAULT_PORT, Resolve},
    graylog_handler::GraylogHandler,
    handler::LogHandler,
};

use super::{HandlerBuildError, HandlerBuilderTrait};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HandlerBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`GraylogHandler`] instances.
#[derive(Clone, Default)]
pub struct GraylogHandlerBuilder {
    host: Option<String>,
    port: Option<u16>,
    capacity: Option<usize>,
    long_retry_delay_ms: Option<u64>,
    short_retry_delay_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    resolver: Option<Arc<dyn Resolve>>,
}

impl GraylogHandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Graylog server host name or address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    option_setter!(
        #[doc = "Set the server port. Defaults to 12201."]
        with_port,
        port,
        u16
    );
    option_setter!(
        #[doc = "Set the maximum number of messages waiting for the connection."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_long_retry_delay_ms, long_retry_delay_ms, u64);
    option_setter!(with_short_retry_delay_ms, short_retry_delay_ms, u64);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    /// Replace the system resolver, mainly for tests.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn validate(&self) -> Result<(), HandlerBuildError> {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => {}
            _ => {
                return Err(HandlerBuildError::InvalidConfig(
                    "graylog host must not be empty".into(),
                ));
            }
        }
        if let Some(port) = self.port {
            ensure_positive!(port, "port")?;
        }
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        for (value, field) in [
            (self.long_retry_delay_ms, "long_retry_delay_ms"),
            (self.short_retry_delay_ms, "short_retry_delay_ms"),
            (self.connect_timeout_ms, "connect_timeout_ms"),
            (self.warn_interval_ms, "warn_interval_ms"),
        ] {
            if let Some(ms) = value {
                ensure_positive!(ms, field)?;
            }
        }
        Ok(())
    }

    /// Validate the settings and produce the connection configuration.
    pub fn build_config(&self) -> Result<ConnectionConfig, HandlerBuildError> {
        self.validate()?;
        let host = self.host.clone().unwrap_or_default();
        let mut config = ConnectionConfig::new(host, self.port.unwrap_or(DEFAULT_PORT));
        if let Some(capacity) = self.capacity {
            config = config.with_max_queue_length(capacity);
        }
        let long = self
            .long_retry_delay_ms
            .map_or(config.long_retry_delay, Duration::from_millis);
        let short = self
            .short_retry_delay_ms
            .map_or(config.short_retry_delay, Duration::from_millis);
        config = config.with_retry_delays(long, short);
        if let Some(ms) = self.connect_timeout_ms {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.warn_interval_ms {
            config = config.with_warn_interval(Duration::from_millis(ms));
        }
        if let Some(resolver) = &self.resolver {
            config = config.with_resolver(Arc::clone(resolver));
        }
        Ok(config)
    }

    /// Build the handler, starting its connection thread.
    pub fn build_inner(&self) -> Result<GraylogHandler, HandlerBuildError> {
        self.build_config().map(GraylogHandler::with_config)
    }
}

impl std::fmt::Debug for GraylogHandlerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraylogHandlerBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("capacity", &self.capacity)
            .field("long_retry_delay_ms", &self.long_retry_delay_ms)
            .field("short_retry_delay_ms", &self.short_retry_delay_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("warn_interval_ms", &self.warn_interval_ms)
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl HandlerBuilderTrait for GraylogHandlerBuilder {
    fn build(&self) -> Result<Box<dyn LogHandler>, HandlerBuildError> {
        Ok(Box::new(self.build_inner()?))
    }
}
