//! Connection state snapshot shared with other threads for diagnostics.

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// States of the connection state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Resolving the configured host and port.
    AddressLookup = 0,
    /// Waiting for the reconnect timer to fire.
    AddressRetryWait = 1,
    /// Attempting to connect to a resolved endpoint.
    Connecting = 2,
    /// Connected and draining the message queue onto the socket.
    SendLoop = 3,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::AddressRetryWait,
            2 => Self::Connecting,
            3 => Self::SendLoop,
            _ => Self::AddressLookup,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AddressLookup => "address lookup",
            Self::AddressRetryWait => "address retry wait",
            Self::Connecting => "connecting",
            Self::SendLoop => "send loop",
        };
        f.write_str(s)
    }
}

/// Atomic cell written by the I/O thread and read by anyone.
#[derive(Debug)]
pub(crate) struct SharedStatus(AtomicU8);

impl SharedStatus {
    pub(crate) fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn get(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}
