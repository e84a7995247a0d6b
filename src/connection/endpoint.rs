//! Address resolution and endpoint ordering.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
};

/// Resolves a host/port pair into candidate socket addresses.
///
/// Implementations run on the connection's I/O thread.
pub trait Resolve: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        (host, port).to_socket_addrs().map(Iterator::collect)
    }
}

impl<F> Resolve for F
where
    F: Fn(&str, u16) -> io::Result<Vec<SocketAddr>> + Send + Sync,
{
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        self(host, port)
    }
}

/// Resolved endpoints for one resolution pass, consumed front to back.
///
/// IPv4 addresses come before IPv6 addresses; resolver order is kept within
/// each family. Every candidate is handed out at most once.
#[derive(Clone, Debug, Default)]
pub struct EndpointCandidates {
    endpoints: Vec<SocketAddr>,
    next: usize,
}

impl EndpointCandidates {
    pub fn new(mut endpoints: Vec<SocketAddr>) -> Self {
        // `sort_by_key` is stable.
        endpoints.sort_by_key(SocketAddr::is_ipv6);
        Self { endpoints, next: 0 }
    }

    /// Take the next untried endpoint.
    pub fn next_endpoint(&mut self) -> Option<SocketAddr> {
        let endpoint = self.endpoints.get(self.next).copied()?;
        self.next += 1;
        Some(endpoint)
    }

    /// Whether every candidate has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.endpoints.len()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
