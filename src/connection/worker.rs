//! I/O thread driving the connection state machine.
//!
//! The worker exclusively owns the socket, the outbound buffer, and the
//! reconnect deadline. Other threads reach it only through the message queue,
//! the shutdown channel, and the status snapshot.
//!
//! Transitions:
//!
//! ```text
//! AddressLookup --resolved--> Connecting --connected--> SendLoop
//!       ^    \--failed--> AddressRetryWait (long)           |
//!       |                        ^    ^                      |
//!       +------timer fires-------+    +--exhausted (long)    |
//!                                     +--socket error (short)+
//! ```

use std::{
    io::{self, Read},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::debug;

use crate::queue::MessageQueue;

use super::{
    config::ConnectionConfig,
    endpoint::EndpointCandidates,
    outbound::OutboundBuffer,
    status::{ConnectionStatus, SharedStatus},
};

/// Unit of work handed from producers to the I/O thread.
#[derive(Debug)]
pub enum QueuedMessage {
    /// Text to transmit, framed with a trailing NUL.
    Text(String),
    /// Released once every message queued before it has been taken.
    /// Dropping the sender wakes every flush waiting on it.
    Barrier(Sender<()>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryDelay {
    /// After lookup failure or endpoint exhaustion.
    Long,
    /// After an established connection failed.
    Short,
}

enum State {
    AddressLookup,
    AddressRetryWait(Instant),
    Connecting(EndpointCandidates),
    SendLoop(TcpStream),
}

impl State {
    fn status(&self) -> ConnectionStatus {
        match self {
            State::AddressLookup => ConnectionStatus::AddressLookup,
            State::AddressRetryWait(_) => ConnectionStatus::AddressRetryWait,
            State::Connecting(_) => ConnectionStatus::Connecting,
            State::SendLoop(_) => ConnectionStatus::SendLoop,
        }
    }
}

pub(super) struct ConnectionWorker {
    config: ConnectionConfig,
    messages: MessageQueue<QueuedMessage>,
    status: Arc<SharedStatus>,
    shutdown: Receiver<()>,
    buffer: OutboundBuffer,
}

pub(super) fn spawn_worker(
    config: ConnectionConfig,
    messages: MessageQueue<QueuedMessage>,
    status: Arc<SharedStatus>,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    let worker = ConnectionWorker {
        config,
        messages,
        status,
        shutdown,
        buffer: OutboundBuffer::new(),
    };
    thread::Builder::new()
        .name("graylog-connection".into())
        .spawn(move || worker.run())
        .expect("failed to spawn graylog connection thread")
}

impl ConnectionWorker {
    fn run(mut self) {
        let mut state = State::AddressLookup;
        let mut reported = self.status.get();
        loop {
            let current = state.status();
            if current != reported {
                debug!(
                    "Graylog connection {}:{}: {reported} -> {current}",
                    self.config.host, self.config.port
                );
                self.status.set(current);
                reported = current;
            }
            if self.shutdown_requested() {
                break;
            }
            state = match state {
                State::AddressLookup => self.lookup(),
                State::AddressRetryWait(deadline) => self.wait_for_retry(deadline),
                State::Connecting(candidates) => self.connect(candidates),
                State::SendLoop(stream) => self.send_step(stream),
            };
        }
        if let State::SendLoop(stream) = state {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep up to `duration`, waking early on shutdown.
    fn idle(&self, duration: Duration) {
        let _ = self.shutdown.recv_timeout(duration);
    }

    fn lookup(&mut self) -> State {
        match self
            .config
            .resolver
            .resolve(&self.config.host, self.config.port)
        {
            Ok(endpoints) if !endpoints.is_empty() => {
                State::Connecting(EndpointCandidates::new(endpoints))
            }
            Ok(_) => {
                debug!("Graylog host {} resolved to no addresses", self.config.host);
                self.retry(RetryDelay::Long)
            }
            Err(err) => {
                debug!("Graylog host {} failed to resolve: {err}", self.config.host);
                self.retry(RetryDelay::Long)
            }
        }
    }

    fn wait_for_retry(&self, deadline: Instant) -> State {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.shutdown.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => State::AddressLookup,
            // Shutdown; the run loop notices on its next check.
            _ => State::AddressRetryWait(deadline),
        }
    }

    fn connect(&mut self, mut candidates: EndpointCandidates) -> State {
        let Some(endpoint) = candidates.next_endpoint() else {
            return self.retry(RetryDelay::Long);
        };
        match open_stream(endpoint, self.config.connect_timeout) {
            Ok(stream) => {
                debug!("Graylog connection established to {endpoint}");
                State::SendLoop(stream)
            }
            Err(err) => {
                debug!("Graylog connect to {endpoint} failed: {err}");
                if candidates.is_exhausted() {
                    self.retry(RetryDelay::Long)
                } else {
                    State::Connecting(candidates)
                }
            }
        }
    }

    /// One pass of the send loop: detect peer close, then move at most one
    /// queued item into the buffer and write.
    fn send_step(&mut self, mut stream: TcpStream) -> State {
        if let Err(err) = detect_peer_close(&mut stream) {
            return self.drop_stream(stream, err);
        }
        if !self.buffer.exceeds(self.config.high_water_mark) {
            match self.messages.pop_with_timeout(self.config.poll_interval) {
                Some(QueuedMessage::Text(text)) if !text.is_empty() => {
                    self.buffer.push_message(&text);
                }
                Some(QueuedMessage::Barrier(done)) => drop(done),
                Some(QueuedMessage::Text(_)) | None => {}
            }
        }
        self.write_pending(stream)
    }

    fn write_pending(&mut self, mut stream: TcpStream) -> State {
        match self.buffer.write_to(&mut stream) {
            Ok(0) if !self.buffer.is_empty() => {
                // Socket send buffer is full; back off instead of spinning.
                self.idle(self.config.poll_interval);
                State::SendLoop(stream)
            }
            Ok(_) => State::SendLoop(stream),
            Err(err) => self.drop_stream(stream, err),
        }
    }

    fn drop_stream(&mut self, stream: TcpStream, err: io::Error) -> State {
        debug!(
            "Graylog connection {}:{} lost: {err}; discarding {} buffered bytes",
            self.config.host,
            self.config.port,
            self.buffer.len()
        );
        let _ = stream.shutdown(Shutdown::Both);
        drop(stream);
        self.buffer.clear();
        self.retry(RetryDelay::Short)
    }

    fn retry(&self, delay: RetryDelay) -> State {
        let delay = match delay {
            RetryDelay::Long => self.config.long_retry_delay,
            RetryDelay::Short => self.config.short_retry_delay,
        };
        State::AddressRetryWait(Instant::now() + delay)
    }
}

fn open_stream(endpoint: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&endpoint, timeout)?;
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;
    Ok(stream)
}

/// Poll the socket for a remote close. The server never sends application
/// data, so anything read is discarded.
fn detect_peer_close(stream: &mut TcpStream) -> io::Result<()> {
    let mut scratch = [0u8; 64];
    match stream.read(&mut scratch) {
        Ok(0) => Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "server closed the connection",
        )),
        Ok(_) => Ok(()),
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(())
        }
        Err(err) => Err(err),
    }
}
