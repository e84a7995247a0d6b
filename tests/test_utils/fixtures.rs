//! Fixtures shared by the integration tests: in-memory stream handlers and
//! loopback Graylog servers.

#![allow(dead_code)]

use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use graylog_logger::{ConsoleFormatter, StreamHandler};
use rstest::fixture;

use super::shared_buffer::SharedBuf;

pub const WAIT: Duration = Duration::from_secs(5);

/// Return a handler with a fresh in-memory buffer using the console format.
#[fixture]
pub fn handler_tuple() -> (SharedBuf, StreamHandler) {
    let buffer = SharedBuf::default();
    let handler = StreamHandler::new(buffer.clone(), ConsoleFormatter);
    (buffer, handler)
}

/// Loopback server that reports every NUL-delimited frame it receives.
pub struct FrameServer {
    pub addr: SocketAddr,
    frames: mpsc::Receiver<String>,
}

impl FrameServer {
    /// Wait for the next frame.
    pub fn next_frame(&self) -> String {
        self.frames.recv_timeout(WAIT).expect("frame within timeout")
    }
}

#[fixture]
pub fn frame_server() -> FrameServer {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let (tx, frames) = mpsc::channel();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        while let Ok(n) = stream.read(&mut chunk) {
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&chunk[..n]);
            while let Some(end) = pending.iter().position(|b| *b == 0) {
                let frame: Vec<u8> = pending.drain(..=end).collect();
                let text = String::from_utf8_lossy(&frame[..end]).into_owned();
                if tx.send(text).is_err() {
                    return;
                }
            }
        }
    });
    FrameServer { addr, frames }
}
