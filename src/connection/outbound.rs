//! Bytes accepted from the queue but not yet written to the socket.

use std::io::{self, Write};

/// Byte appended after every message; the server splits the stream on it.
pub const FRAME_DELIMITER: u8 = 0;

#[derive(Debug, Default)]
pub struct OutboundBuffer {
    bytes: Vec<u8>,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message followed by the frame delimiter.
    pub fn push_message(&mut self, message: &str) {
        self.bytes.reserve(message.len() + 1);
        self.bytes.extend_from_slice(message.as_bytes());
        self.bytes.push(FRAME_DELIMITER);
    }

    /// Issue one write of the pending bytes and drop what the writer accepted.
    ///
    /// Returns the number of bytes written. Bytes not accepted stay at the
    /// front of the buffer verbatim. `WouldBlock` and `Interrupted` are
    /// reported as zero progress; a writer accepting zero bytes is an error.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        if self.bytes.is_empty() {
            return Ok(0);
        }
        match writer.write(&self.bytes) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "socket accepted no bytes",
            )),
            Ok(written) => {
                self.bytes.drain(..written);
                Ok(written)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the buffer has grown past `limit` bytes.
    pub fn exceeds(&self, limit: usize) -> bool {
        self.bytes.len() > limit
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Discard everything; used when the connection is lost mid-stream.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
