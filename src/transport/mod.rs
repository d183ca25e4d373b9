//! Packet transport
//!
//! The session pulls whole packets from a [`PacketSource`]. [`StreamSource`] is the
//! blocking implementation used over an already connected TCP stream.

use crate::protocol::ENVELOPE_HEADER_SIZE;
use std::io::{ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,

    #[error("packet of {declared} bytes exceeds the {capacity} byte receive buffer")]
    Oversized { declared: usize, capacity: usize },

    #[error("receive failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplier of discrete, already framed packets.
pub trait PacketSource {
    /// Block until one whole packet is available and copy it into `buf`.
    ///
    /// Returns the number of bytes written.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Reads one envelope at a time from a blocking byte stream.
pub struct StreamSource<R> {
    reader: R,
    packets: u64,
    bytes: u64,
}

impl StreamSource<TcpStream> {
    /// Connect to a media server.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            log::info!("Connected to media server at {}", peer);
        }
        Ok(Self::new(stream))
    }
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            packets: 0,
            bytes: 0,
        }
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl<R: Read> PacketSource for StreamSource<R> {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.len() < ENVELOPE_HEADER_SIZE {
            return Err(TransportError::Oversized {
                declared: ENVELOPE_HEADER_SIZE,
                capacity: buf.len(),
            });
        }

        let (header, body) = buf.split_at_mut(ENVELOPE_HEADER_SIZE);
        self.reader.read_exact(header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        })?;

        let declared = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if declared > body.len() {
            return Err(TransportError::Oversized {
                declared: ENVELOPE_HEADER_SIZE + declared,
                capacity: ENVELOPE_HEADER_SIZE + body.len(),
            });
        }

        self.reader.read_exact(&mut body[..declared])?;

        let total = ENVELOPE_HEADER_SIZE + declared;
        self.packets += 1;
        self.bytes += total as u64;
        if self.packets == 1 {
            log::info!("First packet received ({} bytes)", total);
        }
        Ok(total)
    }
}
