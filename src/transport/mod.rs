//! Connection transport: interleaved binary framing over the RTSP TCP
//! socket (RFC 2326 §10.12).
//!
//! RTP packets share the TCP connection with RTSP control text, wrapped
//! in a 4-byte envelope:
//!
//! ```text
//! 0x24 | channel:u8 | length:u16 (BE) | payload[length]
//! ```
//!
//! A connection's socket is written by its request thread, its video
//! delivery loop, and (when audio is set up) its audio delivery loop, so
//! every write goes through one [`InterleavedSender`] that holds the
//! stream behind a mutex and performs each frame as a single write.

use std::io::Write;
use std::net::TcpStream;

use parking_lot::Mutex;

use crate::error::Result;

/// Interleaved-frame prefix byte (`'$'`).
pub const INTERLEAVED_MAGIC: u8 = 0x24;

/// Serialized writer for one connection's socket.
pub struct InterleavedSender {
    stream: Mutex<TcpStream>,
}

impl InterleavedSender {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }

    /// Write one RTP packet as an interleaved binary frame.
    ///
    /// The envelope and payload are assembled into a single buffer and
    /// written under the lock so concurrent video/audio writers never
    /// interleave partial frames.
    pub fn send_frame(&self, channel: u8, payload: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(4 + payload.len());
        buf.push(INTERLEAVED_MAGIC);
        buf.push(channel);
        buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(payload);

        let mut stream = self.stream.lock();
        stream.write_all(&buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Write RTSP control text (responses on the server, requests on the
    /// push client) through the same serialization point.
    pub fn send_text(&self, text: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock();
        stream.write_all(text)?;
        stream.flush()?;
        Ok(())
    }

    /// Shut down both directions, unblocking any reader on the socket.
    pub fn shutdown(&self) {
        let _ = self.stream.lock().shutdown(std::net::Shutdown::Both);
    }
}

/// Encode the interleaved envelope for a payload (without writing it).
pub fn frame_envelope(channel: u8, payload_len: usize) -> [u8; 4] {
    let len = payload_len as u16;
    [
        INTERLEAVED_MAGIC,
        channel,
        (len >> 8) as u8,
        (len & 0xff) as u8,
    ]
}
