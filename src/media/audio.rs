use super::rtp::RtpStream;
use super::AUDIO_PAYLOAD_TYPE;
use crate::error::Result;
use crate::transport::InterleavedSender;

/// AAC RTP packetizer using the MPEG4-GENERIC AU-header convention
/// (RFC 3640, AAC-hbr mode).
///
/// One AAC access unit maps to one RTP packet — AAC frames are small, so
/// no fragmentation is implemented. The payload starts with a 4-byte
/// AU-header section:
///
/// ```text
/// AU-headers-length (16 bits) = 16
/// AU-header         (16 bits) = frame_size << 3   (SizeLength=13, IndexLength=3)
/// ```
///
/// followed by the raw AAC frame. Packets carry payload type 97 with the
/// marker bit set, matching the single-AU-per-packet convention.
pub struct AudioPacketizer {
    stream: RtpStream,
}

impl AudioPacketizer {
    /// Create with a fresh random SSRC and sequence base.
    pub fn new() -> Self {
        Self::with_stream(RtpStream::with_random_identity(AUDIO_PAYLOAD_TYPE))
    }

    /// Create over explicit RTP stream state (tests).
    pub fn with_stream(stream: RtpStream) -> Self {
        Self { stream }
    }

    pub fn sequence(&self) -> u16 {
        self.stream.sequence()
    }

    /// Packetize one AAC access unit into a complete RTP packet.
    pub fn packetize_frame(&mut self, aac: &[u8], timestamp: u32) -> Vec<u8> {
        let au_headers_length: u16 = 16;
        let au_header: u16 = (aac.len() as u16) << 3;

        let hdr = self.stream.write_header(timestamp, true);
        let mut packet = Vec::with_capacity(12 + 4 + aac.len());
        packet.extend_from_slice(&hdr);
        packet.extend_from_slice(&au_headers_length.to_be_bytes());
        packet.extend_from_slice(&au_header.to_be_bytes());
        packet.extend_from_slice(aac);
        packet
    }

    /// Packetize and write one AAC access unit on the given channel.
    pub fn send_frame(
        &mut self,
        sender: &InterleavedSender,
        channel: u8,
        aac: &[u8],
        timestamp: u32,
    ) -> Result<()> {
        let packet = self.packetize_frame(aac, timestamp);
        sender.send_frame(channel, &packet)
    }
}

impl Default for AudioPacketizer {
    fn default() -> Self {
        Self::new()
    }
}
