use super::rtp::RtpStream;
use super::VIDEO_PAYLOAD_TYPE;
use crate::encoder::VideoCodec;
use crate::error::Result;
use crate::transport::InterleavedSender;

/// Largest RTP payload written into one interleaved frame. NALs above
/// this are fragmented.
pub const MAX_RTP_PAYLOAD: usize = 1400;

/// Video RTP packetizer for H.264 (RFC 6184) and HEVC (RFC 7798).
///
/// One instance per (session, video track), owning that stream's
/// [`RtpStream`] state. NALs at or below the payload budget are sent as
/// Single NAL Unit packets; larger ones are fragmented:
///
/// - **H.264 FU-A** (RFC 6184 §5.8): a 1-byte FU indicator carrying the
///   original NRI bits with type 28, then a 1-byte FU header with
///   `S`/`E` flags and the original 5-bit NAL type.
///
/// - **HEVC FU** (RFC 7798 §4.4.3): a 2-byte PayloadHdr with type 49
///   carrying the original layer-id and temporal-id, then a 1-byte FU
///   header with `S`/`E` flags and the original 6-bit NAL type.
///
/// The marker bit is never set on video packets. Each RTP packet is
/// delivered through the connection's [`InterleavedSender`] on the
/// channel negotiated at SETUP.
pub struct VideoPacketizer {
    stream: RtpStream,
    codec: VideoCodec,
    mtu: usize,
}

impl VideoPacketizer {
    /// Create with a fresh random SSRC and sequence base.
    pub fn new(codec: VideoCodec) -> Self {
        Self::with_stream(codec, RtpStream::with_random_identity(VIDEO_PAYLOAD_TYPE))
    }

    /// Create over explicit RTP stream state (tests).
    pub fn with_stream(codec: VideoCodec, stream: RtpStream) -> Self {
        Self {
            stream,
            codec,
            mtu: MAX_RTP_PAYLOAD,
        }
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Next sequence number (exposed for tests).
    pub fn sequence(&self) -> u16 {
        self.stream.sequence()
    }

    /// Packetize one NAL unit into complete RTP packets.
    pub fn packetize_nal(&mut self, nal: &[u8], timestamp: u32) -> Vec<Vec<u8>> {
        if nal.is_empty() {
            return Vec::new();
        }
        if nal.len() <= self.mtu {
            let hdr = self.stream.write_header(timestamp, false);
            let mut packet = Vec::with_capacity(12 + nal.len());
            packet.extend_from_slice(&hdr);
            packet.extend_from_slice(nal);
            return vec![packet];
        }
        match self.codec {
            VideoCodec::H264 => self.fragment_h264(nal, timestamp),
            VideoCodec::Hevc => self.fragment_hevc(nal, timestamp),
        }
    }

    /// Packetize and write one NAL unit on the given interleaved channel.
    pub fn send_nal(
        &mut self,
        sender: &InterleavedSender,
        channel: u8,
        nal: &[u8],
        timestamp: u32,
    ) -> Result<()> {
        for packet in self.packetize_nal(nal, timestamp) {
            sender.send_frame(channel, &packet)?;
        }
        Ok(())
    }

    /// FU-A fragmentation (RFC 6184 §5.8).
    fn fragment_h264(&mut self, nal: &[u8], timestamp: u32) -> Vec<Vec<u8>> {
        let nal_header = nal[0];
        let nal_type = nal_header & 0x1f;
        let fu_indicator = (nal_header & 0xe0) | 28;

        let payload = &nal[1..];
        let max_fragment = self.mtu - 2;
        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut first = true;

        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let chunk_size = remaining.min(max_fragment);
            let last = offset + chunk_size >= payload.len();

            let start_bit = if first { 0x80 } else { 0x00 };
            let end_bit = if last { 0x40 } else { 0x00 };
            let fu_header = start_bit | end_bit | nal_type;

            let hdr = self.stream.write_header(timestamp, false);
            let mut packet = Vec::with_capacity(12 + 2 + chunk_size);
            packet.extend_from_slice(&hdr);
            packet.push(fu_indicator);
            packet.push(fu_header);
            packet.extend_from_slice(&payload[offset..offset + chunk_size]);
            packets.push(packet);

            offset += chunk_size;
            first = false;
        }

        tracing::trace!(
            nal_type,
            nal_size = nal.len(),
            fragments = packets.len(),
            "FU-A fragmented NAL unit"
        );
        packets
    }

    /// HEVC FU fragmentation (RFC 7798 §4.4.3).
    ///
    /// The original 2-byte NAL header is replaced by a PayloadHdr with
    /// type 49 that keeps the layer-id and temporal-id; the original
    /// 6-bit type moves into the FU header.
    fn fragment_hevc(&mut self, nal: &[u8], timestamp: u32) -> Vec<Vec<u8>> {
        let nal_type = (nal[0] >> 1) & 0x3f;
        let layer_id = ((nal[0] & 0x01) << 5) | ((nal[1] >> 3) & 0x1f);
        let tid = nal[1] & 0x07;

        let payload_hdr = [(49u8 << 1) | (layer_id >> 5), ((layer_id & 0x1f) << 3) | tid];

        let payload = &nal[2..];
        let max_fragment = self.mtu - 3;
        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut first = true;

        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let chunk_size = remaining.min(max_fragment);
            let last = offset + chunk_size >= payload.len();

            let start_bit = if first { 0x80 } else { 0x00 };
            let end_bit = if last { 0x40 } else { 0x00 };
            let fu_header = start_bit | end_bit | nal_type;

            let hdr = self.stream.write_header(timestamp, false);
            let mut packet = Vec::with_capacity(12 + 3 + chunk_size);
            packet.extend_from_slice(&hdr);
            packet.extend_from_slice(&payload_hdr);
            packet.push(fu_header);
            packet.extend_from_slice(&payload[offset..offset + chunk_size]);
            packets.push(packet);

            offset += chunk_size;
            first = false;
        }

        tracing::trace!(
            nal_type,
            nal_size = nal.len(),
            fragments = packets.len(),
            "HEVC FU fragmented NAL unit"
        );
        packets
    }
}
