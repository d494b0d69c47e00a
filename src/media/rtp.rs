use rand::RngExt;

/// Per-stream RTP header state (RFC 3550 §5.1 subset).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// One instance exists per (session, track) stream. The sequence number
/// starts from a random base and increments by exactly 1 per packet sent
/// (including every fragment), wrapping modulo 65536. The SSRC is chosen
/// randomly per RFC 3550 §8.1 and is fixed for the stream's lifetime.
/// The timestamp is supplied per packet by the caller, already converted
/// to the stream's clock domain (90 kHz for video, sample rate for audio).
///
/// Version is always 2. Padding, extension, and CSRC count are always 0.
#[derive(Debug)]
pub struct RtpStream {
    /// RTP payload type (7-bit, written with the marker bit).
    pub payload_type: u8,
    /// Synchronization source identifier.
    pub ssrc: u32,
    sequence: u16,
}

impl RtpStream {
    /// Create with explicit SSRC and sequence base (tests).
    pub fn new(payload_type: u8, ssrc: u32, sequence: u16) -> Self {
        Self {
            payload_type,
            ssrc,
            sequence,
        }
    }

    /// Create with a random SSRC and a random sequence base.
    pub fn with_random_identity(payload_type: u8) -> Self {
        let mut rng = rand::rng();
        let ssrc = rng.random::<u32>();
        let sequence = rng.random::<u16>();
        tracing::debug!(
            payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            sequence,
            "RTP stream state created"
        );
        Self::new(payload_type, ssrc, sequence)
    }

    /// Sequence number of the next packet.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence number.
    pub fn write_header(&mut self, timestamp: u32, marker: bool) -> [u8; 12] {
        let mut header = [0u8; 12];
        header[0] = 2 << 6;
        header[1] = ((marker as u8) << 7) | self.payload_type;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }
}
