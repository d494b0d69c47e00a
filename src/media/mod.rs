//! RTP payload packetization.
//!
//! Converts encoded access units into RTP packets and writes them as
//! interleaved frames on the connection socket:
//!
//! - [`video`]: H.264 (RFC 6184) single-NAL / FU-A and HEVC (RFC 7798)
//!   single-NAL / FU packetization, payload type 96.
//! - [`audio`]: AAC MPEG4-GENERIC AU-header packetization (RFC 3640),
//!   payload type 97.
//! - [`rtp`]: the shared 12-byte header state per (session, track).
//! - [`annexb`]: NAL unit extraction from Annex-B bitstreams.

pub mod annexb;
pub mod audio;
pub mod rtp;
pub mod video;

/// RTP payload type for video (dynamic range, conventional for H.264/HEVC).
pub const VIDEO_PAYLOAD_TYPE: u8 = 96;
/// RTP payload type for AAC audio.
pub const AUDIO_PAYLOAD_TYPE: u8 = 97;

/// Video RTP clock rate (RFC 6184 / RFC 7798: 90 kHz).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Convert a presentation time in microseconds to the 90 kHz video clock.
pub fn video_timestamp(time_us: u64) -> u32 {
    ((time_us / 1000) * 90) as u32
}

/// Convert a presentation time in microseconds to the audio clock domain.
pub fn audio_timestamp(time_us: u64, sample_rate: u32) -> u32 {
    ((time_us * sample_rate as u64) / 1_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_clock_conversion() {
        assert_eq!(video_timestamp(0), 0);
        // 1 second -> 90000 ticks
        assert_eq!(video_timestamp(1_000_000), 90_000);
        // 33.3 ms frame interval truncates to 33 ms -> 2970 ticks
        assert_eq!(video_timestamp(33_300), 2_970);
    }

    #[test]
    fn audio_clock_conversion() {
        assert_eq!(audio_timestamp(1_000_000, 44_100), 44_100);
        assert_eq!(audio_timestamp(500_000, 48_000), 24_000);
        assert_eq!(audio_timestamp(0, 44_100), 0);
    }
}
