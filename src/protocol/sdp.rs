//! SDP generation (RFC 4566) for DESCRIBE responses and ANNOUNCE bodies.
//!
//! ```text
//! v=0                                     ← protocol version
//! o=- 0 0 IN IP4 <host>                   ← origin
//! s=<session-name>                        ← session name
//! c=IN IP4 0.0.0.0                        ← connection address
//! t=0 0                                   ← timing (live stream)
//! m=video 0 RTP/AVP 96                    ← video media block
//! a=control:trackID=0
//! a=rtpmap:96 H264/90000
//! a=fmtp:96 packetization-mode=1;...
//! m=audio 0 RTP/AVP 97                    ← only when audio configured
//! a=rtpmap:97 MPEG4-GENERIC/44100/1
//! a=fmtp:97 streamtype=5;...
//! a=control:trackID=1
//! ```
//!
//! Missing parameter sets degrade to empty `sprop-*` values — a client
//! joining before the encoder warms up still gets a parseable SDP, and
//! the parameter sets travel in-band once streaming starts.

use base64::prelude::{Engine as _, BASE64_STANDARD};

use crate::encoder::{AudioConfig, VideoCodec, VideoConfig};
use crate::media::{AUDIO_PAYLOAD_TYPE, VIDEO_CLOCK_RATE, VIDEO_PAYLOAD_TYPE};

/// profile-level-id used when no SPS is available (Baseline 3.0).
const DEFAULT_PROFILE_LEVEL_ID: &str = "42e01e";

/// Render a session description for the given codec configuration.
pub fn build_sdp(
    codec: VideoCodec,
    video: Option<&VideoConfig>,
    audio: Option<&AudioConfig>,
    origin_host: &str,
    session_name: &str,
) -> String {
    let mut sdp: Vec<String> = Vec::new();

    sdp.push("v=0".to_string());
    sdp.push(format!("o=- 0 0 IN IP4 {origin_host}"));
    sdp.push(format!("s={session_name}"));
    sdp.push("c=IN IP4 0.0.0.0".to_string());
    sdp.push("t=0 0".to_string());

    sdp.push(format!("m=video 0 RTP/AVP {VIDEO_PAYLOAD_TYPE}"));
    sdp.push("a=control:trackID=0".to_string());
    sdp.push(format!(
        "a=rtpmap:{VIDEO_PAYLOAD_TYPE} {}/{VIDEO_CLOCK_RATE}",
        codec.sdp_name()
    ));
    sdp.push(match codec {
        VideoCodec::H264 => h264_fmtp(video),
        VideoCodec::Hevc => hevc_fmtp(video),
    });

    if let Some(audio) = audio {
        let config_b64 = BASE64_STANDARD.encode(&audio.audio_specific_config);
        sdp.push(format!("m=audio 0 RTP/AVP {AUDIO_PAYLOAD_TYPE}"));
        sdp.push(format!(
            "a=rtpmap:{AUDIO_PAYLOAD_TYPE} MPEG4-GENERIC/{}/{}",
            audio.sample_rate, audio.channel_count
        ));
        sdp.push(format!(
            "a=fmtp:{AUDIO_PAYLOAD_TYPE} streamtype=5;profile-level-id=1;mode=AAC-hbr;\
             config={config_b64};SizeLength=13;IndexLength=3;IndexDeltaLength=3"
        ));
        sdp.push("a=control:trackID=1".to_string());
    }

    format!("{}\r\n", sdp.join("\r\n"))
}

/// H.264 fmtp line (RFC 6184 §8.1): profile-level-id from SPS bytes 1–3.
fn h264_fmtp(video: Option<&VideoConfig>) -> String {
    let profile_level_id = video
        .map(|cfg| &cfg.sps)
        .filter(|sps| sps.len() >= 4)
        .map(|sps| format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
        .unwrap_or_else(|| DEFAULT_PROFILE_LEVEL_ID.to_string());

    let (sps_b64, pps_b64) = match video {
        Some(cfg) => (
            BASE64_STANDARD.encode(&cfg.sps),
            BASE64_STANDARD.encode(&cfg.pps),
        ),
        None => (String::new(), String::new()),
    };

    format!(
        "a=fmtp:{VIDEO_PAYLOAD_TYPE} packetization-mode=1;\
         profile-level-id={profile_level_id};sprop-parameter-sets={sps_b64},{pps_b64}"
    )
}

/// HEVC fmtp line (RFC 7798 §7.1): sprop-vps / sprop-sps / sprop-pps.
fn hevc_fmtp(video: Option<&VideoConfig>) -> String {
    let vps_b64 = video
        .and_then(|cfg| cfg.vps.as_deref())
        .map(|vps| BASE64_STANDARD.encode(vps))
        .unwrap_or_default();
    let (sps_b64, pps_b64) = match video {
        Some(cfg) => (
            BASE64_STANDARD.encode(&cfg.sps),
            BASE64_STANDARD.encode(&cfg.pps),
        ),
        None => (String::new(), String::new()),
    };

    format!(
        "a=fmtp:{VIDEO_PAYLOAD_TYPE} sprop-vps={vps_b64}; sprop-sps={sps_b64}; sprop-pps={pps_b64}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h264_config() -> VideoConfig {
        VideoConfig {
            vps: None,
            sps: vec![0x67, 0x42, 0x00, 0x1e, 0x9a],
            pps: vec![0x68, 0xce, 0x38, 0x80],
        }
    }

    #[test]
    fn profile_level_id_from_sps_bytes() {
        let cfg = h264_config();
        let sdp = build_sdp(VideoCodec::H264, Some(&cfg), None, "0.0.0.0", "cam");
        assert!(sdp.contains("profile-level-id=42001e"));
    }

    #[test]
    fn h264_sprop_parameter_sets_base64() {
        let cfg = h264_config();
        let sdp = build_sdp(VideoCodec::H264, Some(&cfg), None, "0.0.0.0", "cam");
        let expected = format!(
            "sprop-parameter-sets={},{}",
            BASE64_STANDARD.encode(&cfg.sps),
            BASE64_STANDARD.encode(&cfg.pps)
        );
        assert!(sdp.contains(&expected));
    }

    #[test]
    fn missing_config_degrades_to_defaults() {
        let sdp = build_sdp(VideoCodec::H264, None, None, "0.0.0.0", "cam");
        assert!(sdp.contains("profile-level-id=42e01e"));
        assert!(sdp.contains("sprop-parameter-sets=,"));
        assert!(sdp.contains("m=video 0 RTP/AVP 96"));
    }

    #[test]
    fn session_level_lines_present_and_ordered() {
        let sdp = build_sdp(VideoCodec::H264, None, None, "192.168.1.10", "QNVR");
        assert!(sdp.starts_with("v=0\r\n"));
        assert!(sdp.contains("o=- 0 0 IN IP4 192.168.1.10\r\n"));
        assert!(sdp.contains("s=QNVR\r\n"));
        assert!(sdp.contains("c=IN IP4 0.0.0.0\r\n"));
        assert!(sdp.contains("t=0 0\r\n"));

        let rtpmap_idx = sdp.find("a=rtpmap:96").unwrap();
        let fmtp_idx = sdp.find("a=fmtp:96").unwrap();
        let m_idx = sdp.find("m=video").unwrap();
        assert!(m_idx < rtpmap_idx && rtpmap_idx < fmtp_idx);
        assert!(sdp.ends_with("\r\n"));
    }

    #[test]
    fn hevc_sprop_lines() {
        let cfg = VideoConfig {
            vps: Some(vec![0x40, 0x01, 0x0c]),
            sps: vec![0x42, 0x01, 0x01],
            pps: vec![0x44, 0x01, 0xc0],
        };
        let sdp = build_sdp(VideoCodec::Hevc, Some(&cfg), None, "0.0.0.0", "cam");
        assert!(sdp.contains("a=rtpmap:96 H265/90000"));
        assert!(sdp.contains(&format!(
            "sprop-vps={}",
            BASE64_STANDARD.encode(cfg.vps.as_deref().unwrap())
        )));
        assert!(sdp.contains(&format!("sprop-sps={}", BASE64_STANDARD.encode(&cfg.sps))));
        assert!(sdp.contains(&format!("sprop-pps={}", BASE64_STANDARD.encode(&cfg.pps))));
    }

    #[test]
    fn audio_block_when_configured() {
        let audio = AudioConfig {
            sample_rate: 44_100,
            channel_count: 1,
            audio_specific_config: vec![0x12, 0x08],
        };
        let sdp = build_sdp(
            VideoCodec::H264,
            Some(&h264_config()),
            Some(&audio),
            "0.0.0.0",
            "cam",
        );
        assert!(sdp.contains("m=audio 0 RTP/AVP 97"));
        assert!(sdp.contains("a=rtpmap:97 MPEG4-GENERIC/44100/1"));
        assert!(sdp.contains("mode=AAC-hbr"));
        assert!(sdp.contains(&format!("config={}", BASE64_STANDARD.encode([0x12, 0x08]))));
        assert!(sdp.contains("SizeLength=13;IndexLength=3;IndexDeltaLength=3"));
        assert!(sdp.contains("a=control:trackID=1"));
    }

    #[test]
    fn no_audio_block_without_config() {
        let sdp = build_sdp(VideoCodec::H264, None, None, "0.0.0.0", "cam");
        assert!(!sdp.contains("m=audio"));
    }
}
