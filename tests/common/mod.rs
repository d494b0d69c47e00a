//! Shared test fixtures: fake encoder sources and an RTSP client helper.
#![allow(dead_code)]

use std::io::{BufRead, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use camstream::encoder::{
    AudioConfig, AudioSource, CallbackId, EncodedFrame, FrameCallback, FrameFanout, VideoConfig,
    VideoSource,
};

pub const TEST_SPS: &[u8] = &[0x67, 0x42, 0x00, 0x1e, 0x9a];
pub const TEST_PPS: &[u8] = &[0x68, 0xce, 0x38, 0x80];

/// Fake video encoder with fixed parameter sets.
pub struct FakeVideo {
    fanout: FrameFanout,
}

impl FakeVideo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fanout: FrameFanout::new(),
        })
    }

    /// Emit an Annex-B access unit to every subscriber.
    pub fn emit(&self, payload: &[u8], time_us: u64, keyframe: bool) {
        self.fanout.dispatch(&Arc::new(EncodedFrame {
            payload: payload.to_vec(),
            time_us,
            keyframe,
        }));
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.len()
    }
}

impl VideoSource for FakeVideo {
    fn codec_config(&self) -> Option<VideoConfig> {
        Some(VideoConfig {
            vps: None,
            sps: TEST_SPS.to_vec(),
            pps: TEST_PPS.to_vec(),
        })
    }

    fn request_keyframe(&self) {}

    fn add_frame_callback(&self, cb: FrameCallback) -> CallbackId {
        self.fanout.add(cb)
    }

    fn remove_frame_callback(&self, id: CallbackId) {
        self.fanout.remove(id)
    }
}

/// Fake AAC encoder at 44.1 kHz mono.
pub struct FakeAudio {
    fanout: FrameFanout,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fanout: FrameFanout::new(),
        })
    }

    pub fn emit(&self, payload: &[u8], time_us: u64) {
        self.fanout.dispatch(&Arc::new(EncodedFrame {
            payload: payload.to_vec(),
            time_us,
            keyframe: false,
        }));
    }
}

impl AudioSource for FakeAudio {
    fn audio_config(&self) -> Option<AudioConfig> {
        Some(AudioConfig {
            sample_rate: 44_100,
            channel_count: 1,
            audio_specific_config: vec![0x12, 0x08],
        })
    }

    fn add_frame_callback(&self, cb: FrameCallback) -> CallbackId {
        self.fanout.add(cb)
    }

    fn remove_frame_callback(&self, id: CallbackId) {
        self.fanout.remove(id)
    }
}

/// Send one RTSP request and read the response (headers plus body when
/// `Content-Length` is present).
///
/// The reader must persist across calls on one connection; a throwaway
/// `BufReader` would swallow interleaved data following a response.
pub fn rtsp_request<R: BufRead>(
    stream: &mut TcpStream,
    reader: &mut R,
    request: &str,
) -> std::io::Result<String> {
    stream.write_all(request.as_bytes())?;
    stream.flush()?;
    read_rtsp_message(reader)
}

/// Read one CRLF-terminated RTSP message from the reader.
pub fn read_rtsp_message<R: BufRead>(reader: &mut R) -> std::io::Result<String> {
    let mut message = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        message.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    if let Some(len) = message
        .lines()
        .find(|l| l.to_lowercase().starts_with("content-length:"))
        .and_then(|l| l.split(':').nth(1))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        if len > 0 {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body)?;
            message.push_str(&String::from_utf8_lossy(&body));
        }
    }

    Ok(message)
}

/// Read one interleaved binary frame (`$ channel len payload`) and
/// return `(channel, payload)`.
pub fn read_interleaved_frame<R: Read>(reader: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let mut envelope = [0u8; 4];
    reader.read_exact(&mut envelope)?;
    assert_eq!(envelope[0], 0x24, "interleaved frame magic");
    let len = u16::from_be_bytes([envelope[2], envelope[3]]) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok((envelope[1], payload))
}
