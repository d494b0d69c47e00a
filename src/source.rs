//! File replay source: a [`VideoSource`] that loops an Annex-B
//! elementary stream at a fixed frame rate.
//!
//! Stands in for the hardware encoder during bring-up and integration
//! testing. The file is split into access units at load time; parameter
//! sets found in the stream populate a [`ConfigCache`] so DESCRIBE and
//! the push client work exactly as they do against a live encoder.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::encoder::{
    CallbackId, ConfigCache, EncodedFrame, FrameCallback, FrameFanout, VideoCodec, VideoConfig,
    VideoSource,
};
use crate::error::{Result, StreamError};
use crate::media::annexb;

/// One replayable access unit.
struct FileFrame {
    payload: Vec<u8>,
    keyframe: bool,
}

/// Replays an Annex-B file as a live video source.
pub struct FileSource {
    frames: Arc<Vec<FileFrame>>,
    cache: Arc<ConfigCache>,
    fanout: Arc<FrameFanout>,
    fps: u32,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl FileSource {
    /// Load and index an Annex-B file.
    pub fn open(path: &Path, codec: VideoCodec, fps: u32) -> Result<Self> {
        let data = std::fs::read(path)?;
        let cache = ConfigCache::new(codec);
        cache.absorb_annex_b(&data);

        let frames = split_access_units(&data, codec);
        if frames.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("no access units in {}", path.display()),
            )
            .into());
        }
        tracing::info!(
            path = %path.display(),
            frames = frames.len(),
            fps,
            "file source loaded"
        );

        Ok(Self {
            frames: Arc::new(frames),
            cache: Arc::new(cache),
            fanout: Arc::new(FrameFanout::new()),
            fps: fps.max(1),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// Start the replay loop, wrapping around at end of file.
    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let frames = self.frames.clone();
        let fanout = self.fanout.clone();
        let running = self.running.clone();
        let interval_us = 1_000_000u64 / self.fps as u64;

        self.worker = Some(thread::spawn(move || {
            let mut time_us = 0u64;
            let mut index = 0usize;
            while running.load(Ordering::SeqCst) {
                let frame = &frames[index];
                fanout.dispatch(&Arc::new(EncodedFrame {
                    payload: frame.payload.clone(),
                    time_us,
                    keyframe: frame.keyframe,
                }));

                index = (index + 1) % frames.len();
                time_us += interval_us;
                thread::sleep(Duration::from_micros(interval_us));
            }
        }));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl VideoSource for FileSource {
    fn codec_config(&self) -> Option<VideoConfig> {
        self.cache.get()
    }

    /// No-op: replay delivers keyframes on the file's own cadence.
    fn request_keyframe(&self) {}

    fn add_frame_callback(&self, cb: FrameCallback) -> CallbackId {
        self.fanout.add(cb)
    }

    fn remove_frame_callback(&self, id: CallbackId) {
        self.fanout.remove(id)
    }
}

/// Group NAL units into access units: each slice NAL closes a frame,
/// carrying any preceding non-slice NALs (parameter sets, SEI) with it.
fn split_access_units(data: &[u8], codec: VideoCodec) -> Vec<FileFrame> {
    let mut frames = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut pending_keyframe = false;

    for nal in annexb::split_nal_units(data) {
        if nal.is_empty() {
            continue;
        }
        let (is_slice, is_idr) = match codec {
            VideoCodec::H264 => {
                let ty = annexb::h264_nal_type(&nal);
                (matches!(ty, 1 | 5), ty == 5)
            }
            VideoCodec::Hevc => {
                let ty = annexb::hevc_nal_type(&nal);
                (ty < 32, (16..=21).contains(&ty))
            }
        };

        pending.extend_from_slice(&[0, 0, 0, 1]);
        pending.extend_from_slice(&nal);
        pending_keyframe |= is_idr;

        if is_slice {
            frames.push(FileFrame {
                payload: std::mem::take(&mut pending),
                keyframe: pending_keyframe,
            });
            pending_keyframe = false;
        }
    }
    frames
}
