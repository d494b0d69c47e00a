//! Encoder collaborator interface.
//!
//! The engine does not operate camera hardware or codecs itself. It
//! consumes already-encoded access units from collaborators implementing
//! [`VideoSource`] / [`AudioSource`]: the hardware encoder (or a file
//! replay source, see [`crate::source`]) produces [`EncodedFrame`]s and
//! delivers them to every registered callback.
//!
//! Frame callbacks are registered and removed while frames are being
//! emitted, so [`FrameFanout`] snapshots the callback list on every
//! dispatch — registration never races with delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::media::annexb;

/// One encoded access unit: an Annex-B NAL stream for video, or a raw
/// AAC frame for audio. Immutable once emitted; shared across consumer
/// queues via `Arc`.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub payload: Vec<u8>,
    /// Presentation time in microseconds.
    pub time_us: u64,
    pub keyframe: bool,
}

/// Video parameter sets extracted from the encoder's output.
///
/// `vps` is only present for HEVC.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub vps: Option<Vec<u8>>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// AAC stream configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channel_count: u8,
    pub audio_specific_config: Vec<u8>,
}

/// Which video codec the encoder is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Hevc,
}

impl VideoCodec {
    /// Codec name as it appears in SDP `a=rtpmap` lines.
    pub fn sdp_name(self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::Hevc => "H265",
        }
    }
}

/// Identifier returned by callback registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(u64);

/// A registered frame consumer.
pub type FrameCallback = Arc<dyn Fn(&Arc<EncodedFrame>) + Send + Sync>;

/// Produces encoded video access units and the current parameter sets.
pub trait VideoSource: Send + Sync {
    /// Latest parameter sets, or `None` until the encoder has emitted them.
    fn codec_config(&self) -> Option<VideoConfig>;

    /// Ask the encoder to emit a keyframe (and thus fresh parameter sets)
    /// as soon as possible.
    fn request_keyframe(&self);

    fn add_frame_callback(&self, cb: FrameCallback) -> CallbackId;

    fn remove_frame_callback(&self, id: CallbackId);
}

/// Produces encoded AAC access units.
pub trait AudioSource: Send + Sync {
    /// Latest audio configuration, or `None` until the encoder reports it.
    fn audio_config(&self) -> Option<AudioConfig>;

    fn add_frame_callback(&self, cb: FrameCallback) -> CallbackId;

    fn remove_frame_callback(&self, id: CallbackId);
}

/// Snapshot-on-iterate callback registry for frame delivery.
///
/// Many consumers (server sessions, the push client) register against one
/// producer. `dispatch` clones the current callback list under a read
/// lock and invokes the clones outside it, so `add`/`remove` from other
/// threads never race with an in-flight delivery.
#[derive(Default)]
pub struct FrameFanout {
    callbacks: RwLock<Vec<(CallbackId, FrameCallback)>>,
    next_id: AtomicU64,
}

impl FrameFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, cb: FrameCallback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, cb));
        id
    }

    pub fn remove(&self, id: CallbackId) {
        self.callbacks.write().retain(|(cb_id, _)| *cb_id != id);
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Deliver one frame to every registered callback.
    pub fn dispatch(&self, frame: &Arc<EncodedFrame>) {
        let snapshot: Vec<FrameCallback> = self
            .callbacks
            .read()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in snapshot {
            cb(frame);
        }
    }
}

/// Cache of the most recent codec parameter sets.
///
/// Updated whenever the encoder reports new config data — either an
/// out-of-band config buffer or parameter-set NALs riding in front of a
/// keyframe. Read by every session building an SDP or about to send a
/// keyframe. Latest value wins; no history.
pub struct ConfigCache {
    codec: VideoCodec,
    vps: RwLock<Option<Vec<u8>>>,
    sps: RwLock<Option<Vec<u8>>>,
    pps: RwLock<Option<Vec<u8>>>,
}

impl ConfigCache {
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            codec,
            vps: RwLock::new(None),
            sps: RwLock::new(None),
            pps: RwLock::new(None),
        }
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Scan an Annex-B buffer for parameter-set NALs and cache any found.
    pub fn absorb_annex_b(&self, data: &[u8]) {
        for nal in annexb::split_nal_units(data) {
            if nal.is_empty() {
                continue;
            }
            match self.codec {
                VideoCodec::H264 => match annexb::h264_nal_type(&nal) {
                    annexb::H264_NAL_SPS => {
                        tracing::debug!(bytes = nal.len(), "H.264 SPS captured");
                        *self.sps.write() = Some(nal);
                    }
                    annexb::H264_NAL_PPS => {
                        tracing::debug!(bytes = nal.len(), "H.264 PPS captured");
                        *self.pps.write() = Some(nal);
                    }
                    _ => {}
                },
                VideoCodec::Hevc => match annexb::hevc_nal_type(&nal) {
                    annexb::HEVC_NAL_VPS => *self.vps.write() = Some(nal),
                    annexb::HEVC_NAL_SPS => *self.sps.write() = Some(nal),
                    annexb::HEVC_NAL_PPS => *self.pps.write() = Some(nal),
                    _ => {}
                },
            }
        }
    }

    /// Current config if the mandatory parameter sets are present.
    pub fn get(&self) -> Option<VideoConfig> {
        let sps = self.sps.read().clone()?;
        let pps = self.pps.read().clone()?;
        Some(VideoConfig {
            vps: self.vps.read().clone(),
            sps,
            pps,
        })
    }
}
