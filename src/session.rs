//! Per-connection session and track bookkeeping.
//!
//! One [`Session`] maps 1:1 to one TCP connection. The server-generated
//! session identifier is echoed in responses but never matched across
//! connections; there is no session resumption.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::media::{AUDIO_PAYLOAD_TYPE, VIDEO_PAYLOAD_TYPE};

/// Track id for the video stream (`trackID=0` in URIs and SDP).
pub const VIDEO_TRACK_ID: u8 = 0;
/// Track id for the audio stream (`trackID=1`).
pub const AUDIO_TRACK_ID: u8 = 1;

/// One media track negotiated during SETUP.
#[derive(Debug, Clone, Copy)]
pub struct Track {
    pub id: u8,
    pub payload_type: u8,
    /// Even interleaved channel carrying RTP; channel+1 is reserved for
    /// RTCP, which is never sent.
    pub rtp_channel: u8,
}

/// State for one RTSP connection: identifier, negotiated tracks, and
/// the streaming flag flipped by PLAY.
#[derive(Debug)]
pub struct Session {
    id: String,
    tracks: Vec<Track>,
    streaming: bool,
}

impl Session {
    /// Create with a time-based identifier.
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self {
            id: millis.to_string(),
            tracks: Vec::with_capacity(2),
            streaming: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record a SETUP for the given track, replacing any earlier SETUP
    /// of the same track.
    pub fn setup_track(&mut self, id: u8, rtp_channel: u8) {
        let payload_type = if id == AUDIO_TRACK_ID {
            AUDIO_PAYLOAD_TYPE
        } else {
            VIDEO_PAYLOAD_TYPE
        };
        self.tracks.retain(|t| t.id != id);
        self.tracks.push(Track {
            id,
            payload_type,
            rtp_channel,
        });
    }

    pub fn track(&self, id: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// PLAY requires at least one track to have completed SETUP.
    pub fn ready_to_play(&self) -> bool {
        self.track(VIDEO_TRACK_ID).is_some()
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Connect/disconnect counters shared across all connections.
///
/// The low-traffic flag flips when the active client count reaches
/// zero; it feeds logging and lets the owning service pause
/// nonessential work, nothing in the engine gates on it.
#[derive(Debug, Default)]
pub struct ClientStats {
    active: AtomicUsize,
    total_connects: AtomicU64,
    low_traffic: AtomicBool,
}

impl ClientStats {
    pub fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            total_connects: AtomicU64::new(0),
            low_traffic: AtomicBool::new(true),
        }
    }

    pub fn client_connected(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.total_connects.fetch_add(1, Ordering::SeqCst);
        self.low_traffic.store(false, Ordering::SeqCst);
    }

    pub fn client_disconnected(&self) {
        let before = self.active.fetch_sub(1, Ordering::SeqCst);
        if before <= 1 {
            self.low_traffic.store(true, Ordering::SeqCst);
        }
    }

    pub fn active_clients(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total_connects(&self) -> u64 {
        self.total_connects.load(Ordering::SeqCst)
    }

    pub fn is_low_traffic(&self) -> bool {
        self.low_traffic.load(Ordering::SeqCst)
    }
}
