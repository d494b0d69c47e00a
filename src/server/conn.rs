//! Per-connection RTSP request loop and frame delivery.
//!
//! Each accepted connection runs `Idle → (OPTIONS|DESCRIBE)* →
//! SETUP(tracks) → PLAY → streaming` on its own thread. Ordering is not
//! strictly enforced beyond PLAY requiring a completed video SETUP;
//! DESCRIBE may repeat and SETUP arrives once per track.
//!
//! PLAY turns the request thread into the video delivery loop. When the
//! audio track was set up, a second thread drains the audio queue onto
//! the same socket through the shared [`InterleavedSender`]. A client
//! that wants to tear down mid-stream just closes the connection, which
//! surfaces as a write error and ends both loops.

use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::encoder::{CallbackId, VideoConfig};
use crate::error::Result;
use crate::media::annexb::split_nal_units;
use crate::media::audio::AudioPacketizer;
use crate::media::video::VideoPacketizer;
use crate::media::{audio_timestamp, video_timestamp};
use crate::protocol::{RtspRequest, RtspResponse, sdp};
use crate::queue::{
    AUDIO_QUEUE_CAPACITY, FrameQueue, QUEUE_POLL_TIMEOUT, VIDEO_QUEUE_CAPACITY,
};
use crate::server::ServerShared;
use crate::session::{AUDIO_TRACK_ID, Session, VIDEO_TRACK_ID};
use crate::transport::InterleavedSender;

/// How many times DESCRIBE polls for codec config before giving up and
/// sending a best-effort SDP.
const CONFIG_WAIT_ATTEMPTS: u32 = 15;
/// Interval between codec-config polls (total wait ≈ 3 s).
const CONFIG_WAIT_INTERVAL: Duration = Duration::from_millis(200);

const SUPPORTED_METHODS: &str = "OPTIONS, DESCRIBE, SETUP, PLAY, TEARDOWN";

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub(crate) fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let shared = shared.clone();
                let running = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, shared, running);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single RTSP client connection with its own lifecycle.
struct Connection {
    reader: BufReader<TcpStream>,
    sender: Arc<InterleavedSender>,
    session: Session,
    peer_addr: SocketAddr,
    shared: Arc<ServerShared>,
    running: Arc<AtomicBool>,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    fn handle(stream: TcpStream, shared: Arc<ServerShared>, running: Arc<AtomicBool>) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        shared.stats.client_connected();
        tracing::info!(%peer_addr, clients = shared.stats.active_clients(), "client connected");

        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            sender: Arc::new(InterleavedSender::new(stream)),
            session: Session::new(),
            peer_addr,
            shared: shared.clone(),
            running,
        };

        let reason = conn.run();
        conn.sender.shutdown();

        shared.stats.client_disconnected();
        tracing::info!(
            %peer_addr,
            reason,
            low_traffic = shared.stats.is_low_traffic(),
            "client disconnected"
        );
    }

    /// RTSP request/response loop. Returns the reason for exiting.
    fn run(&mut self) -> &'static str {
        while self.running.load(Ordering::SeqCst) {
            let mut request_text = String::new();
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line) {
                    Ok(0) => return "connection closed by client",
                    Ok(_) => {
                        request_text.push_str(&line);
                        if line == "\r\n" || line == "\n" {
                            break;
                        }
                    }
                    Err(_) => return "read error",
                }
            }

            if request_text.trim().is_empty() {
                continue;
            }

            let request = match RtspRequest::parse(&request_text) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                    continue;
                }
            };

            tracing::debug!(
                peer = %self.peer_addr,
                method = %request.method,
                uri = %request.uri,
                "request"
            );

            let credentials = self.shared.credentials.read().clone();
            if !credentials.authorize(&request) {
                tracing::debug!(peer = %self.peer_addr, "unauthorized request");
                if self
                    .respond(&request, RtspResponse::unauthorized(&credentials.realm))
                    .is_err()
                {
                    return "write error";
                }
                continue;
            }

            let outcome = match request.method.as_str() {
                "OPTIONS" => self.respond(
                    &request,
                    RtspResponse::ok().add_header("Public", SUPPORTED_METHODS),
                ),
                "DESCRIBE" => self.handle_describe(&request),
                "SETUP" => self.handle_setup(&request),
                "PLAY" => {
                    if !self.session.ready_to_play() {
                        self.respond(&request, RtspResponse::not_valid_in_state())
                    } else {
                        let response = RtspResponse::ok()
                            .add_header("Session", self.session.id())
                            .add_header("Range", "npt=now-");
                        if self.respond(&request, response).is_err() {
                            return "write error";
                        }
                        return self.stream();
                    }
                }
                "TEARDOWN" => {
                    let _ = self.respond(
                        &request,
                        RtspResponse::ok().add_header("Session", self.session.id()),
                    );
                    return "teardown";
                }
                other => {
                    tracing::debug!(peer = %self.peer_addr, method = other, "unknown method");
                    self.respond(&request, RtspResponse::method_not_allowed())
                }
            };

            if outcome.is_err() {
                return "write error";
            }
        }

        "server shutting down"
    }

    /// Serialize and send a response, echoing the request's CSeq.
    fn respond(&self, request: &RtspRequest, mut response: RtspResponse) -> Result<()> {
        if let Some(cseq) = request.cseq() {
            response = response.add_header("CSeq", cseq);
        }
        tracing::debug!(peer = %self.peer_addr, status = response.status_code, "response");
        self.sender.send_text(response.serialize().as_bytes())
    }

    /// DESCRIBE: wait (bounded) for codec config, then send the SDP.
    ///
    /// If the encoder never reports parameter sets within the window the
    /// SDP is sent best-effort with empty `sprop-*` values; parameter
    /// sets still travel in-band once streaming starts.
    fn handle_describe(&mut self, request: &RtspRequest) -> Result<()> {
        let mut video_config = None;
        for attempt in 0..CONFIG_WAIT_ATTEMPTS {
            if let Some(config) = self.shared.video.codec_config() {
                video_config = Some(config);
                break;
            }
            if attempt == 0 {
                self.shared.video.request_keyframe();
            }
            thread::sleep(CONFIG_WAIT_INTERVAL);
        }
        if video_config.is_none() {
            tracing::warn!(peer = %self.peer_addr, "codec config unavailable, sending best-effort SDP");
        }

        let audio_config = self
            .shared
            .audio
            .as_ref()
            .and_then(|audio| audio.audio_config());

        let body = sdp::build_sdp(
            self.shared.codec,
            video_config.as_ref(),
            audio_config.as_ref(),
            "0.0.0.0",
            &self.shared.session_name,
        );

        let response = RtspResponse::ok()
            .add_header("Content-Base", &format!("{}/", request.uri))
            .add_header("Content-Type", "application/sdp")
            .with_body(body);
        self.respond(request, response)
    }

    /// SETUP: record the interleaved channel pair for the addressed track.
    fn handle_setup(&mut self, request: &RtspRequest) -> Result<()> {
        let transport = request.get_header("Transport").unwrap_or_default();
        let Some((rtp_channel, rtcp_channel)) = parse_interleaved(transport) else {
            tracing::debug!(peer = %self.peer_addr, transport, "unsupported transport");
            return self.respond(request, RtspResponse::unsupported_transport());
        };

        let track_id = request.track_id().unwrap_or(VIDEO_TRACK_ID);
        self.session.setup_track(track_id, rtp_channel);
        tracing::debug!(
            peer = %self.peer_addr,
            track_id,
            rtp_channel,
            "track set up"
        );

        let response = RtspResponse::ok()
            .add_header(
                "Transport",
                &format!("RTP/AVP/TCP;unicast;interleaved={rtp_channel}-{rtcp_channel}"),
            )
            .add_header("Session", self.session.id());
        self.respond(request, response)
    }

    /// Data phase: request thread becomes the video delivery loop; a
    /// second thread drains audio when that track was set up.
    fn stream(&mut self) -> &'static str {
        self.session.set_streaming(true);
        let alive = Arc::new(AtomicBool::new(true));

        let video_channel = match self.session.track(VIDEO_TRACK_ID) {
            Some(track) => track.rtp_channel,
            None => return "no video track",
        };

        let video_queue = Arc::new(FrameQueue::new(VIDEO_QUEUE_CAPACITY));
        let queue = video_queue.clone();
        let video_cb = self.shared.video.add_frame_callback(Arc::new(move |frame| {
            if queue.push(frame.clone()) {
                tracing::trace!("video queue full, evicted oldest frame");
            }
        }));

        // A joining client needs a keyframe and the parameter sets before
        // it can decode anything.
        self.shared.video.request_keyframe();

        let audio = self.start_audio_delivery(&alive);

        let mut packetizer = VideoPacketizer::new(self.shared.codec);
        if let Some(config) = self.shared.video.codec_config() {
            if self
                .send_parameter_sets(&mut packetizer, video_channel, &config, 0)
                .is_err()
            {
                self.finish_delivery(alive, video_cb, audio);
                return "write error";
            }
        }

        tracing::info!(peer = %self.peer_addr, session = self.session.id(), "streaming started");

        let reason = loop {
            if !self.running.load(Ordering::SeqCst) {
                break "server shutting down";
            }
            if !alive.load(Ordering::SeqCst) {
                break "write error";
            }
            let Some(frame) = video_queue.poll(QUEUE_POLL_TIMEOUT) else {
                continue;
            };
            let timestamp = video_timestamp(frame.time_us);

            // Re-sync receivers on every keyframe in case the encoder
            // regenerated parameter sets or the initial send was missed.
            if frame.keyframe {
                if let Some(config) = self.shared.video.codec_config() {
                    if self
                        .send_parameter_sets(&mut packetizer, video_channel, &config, timestamp)
                        .is_err()
                    {
                        break "write error";
                    }
                }
            }

            let mut failed = false;
            for nal in split_nal_units(&frame.payload) {
                if packetizer
                    .send_nal(&self.sender, video_channel, &nal, timestamp)
                    .is_err()
                {
                    failed = true;
                    break;
                }
            }
            if failed {
                break "write error";
            }
        };

        self.finish_delivery(alive, video_cb, audio);
        reason
    }

    /// Spawn the audio delivery thread when the track was set up and the
    /// source has reported its configuration.
    fn start_audio_delivery(
        &self,
        alive: &Arc<AtomicBool>,
    ) -> Option<(CallbackId, thread::JoinHandle<()>)> {
        let source = self.shared.audio.as_ref()?;
        let track = self.session.track(AUDIO_TRACK_ID)?;
        let Some(config) = source.audio_config() else {
            tracing::warn!(peer = %self.peer_addr, "audio track set up but no audio config");
            return None;
        };

        let queue = Arc::new(FrameQueue::new(AUDIO_QUEUE_CAPACITY));
        let push_queue = queue.clone();
        let cb = source.add_frame_callback(Arc::new(move |frame| {
            push_queue.push(frame.clone());
        }));

        let sender = self.sender.clone();
        let alive = alive.clone();
        let running = self.running.clone();
        let channel = track.rtp_channel;
        let sample_rate = config.sample_rate;

        let handle = thread::spawn(move || {
            let mut packetizer = AudioPacketizer::new();
            while running.load(Ordering::SeqCst) && alive.load(Ordering::SeqCst) {
                let Some(frame) = queue.poll(QUEUE_POLL_TIMEOUT) else {
                    continue;
                };
                let timestamp = audio_timestamp(frame.time_us, sample_rate);
                if packetizer
                    .send_frame(&sender, channel, &frame.payload, timestamp)
                    .is_err()
                {
                    alive.store(false, Ordering::SeqCst);
                    break;
                }
            }
            tracing::debug!("audio delivery loop exited");
        });

        Some((cb, handle))
    }

    /// Send current parameter sets on the video channel, VPS first when
    /// present.
    fn send_parameter_sets(
        &self,
        packetizer: &mut VideoPacketizer,
        channel: u8,
        config: &VideoConfig,
        timestamp: u32,
    ) -> Result<()> {
        if let Some(vps) = &config.vps {
            packetizer.send_nal(&self.sender, channel, vps, timestamp)?;
        }
        packetizer.send_nal(&self.sender, channel, &config.sps, timestamp)?;
        packetizer.send_nal(&self.sender, channel, &config.pps, timestamp)?;
        Ok(())
    }

    /// Tear down delivery: unregister callbacks and join the audio thread.
    fn finish_delivery(
        &mut self,
        alive: Arc<AtomicBool>,
        video_cb: CallbackId,
        audio: Option<(CallbackId, thread::JoinHandle<()>)>,
    ) {
        alive.store(false, Ordering::SeqCst);
        self.shared.video.remove_frame_callback(video_cb);
        if let Some((cb, handle)) = audio {
            if let Some(source) = self.shared.audio.as_ref() {
                source.remove_frame_callback(cb);
            }
            let _ = handle.join();
        }
        self.session.set_streaming(false);
    }
}

/// Parse `interleaved=<rtp>-<rtcp>` out of a Transport header that
/// advertises `RTP/AVP/TCP`. Anything else (UDP-only offers included)
/// yields `None`.
fn parse_interleaved(transport: &str) -> Option<(u8, u8)> {
    if !transport.contains("RTP/AVP/TCP") {
        return None;
    }
    let spec = transport
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("interleaved="))?;
    let (rtp, rtcp) = spec.split_once('-')?;
    Some((rtp.trim().parse().ok()?, rtcp.trim().parse().ok()?))
}
