//! Integration tests: full RTSP handshake against a live server with a
//! fake encoder, exercising the per-connection state machine end to end.

mod common;

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camstream::encoder::{CallbackId, FrameCallback, VideoConfig, VideoSource};
use camstream::{Server, ServerConfig, VideoCodec};

use common::{FakeAudio, FakeVideo, read_interleaved_frame, rtsp_request};

fn start_server(port: u16, video: Arc<FakeVideo>, audio: Option<Arc<FakeAudio>>) -> (Server, u16) {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, video, VideoCodec::H264);
    if let Some(audio) = audio {
        server = server.with_audio(audio);
    }
    let bound = server.start().expect("server start");
    (server, bound)
}

fn connect(port: u16) -> (TcpStream, BufReader<TcpStream>) {
    let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to server");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (stream, reader)
}

#[test]
fn full_handshake_sends_parameter_sets_before_frames() {
    let video = FakeVideo::new();
    let audio = FakeAudio::new();
    let (mut server, port) = start_server(18554, video.clone(), Some(audio.clone()));
    let (mut stream, mut reader) = connect(port);
    let base = format!("rtsp://127.0.0.1:{port}/live");

    // OPTIONS
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("OPTIONS {base} RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "OPTIONS: {resp}");
    assert!(resp.contains("Public:"));
    assert!(resp.contains("CSeq: 1"));

    // DESCRIBE
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("DESCRIBE {base} RTSP/1.0\r\nCSeq: 2\r\nAccept: application/sdp\r\n\r\n"),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "DESCRIBE: {resp}");
    assert!(resp.contains("Content-Type: application/sdp"));
    assert!(resp.contains("m=video 0 RTP/AVP 96"));
    assert!(resp.contains("profile-level-id=42001e"));
    assert!(resp.contains("m=audio 0 RTP/AVP 97"));

    // SETUP video then audio
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!(
            "SETUP {base}/trackID=0 RTSP/1.0\r\nCSeq: 3\r\n\
             Transport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n"
        ),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "SETUP video: {resp}");
    assert!(resp.contains("Transport: RTP/AVP/TCP;unicast;interleaved=0-1"));
    let session_id = resp
        .lines()
        .find(|l| l.starts_with("Session:"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .expect("Session header");
    assert!(!session_id.is_empty());

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!(
            "SETUP {base}/trackID=1 RTSP/1.0\r\nCSeq: 4\r\n\
             Transport: RTP/AVP/TCP;unicast;interleaved=2-3\r\n\
             Session: {session_id}\r\n\r\n"
        ),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "SETUP audio: {resp}");
    assert!(resp.contains("interleaved=2-3"));

    // PLAY
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("PLAY {base} RTSP/1.0\r\nCSeq: 5\r\nSession: {session_id}\r\n\r\n"),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "PLAY: {resp}");

    // Parameter sets arrive on the video channel before any frame data.
    let (channel, packet) = read_interleaved_frame(&mut reader).unwrap();
    assert_eq!(channel, 0);
    assert_eq!(packet[12] & 0x1f, 7, "SPS first on the wire");
    let (channel, packet) = read_interleaved_frame(&mut reader).unwrap();
    assert_eq!(channel, 0);
    assert_eq!(packet[12] & 0x1f, 8, "PPS second on the wire");

    // Wait for the delivery loop's callback registration.
    let deadline = Instant::now() + Duration::from_secs(2);
    while video.subscriber_count() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(video.subscriber_count() > 0, "video callback registered");

    // Audio frames ride the audio channel with payload type 97.
    audio.emit(&[0x21, 0x1b, 0x80], 10_000);
    let (channel, packet) = read_interleaved_frame(&mut reader).unwrap();
    assert_eq!(channel, 2);
    assert_eq!(packet[1] & 0x7f, 97);

    // A mid-stream keyframe triggers a parameter-set re-send.
    let mut keyframe = vec![0, 0, 0, 1];
    keyframe.extend_from_slice(&[0x65, 0x88, 0x80, 0x01]);
    video.emit(&keyframe, 33_000, true);

    let mut types = Vec::new();
    for _ in 0..3 {
        let (channel, packet) = read_interleaved_frame(&mut reader).unwrap();
        assert_eq!(channel, 0);
        types.push(packet[12] & 0x1f);
    }
    assert_eq!(types, vec![7, 8, 5], "SPS+PPS re-sent before keyframe NAL");

    server.stop();
}

#[test]
fn setup_without_tcp_interleaved_rejected() {
    let (mut server, port) = start_server(18574, FakeVideo::new(), None);
    let (mut stream, mut reader) = connect(port);
    let base = format!("rtsp://127.0.0.1:{port}/live");

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!(
            "SETUP {base}/trackID=0 RTSP/1.0\r\nCSeq: 1\r\n\
             Transport: RTP/AVP;unicast;client_port=5000-5001\r\n\r\n"
        ),
    )
    .unwrap();
    assert!(
        resp.starts_with("RTSP/1.0 461 Unsupported Transport"),
        "expected 461: {resp}"
    );

    server.stop();
}

#[test]
fn play_before_setup_rejected() {
    let (mut server, port) = start_server(18594, FakeVideo::new(), None);
    let (mut stream, mut reader) = connect(port);

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("PLAY rtsp://127.0.0.1:{port}/live RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
    )
    .unwrap();
    assert!(
        resp.starts_with("RTSP/1.0 455 Method Not Valid in This State"),
        "expected 455: {resp}"
    );

    server.stop();
}

#[test]
fn unknown_method_answered_405() {
    let (mut server, port) = start_server(18614, FakeVideo::new(), None);
    let (mut stream, mut reader) = connect(port);

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("GET_PARAMETER rtsp://127.0.0.1:{port}/live RTSP/1.0\r\nCSeq: 9\r\n\r\n"),
    )
    .unwrap();
    assert!(
        resp.starts_with("RTSP/1.0 405 Method Not Allowed"),
        "expected 405: {resp}"
    );

    server.stop();
}

#[test]
fn auth_challenge_then_accept() {
    let (mut server, port) = start_server(18634, FakeVideo::new(), None);
    server.update_credentials("admin", "secret");
    let (mut stream, mut reader) = connect(port);
    let base = format!("rtsp://127.0.0.1:{port}/live");

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("OPTIONS {base} RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
    )
    .unwrap();
    assert!(
        resp.starts_with("RTSP/1.0 401 Unauthorized"),
        "expected 401: {resp}"
    );
    assert!(resp.contains("WWW-Authenticate: Basic realm="));

    // base64("admin:secret")
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!(
            "OPTIONS {base} RTSP/1.0\r\nCSeq: 2\r\n\
             Authorization: Basic YWRtaW46c2VjcmV0\r\n\r\n"
        ),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "expected 200: {resp}");

    // wrong credentials challenged again
    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!(
            "OPTIONS {base} RTSP/1.0\r\nCSeq: 3\r\n\
             Authorization: Basic YWRtaW46bm9wZQ==\r\n\r\n"
        ),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 401"), "expected 401: {resp}");

    server.stop();
}

/// Video source that never produces parameter sets.
struct NoConfigVideo;

impl VideoSource for NoConfigVideo {
    fn codec_config(&self) -> Option<VideoConfig> {
        None
    }
    fn request_keyframe(&self) {}
    fn add_frame_callback(&self, _cb: FrameCallback) -> CallbackId {
        unimplemented!("no frames in this test")
    }
    fn remove_frame_callback(&self, _id: CallbackId) {}
}

#[test]
fn describe_degrades_without_codec_config() {
    let config = ServerConfig {
        port: 18654,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, Arc::new(NoConfigVideo), VideoCodec::H264);
    let port = server.start().expect("server start");
    let (mut stream, mut reader) = connect(port);
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let resp = rtsp_request(
        &mut stream,
        &mut reader,
        &format!("DESCRIBE rtsp://127.0.0.1:{port}/live RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
    )
    .unwrap();
    assert!(resp.starts_with("RTSP/1.0 200 OK"), "DESCRIBE: {resp}");
    assert!(resp.contains("profile-level-id=42e01e"), "default profile");
    assert!(resp.contains("sprop-parameter-sets=,"), "empty sprop");

    server.stop();
}
