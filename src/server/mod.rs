//! RTSP server: TCP acceptor and per-connection protocol handling.
//!
//! One acceptor thread per server, one handler thread per accepted
//! connection, plus one audio delivery thread per connection that sets
//! up the audio track. Connections are fully independent; an I/O error
//! on one never affects the others or the acceptor.

mod conn;

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::RwLock;

use crate::encoder::{AudioSource, VideoCodec, VideoSource};
use crate::error::{Result, StreamError};
use crate::protocol::auth::Credentials;
use crate::session::ClientStats;

/// Server configuration, read at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// First port to try binding; successive ports are tried on failure.
    pub port: u16,
    /// How many successive ports to try before giving up.
    pub port_attempts: u16,
    /// SDP session name (`s=` line).
    pub session_name: String,
    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8554,
            port_attempts: 10,
            session_name: "camstream".to_string(),
            realm: "camstream".to_string(),
        }
    }
}

/// State shared by every connection of one server.
pub(crate) struct ServerShared {
    pub video: Arc<dyn VideoSource>,
    pub audio: Option<Arc<dyn AudioSource>>,
    pub codec: VideoCodec,
    pub credentials: Arc<RwLock<Credentials>>,
    pub stats: Arc<ClientStats>,
    pub session_name: String,
}

/// RTSP server orchestrator.
///
/// Owns the listener thread and the state shared across connections.
/// [`start`](Self::start) binds and spawns the acceptor;
/// [`stop`](Self::stop) flips the running flag, which the acceptor and
/// every connection loop observe within their next poll tick.
pub struct Server {
    config: ServerConfig,
    video: Arc<dyn VideoSource>,
    audio: Option<Arc<dyn AudioSource>>,
    codec: VideoCodec,
    credentials: Arc<RwLock<Credentials>>,
    stats: Arc<ClientStats>,
    running: Arc<AtomicBool>,
    bound_port: Option<u16>,
}

impl Server {
    pub fn new(config: ServerConfig, video: Arc<dyn VideoSource>, codec: VideoCodec) -> Self {
        let credentials = Credentials::new("", "", &config.realm);
        Self {
            config,
            video,
            audio: None,
            codec,
            credentials: Arc::new(RwLock::new(credentials)),
            stats: Arc::new(ClientStats::new()),
            running: Arc::new(AtomicBool::new(false)),
            bound_port: None,
        }
    }

    /// Attach an audio source.
    pub fn with_audio(mut self, audio: Arc<dyn AudioSource>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Replace the configured credentials. An empty password disables
    /// authentication. Existing connections keep streaming; new requests
    /// are checked against the updated values.
    pub fn update_credentials(&self, username: &str, password: &str) {
        *self.credentials.write() = Credentials::new(username, password, &self.config.realm);
        tracing::info!(auth = !password.is_empty(), "credentials updated");
    }

    /// Bind and start accepting connections.
    ///
    /// Bind failures retry on successive ports up to the configured
    /// attempt count; exhausting the attempts is fatal. Returns the port
    /// actually bound.
    pub fn start(&mut self) -> Result<u16> {
        if self.running.load(Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let (listener, port) = bind_with_retry(self.config.port, self.config.port_attempts)?;
        listener.set_nonblocking(true)?;

        self.running.store(true, Ordering::SeqCst);
        self.bound_port = Some(port);

        let shared = Arc::new(ServerShared {
            video: self.video.clone(),
            audio: self.audio.clone(),
            codec: self.codec,
            credentials: self.credentials.clone(),
            stats: self.stats.clone(),
            session_name: self.config.session_name.clone(),
        });
        let running = self.running.clone();

        tracing::info!(port, "RTSP server listening");

        thread::spawn(move || {
            conn::accept_loop(listener, shared, running);
        });

        Ok(port)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("RTSP server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Port actually bound, once started.
    pub fn port(&self) -> Option<u16> {
        self.bound_port
    }

    pub fn stats(&self) -> Arc<ClientStats> {
        self.stats.clone()
    }
}

fn bind_with_retry(start_port: u16, attempts: u16) -> Result<(TcpListener, u16)> {
    for offset in 0..attempts {
        let port = start_port.wrapping_add(offset);
        match TcpListener::bind(("0.0.0.0", port)) {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(start_port, port, "configured port busy, bound fallback");
                }
                return Ok((listener, port));
            }
            Err(e) => {
                tracing::debug!(port, error = %e, "bind attempt failed");
            }
        }
    }
    Err(StreamError::BindFailed {
        start_port,
        attempts,
    })
}
