//! Embedded RTSP/RTP streaming engine.
//!
//! Exposes a live encoded feed as an RTSP stream over TCP-interleaved
//! RTP and can simultaneously push the same feed to a remote RTSP
//! server:
//!
//! - [`server`]: the RTSP server with its per-connection state machine
//!   (OPTIONS/DESCRIBE/SETUP/PLAY/TEARDOWN) and frame delivery loops.
//! - [`push`]: the RTSP client role (ANNOUNCE/SETUP/RECORD) with
//!   automatic exponential-backoff reconnection.
//! - [`media`]: H.264/HEVC and AAC RTP packetization.
//! - [`protocol`]: RTSP message parsing, SDP generation, Basic auth.
//! - [`encoder`]: the collaborator interface encoded frames arrive
//!   through, plus the codec-config cache.
//! - [`source`]: a file replay source implementing that interface.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use camstream::{FileSource, Server, ServerConfig, VideoCodec};
//!
//! # fn main() -> camstream::Result<()> {
//! let mut source = FileSource::open(Path::new("clip.h264"), VideoCodec::H264, 30)?;
//! source.start()?;
//!
//! let mut server = Server::new(ServerConfig::default(), Arc::new(source), VideoCodec::H264);
//! let port = server.start()?;
//! println!("rtsp://0.0.0.0:{port}/live");
//! # Ok(())
//! # }
//! ```

pub mod encoder;
pub mod error;
pub mod media;
pub mod protocol;
pub mod push;
pub mod queue;
pub mod server;
pub mod session;
pub mod source;
pub mod transport;

pub use encoder::{AudioSource, VideoCodec, VideoSource};
pub use error::{Result, StreamError};
pub use push::{PushClient, PushConfig};
pub use server::{Server, ServerConfig};
pub use source::FileSource;
