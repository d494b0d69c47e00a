//! RTSP/1.0 protocol handling (RFC 2326 subset).
//!
//! Text-based request/response signaling shared by the server and the
//! push client:
//!
//! - [`request`]: inbound request parsing (server) with case-insensitive
//!   header lookup.
//! - [`response`]: response building (server) and response parsing
//!   (push client).
//! - [`auth`]: Basic authentication.
//! - [`sdp`]: session description generation for DESCRIBE and ANNOUNCE.
//!
//! Server methods: OPTIONS, DESCRIBE, SETUP, PLAY, TEARDOWN.
//! Client methods: ANNOUNCE, SETUP, RECORD.

pub mod auth;
pub mod request;
pub mod response;
pub mod sdp;

pub use request::RtspRequest;
pub use response::{ReceivedResponse, RtspResponse};
