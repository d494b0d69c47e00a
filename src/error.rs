//! Error types for the streaming engine.

use std::fmt;

/// Errors that can occur across the streaming stack.
///
/// Variants map to specific failure modes:
///
/// - **Transport**: [`Io`](Self::Io) — socket/network failures, always
///   local to one connection.
/// - **Protocol**: [`Parse`](Self::Parse) — malformed RTSP messages.
///   Unsupported-transport and unknown-method conditions are answered
///   on the wire with 4xx statuses rather than surfaced as errors.
/// - **Encoder**: [`ConfigNotReady`](Self::ConfigNotReady) — the codec
///   config has not been produced yet (bounded waits return this instead
///   of a bare `None`).
/// - **Push client**: [`PushRejected`](Self::PushRejected),
///   [`InvalidPushUrl`](Self::InvalidPushUrl) — retryable handshake
///   failures against the remote server.
/// - **Startup**: [`BindFailed`](Self::BindFailed),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an RTSP message.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The encoder has not produced its codec config yet.
    #[error("codec config not ready")]
    ConfigNotReady,

    /// The remote push server answered with a non-2xx status.
    #[error("push request rejected with status {0}")]
    PushRejected(u16),

    /// The configured push URL could not be parsed.
    #[error("invalid push URL: {0}")]
    InvalidPushUrl(String),

    /// Could not bind a listening socket after retrying successive ports.
    #[error("failed to bind after trying {attempts} ports starting at {start_port}")]
    BindFailed { start_port: u16, attempts: u16 },

    /// `start` was called while already running.
    #[error("already running")]
    AlreadyRunning,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request or status line).
    EmptyMessage,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// Status line did not carry a numeric status code.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
