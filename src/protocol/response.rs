use std::io::BufRead;

use crate::error::{ParseErrorKind, StreamError};

/// An outbound RTSP response (RFC 2326 §7).
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Builder pattern — chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// 200 OK.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// 401 Unauthorized — missing or invalid credentials.
    pub fn unauthorized(realm: &str) -> Self {
        Self::new(401, "Unauthorized")
            .add_header("WWW-Authenticate", &format!("Basic realm=\"{realm}\""))
    }

    /// 405 Method Not Allowed — unknown RTSP method.
    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed")
    }

    /// 455 Method Not Valid in This State — e.g. PLAY before SETUP.
    pub fn not_valid_in_state() -> Self {
        Self::new(455, "Method Not Valid in This State")
    }

    /// 461 Unsupported Transport — SETUP without TCP-interleaved.
    pub fn unsupported_transport() -> Self {
        Self::new(461, "Unsupported Transport")
    }

    /// 500 Internal Server Error.
    pub fn internal_error() -> Self {
        Self::new(500, "Internal Server Error")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize to the RTSP text wire format, appending
    /// `Content-Length` when a body is present.
    pub fn serialize(&self) -> String {
        let mut response = format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text);

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }

        if let Some(body) = &self.body {
            response.push_str(&format!("Content-Length: {}\r\n", body.len()));
            response.push_str("\r\n");
            response.push_str(body);
        } else {
            response.push_str("\r\n");
        }
        response
    }
}

/// An inbound RTSP response as seen by the push client.
#[derive(Debug)]
pub struct ReceivedResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
}

impl ReceivedResponse {
    /// Read a status line plus headers from the socket (terminated by a
    /// blank line). Response bodies are not expected from any method the
    /// push client sends.
    pub fn read_from<R: BufRead>(reader: &mut R) -> crate::error::Result<Self> {
        let mut status_line = String::new();
        if reader.read_line(&mut status_line)? == 0 {
            return Err(StreamError::Parse {
                kind: ParseErrorKind::EmptyMessage,
            });
        }

        let status_code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or(StreamError::Parse {
                kind: ParseErrorKind::InvalidStatusLine,
            })?;

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(colon_pos) = line.find(':') {
                headers.push((
                    line[..colon_pos].trim().to_string(),
                    line[colon_pos + 1..].trim().to_string(),
                ));
            }
        }

        Ok(ReceivedResponse {
            status_code,
            headers,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Session identifier from the `Session` header, with any
    /// `;timeout=...` suffix stripped.
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim())
    }
}
