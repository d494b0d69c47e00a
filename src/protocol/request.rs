use crate::error::{ParseErrorKind, StreamError};

/// A parsed RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. Request bodies
/// are not parsed — no inbound server method carries one.
#[derive(Debug)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, SETUP, PLAY, TEARDOWN, ...).
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:port/live/trackID=0`).
    pub uri: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    /// Parse a complete RTSP request: request line, headers, trailing
    /// blank line.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().ok_or(StreamError::Parse {
            kind: ParseErrorKind::EmptyMessage,
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(StreamError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let colon_pos = line.find(':').ok_or(StreamError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            headers.push((name, value));
        }

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
        })
    }

    /// Look up a header value by name (case-insensitive, RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq header value, which orders request/response pairs.
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// Track id from a `trackID=<n>` suffix on the request URI.
    ///
    /// SETUP requests address individual tracks this way: track 0 is
    /// video, track 1 is audio. A URI without the suffix addresses the
    /// whole presentation.
    pub fn track_id(&self) -> Option<u8> {
        let pos = self.uri.rfind("trackID=")?;
        self.uri[pos + "trackID=".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .ok()
    }
}
