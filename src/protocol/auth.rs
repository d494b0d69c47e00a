//! Basic authentication (RFC 2326 carries HTTP Basic auth unchanged).
//!
//! The server checks every request when credentials are configured; an
//! empty password disables auth entirely. Credentials may arrive
//! percent-encoded (they are often embedded in URLs by clients), so both
//! username and password are percent-decoded before comparison.

use base64::prelude::{Engine as _, BASE64_STANDARD};

use crate::protocol::request::RtspRequest;

/// Configured server-side credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str, realm: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            realm: realm.to_string(),
        }
    }

    /// Auth is enforced only when a password is configured.
    pub fn required(&self) -> bool {
        !self.password.is_empty()
    }

    /// Check a request's `Authorization` header against these
    /// credentials. Always passes when auth is disabled.
    pub fn authorize(&self, request: &RtspRequest) -> bool {
        if !self.required() {
            return true;
        }
        let Some(header) = request.get_header("Authorization") else {
            return false;
        };
        let Some(encoded) = header.trim().strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(userpass) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((user, pass)) = userpass.split_once(':') else {
            return false;
        };
        percent_decode(user) == self.username && percent_decode(pass) == self.password
    }
}

/// Build a `Basic` authorization header value for the client role.
pub fn basic_header(userinfo: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(userinfo.as_bytes()))
}

/// Decode `%XX` escapes; malformed escapes pass through verbatim.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encode everything outside the URL `unreserved` set, for
/// embedding credentials in userinfo.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
