//! HTTP/1.1 wire codec: request serialization and response head parsing.
//!
//! # Design
//! These are pure functions over byte buffers. The dispatcher owns the
//! socket and feeds whatever it has read into `parse_head`; nothing here does
//! I/O, which keeps the codec testable without a peer.
//!
//! Caller headers go out in stored order and casing. The codec only adds the
//! fields HTTP/1.1 itself needs: `Host`, body framing via `Content-Length`,
//! and `Connection: close` since connections are never reused. Names and
//! values are checked before anything is serialized, so a value carrying
//! CR or LF can never start a header line of its own.

use bytes::{Buf, BytesMut};

use crate::error::FetchError;
use crate::headers::Headers;
use crate::request::{Method, Request};

/// Status line and header block of an inbound message.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

/// RFC 7230 `token`: header names and extension methods.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

fn is_field_value(s: &str) -> bool {
    !s.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0'))
}

/// Reject a method or header that would corrupt the request head.
pub(crate) fn check_request_head(method: &Method, headers: &Headers) -> Result<(), FetchError> {
    if !is_token(method.as_str()) {
        return Err(FetchError::InvalidMethod(method.as_str().to_string()));
    }
    for (name, value) in headers.iter() {
        if !is_token(name) || !is_field_value(value) {
            return Err(FetchError::InvalidHeader {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Serialize `request` into the bytes written to the socket.
pub(crate) fn encode_request(
    request: &Request,
    user_agent: Option<&str>,
) -> Result<Vec<u8>, FetchError> {
    check_request_head(request.method(), request.headers())?;
    if let Some(ua) = user_agent {
        if !is_field_value(ua) {
            return Err(FetchError::InvalidHeader {
                name: "User-Agent".to_string(),
            });
        }
    }

    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let headers = request.headers();
    let mut head = format!("{} {} HTTP/1.1\r\n", request.method(), target);
    if !headers.has("Host") {
        let host = url.host_str().unwrap_or_default();
        match url.port() {
            Some(port) => head.push_str(&format!("Host: {host}:{port}\r\n")),
            None => head.push_str(&format!("Host: {host}\r\n")),
        }
    }
    for (name, value) in headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if let Some(ua) = user_agent {
        if !headers.has("User-Agent") {
            head.push_str(&format!("User-Agent: {ua}\r\n"));
        }
    }
    let body = request.body();
    if let Some(body) = body {
        if !headers.has("Content-Length") && !headers.has("Transfer-Encoding") {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
    }
    if !headers.has("Connection") {
        head.push_str("Connection: close\r\n");
    }
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    if let Some(body) = body {
        out.extend_from_slice(body.as_bytes());
    }
    Ok(out)
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse a complete response head from the front of `buf`, consuming it.
///
/// Returns `Ok(None)` while the terminating empty line has not arrived yet;
/// bytes after the head (the start of the body) stay in `buf`.
pub(crate) fn parse_head(buf: &mut BytesMut) -> Result<Option<ResponseHead>, FetchError> {
    let Some(end) = find_head_end(buf) else {
        return Ok(None);
    };
    let raw = buf.split_to(end);
    buf.advance(4);

    let text = std::str::from_utf8(&raw)
        .map_err(|_| FetchError::Protocol("response head is not valid UTF-8".to_string()))?;
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (status, reason) = parse_status_line(status_line)?;

    let mut headers = Headers::new();
    for line in lines {
        if line.starts_with([' ', '\t']) {
            return Err(FetchError::Protocol(format!(
                "obsolete line folding in header block: {line:?}"
            )));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(FetchError::Protocol(format!("malformed header line {line:?}")));
        };
        if !is_token(name) {
            return Err(FetchError::Protocol(format!("malformed header line {line:?}")));
        }
        headers.append(name, value.trim());
    }

    Ok(Some(ResponseHead {
        status,
        reason,
        headers,
    }))
}

fn parse_status_line(line: &str) -> Result<(u16, String), FetchError> {
    let malformed = || FetchError::Protocol(format!("malformed status line {line:?}"));
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with("HTTP/") {
        return Err(malformed());
    }
    let code = parts.next().ok_or_else(malformed)?;
    if code.len() != 3 {
        return Err(malformed());
    }
    let status = code.parse::<u16>().map_err(|_| malformed())?;
    let reason = parts.next().unwrap_or_default().to_string();
    Ok((status, reason))
}
