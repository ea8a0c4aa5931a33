//! Error types for the fetch client.
//!
//! # Design
//! One enum covers the whole lifecycle of a call: building the request,
//! reaching the peer, reading the response head, and draining the body.
//! `kind()` groups the variants so callers can branch on the failure class
//! without matching every variant. Transport variants keep the host name in
//! their message because callers match on it.

use std::io;

use thiserror::Error;

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be described (bad URL, header, method or scheme).
    Construction,
    /// Resolving, connecting, handshaking, or exchanging bytes failed.
    Transport,
    /// The call was cut short by a configured timeout.
    Cancelled,
    /// A body decode was attempted on a stream that is no longer readable.
    Stream,
    /// The body text was not valid JSON.
    Parse,
}

/// Errors returned by `fetch` and by the `Response` decode methods.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?}, expected http: or https:")]
    UnsupportedScheme(String),

    /// A header name is not a token, or its value holds CR, LF or NUL.
    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("invalid request method {0:?}")]
    InvalidMethod(String),

    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for a response from {host}")]
    Timeout { host: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed response: {0}")]
    Protocol(String),

    /// The body was already consumed, handed out, or its drain was interrupted.
    #[error("response body already used")]
    BodyUsed,

    /// The peer closed the connection before the framed body was complete.
    #[error("connection aborted before the response body completed")]
    Aborted,

    #[error("failed to parse response body as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl { .. }
            | FetchError::UnsupportedScheme(_)
            | FetchError::InvalidHeader { .. }
            | FetchError::InvalidMethod(_) => ErrorKind::Construction,
            FetchError::Resolve { .. }
            | FetchError::Connect { .. }
            | FetchError::Tls { .. }
            | FetchError::Io(_)
            | FetchError::Protocol(_) => ErrorKind::Transport,
            FetchError::Timeout { .. } => ErrorKind::Cancelled,
            FetchError::BodyUsed | FetchError::Aborted => ErrorKind::Stream,
            FetchError::Json(_) => ErrorKind::Parse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_names_the_host() {
        let err = FetchError::Resolve {
            host: "nowhere.invalid".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "Name or service not known"),
        };
        let msg = err.to_string();
        assert!(msg.contains("nowhere.invalid"), "{msg}");
        assert!(msg.contains("Name or service not known"), "{msg}");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn kinds_follow_the_failure_class() {
        assert_eq!(FetchError::UnsupportedScheme("ftp:".into()).kind(), ErrorKind::Construction);
        assert_eq!(
            FetchError::InvalidHeader { name: "X-Note".into() }.kind(),
            ErrorKind::Construction
        );
        assert_eq!(FetchError::InvalidMethod("GET /".into()).kind(), ErrorKind::Construction);
        assert_eq!(FetchError::BodyUsed.kind(), ErrorKind::Stream);
        assert_eq!(FetchError::Aborted.kind(), ErrorKind::Stream);
        assert_eq!(FetchError::Timeout { host: "h".into() }.kind(), ErrorKind::Cancelled);

        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        assert_eq!(FetchError::from(json_err).kind(), ErrorKind::Parse);
    }

    #[test]
    fn stream_and_transport_errors_are_distinct() {
        let io_err = FetchError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_ne!(io_err.kind(), FetchError::BodyUsed.kind());
    }
}
