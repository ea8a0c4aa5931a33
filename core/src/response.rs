//! Inbound response: status, headers, and a single-consumer body.
//!
//! # Design
//! The body moves through `Unread → Draining → Drained`, or `Unread →
//! Streaming` when the raw stream is borrowed, or `Taken` once the stream
//! has been moved out with `take_body`. Each decode method checks the
//! state and fails with `BodyUsed` on re-entry instead of returning empty
//! data. A drain whose future is dropped half way leaves the state at
//! `Draining`, so the response can never be decoded from a partial stream.
//!
//! `ok()` reports whether the connection completed normally. It is not
//! derived from the status code: a 404 or 500 with a complete body is `ok`,
//! and callers rely on that to read error bodies.

use bytes::{Bytes, BytesMut};
use log::trace;
use serde::de::DeserializeOwned;
use url::Url;

use crate::body::BodyStream;
use crate::error::FetchError;
use crate::headers::Headers;
use crate::http::ResponseHead;

#[derive(Debug)]
enum BodyState {
    Unread(BodyStream),
    Streaming(BodyStream),
    Taken,
    Draining,
    Drained,
}

/// A response whose head has arrived; the body is read on demand.
#[derive(Debug)]
pub struct Response {
    url: Url,
    status: u16,
    status_text: String,
    headers: Headers,
    body: BodyState,
    aborted: bool,
}

impl Response {
    pub(crate) fn new(url: Url, head: ResponseHead, body: BodyStream) -> Self {
        Self {
            url,
            status: head.status,
            status_text: head.reason,
            headers: head.headers,
            body: BodyState::Unread(body),
            aborted: false,
        }
    }

    /// Numeric status code exactly as received.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase from the status line (may be empty).
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// False only once the connection is known to have been cut before the
    /// body completed. Independent of the status code.
    pub fn ok(&self) -> bool {
        let stream_aborted = match &self.body {
            BodyState::Unread(s) | BodyState::Streaming(s) => s.is_aborted(),
            BodyState::Taken | BodyState::Draining | BodyState::Drained => false,
        };
        !(self.aborted || stream_aborted)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The URL that was requested. Redirects are not followed, so this is
    /// always the request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `Content-Length` as sent by the server, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("Content-Length")?.trim().parse().ok()
    }

    /// True once the body has been handed to any consumer.
    pub fn body_used(&self) -> bool {
        !matches!(self.body, BodyState::Unread(_))
    }

    /// Raw access to the body stream for incremental reading.
    ///
    /// Repeated calls return the same stream; once it has been taken, the
    /// decode methods fail with `BodyUsed`.
    pub fn body(&mut self) -> Result<&mut BodyStream, FetchError> {
        if let BodyState::Unread(_) = self.body {
            if let BodyState::Unread(stream) = std::mem::replace(&mut self.body, BodyState::Draining) {
                self.body = BodyState::Streaming(stream);
            }
        }
        match &mut self.body {
            BodyState::Streaming(stream) => Ok(stream),
            _ => Err(FetchError::BodyUsed),
        }
    }

    /// Move the body stream out of the response, leaving it used.
    ///
    /// Works on an unread body or one already borrowed with `body()`.
    /// Aborts seen after this are reported by the stream's `is_aborted`, not
    /// by `ok()`.
    pub fn take_body(&mut self) -> Result<BodyStream, FetchError> {
        match std::mem::replace(&mut self.body, BodyState::Taken) {
            BodyState::Unread(stream) | BodyState::Streaming(stream) => Ok(stream),
            other => {
                self.body = other;
                Err(FetchError::BodyUsed)
            }
        }
    }

    async fn drain(&mut self) -> Result<Bytes, FetchError> {
        let mut stream = match std::mem::replace(&mut self.body, BodyState::Draining) {
            BodyState::Unread(stream) => stream,
            other => {
                self.body = other;
                return Err(FetchError::BodyUsed);
            }
        };

        let mut buf = BytesMut::new();
        loop {
            match stream.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    self.aborted = stream.is_aborted();
                    self.body = BodyState::Drained;
                    return Err(e);
                }
            }
        }
        trace!("drained {} body bytes from {}", buf.len(), self.url);
        self.body = BodyState::Drained;
        Ok(buf.freeze())
    }

    /// The whole body as raw bytes.
    pub async fn array_buffer(&mut self) -> Result<Bytes, FetchError> {
        self.drain().await
    }

    /// The whole body as an owned byte vector.
    pub async fn bytes(&mut self) -> Result<Vec<u8>, FetchError> {
        Ok(self.drain().await?.to_vec())
    }

    /// The whole body decoded as UTF-8. Invalid sequences are replaced with
    /// U+FFFD rather than rejected.
    pub async fn text(&mut self) -> Result<String, FetchError> {
        let bytes = self.drain().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The whole body parsed as JSON into `T`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, FetchError> {
        let text = self.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Framing;
    use crate::error::ErrorKind;
    use serde::Deserialize;

    fn response(status: u16, headers: Headers, body: BodyStream) -> Response {
        let head = ResponseHead {
            status,
            reason: String::new(),
            headers,
        };
        Response::new(Url::parse("http://example.com/").unwrap(), head, body)
    }

    fn buffered(body: &[u8]) -> Response {
        let headers: Headers = [("Content-Length", body.len().to_string())].into();
        let framing = Framing::Length(body.len() as u64);
        response(200, headers, BodyStream::from_buffer(body, framing))
    }

    #[tokio::test]
    async fn array_buffer_returns_every_byte() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let mut res = buffered(png);
        let data = res.array_buffer().await.unwrap();
        assert_eq!(data.len() as u64, res.content_length().unwrap());
        assert_eq!(&data[1..4], b"PNG");
        assert!(res.ok());
    }

    #[tokio::test]
    async fn second_decode_fails_deterministically() {
        let mut res = buffered(b"YOU SHOULDN'T BE HERE");
        assert!(res.text().await.unwrap().contains("SHOULDN'T"));
        assert!(res.body_used());

        let err = res.text().await.unwrap_err();
        assert!(matches!(err, FetchError::BodyUsed));
        assert_eq!(err.kind(), ErrorKind::Stream);
        assert!(matches!(res.array_buffer().await, Err(FetchError::BodyUsed)));
        assert!(matches!(res.body(), Err(FetchError::BodyUsed)));
    }

    #[tokio::test]
    async fn json_parses_into_typed_values() {
        #[derive(Deserialize)]
        struct Slideshow {
            title: String,
        }
        #[derive(Deserialize)]
        struct Presentation {
            slideshow: Slideshow,
        }

        let mut res = buffered(br#"{"slideshow":{"title":"Sample Slide Show"}}"#);
        let data: Presentation = res.json().await.unwrap();
        assert_eq!(data.slideshow.title, "Sample Slide Show");
    }

    #[tokio::test]
    async fn json_on_plain_text_is_a_parse_error() {
        let mut res = buffered(b"not json at all");
        let err = res.json::<serde_json::Value>().await.unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Parse);
        // the body was consumed even though parsing failed
        assert!(res.body_used());
    }

    #[tokio::test]
    async fn text_replaces_invalid_utf8() {
        let mut res = buffered(b"ok \xff end");
        assert_eq!(res.text().await.unwrap(), "ok \u{fffd} end");
    }

    #[tokio::test]
    async fn error_statuses_are_still_ok() {
        for status in [400, 403, 404, 500, 502] {
            let mut res = response(
                status,
                Headers::new(),
                BodyStream::from_buffer(b"", Framing::Empty),
            );
            assert_eq!(res.status(), status);
            assert!(res.ok(), "status {status}");
            assert_eq!(res.text().await.unwrap(), "");
        }
    }

    #[tokio::test]
    async fn truncated_body_clears_ok() {
        let mut res = response(
            200,
            [("Content-Length", "100")].into(),
            BodyStream::from_buffer(b"only a few bytes", Framing::Length(100)),
        );
        assert!(res.ok());
        let err = res.array_buffer().await.unwrap_err();
        assert!(matches!(err, FetchError::Aborted));
        assert!(!res.ok());
        assert!(matches!(res.text().await, Err(FetchError::BodyUsed)));
    }

    #[tokio::test]
    async fn raw_stream_excludes_decoders() {
        let mut res = buffered(b"streamed");
        let first = res.body().unwrap().chunk().await.unwrap().unwrap();
        assert_eq!(&first[..], b"streamed");
        assert!(res.body().unwrap().chunk().await.unwrap().is_none());
        assert!(res.body().unwrap().is_finished());
        assert!(matches!(res.json::<serde_json::Value>().await, Err(FetchError::BodyUsed)));
    }

    #[tokio::test]
    async fn bytes_is_a_single_use_decoder() {
        let mut res = buffered(b"\x00\x01binary\xff");
        assert_eq!(res.bytes().await.unwrap(), b"\x00\x01binary\xff".to_vec());
        assert!(matches!(res.bytes().await, Err(FetchError::BodyUsed)));
        assert!(matches!(res.array_buffer().await, Err(FetchError::BodyUsed)));
    }

    #[tokio::test]
    async fn take_body_moves_the_stream_out() {
        let mut res = buffered(b"owned stream");
        let mut stream = res.take_body().unwrap();
        assert!(res.body_used());
        assert!(matches!(res.text().await, Err(FetchError::BodyUsed)));
        assert!(matches!(res.body(), Err(FetchError::BodyUsed)));
        assert!(matches!(res.take_body(), Err(FetchError::BodyUsed)));

        let chunk = stream.chunk().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"owned stream");
        assert!(stream.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_body_after_borrow_keeps_position() {
        let mut res = response(
            200,
            Headers::new(),
            BodyStream::from_buffer(b"3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n", Framing::Chunked),
        );
        let first = res.body().unwrap().chunk().await.unwrap().unwrap();
        assert_eq!(&first[..], b"abc");
        let mut stream = res.take_body().unwrap();
        let second = stream.chunk().await.unwrap().unwrap();
        assert_eq!(&second[..], b"def");
    }

    #[tokio::test]
    async fn take_body_after_decode_fails() {
        let mut res = buffered(b"gone");
        res.text().await.unwrap();
        let err = res.take_body().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Stream);
    }

    #[test]
    fn headers_lookup_ignores_case() {
        let res = response(
            200,
            [("Content-Type", "application/json")].into(),
            BodyStream::from_buffer(b"", Framing::Empty),
        );
        assert_eq!(res.headers().get("Content-Type"), res.headers().get("content-type"));
        assert_eq!(res.headers().get("content-TYPE").as_deref(), Some("application/json"));
    }
}
