//! Inbound body framing and the raw body stream.
//!
//! `Decoder` is a pull-style state machine over a byte buffer: it yields body
//! data as it becomes available and reports `NeedMore` when the buffer runs
//! dry. `BodyStream` pairs it with the live connection.

use std::fmt;
use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncReadExt;

use crate::error::FetchError;
use crate::headers::Headers;
use crate::request::Method;
use crate::transport::Connection;

const MAX_CHUNK_LINE: usize = 4096;
const READ_CHUNK: usize = 8192;

/// How the end of a response body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl Framing {
    pub(crate) fn for_response(
        method: &Method,
        status: u16,
        headers: &Headers,
    ) -> Result<Self, FetchError> {
        if *method == Method::Head || (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(Framing::Empty);
        }
        let chunked = headers
            .get_all("Transfer-Encoding")
            .iter()
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(Framing::Chunked);
        }
        let mut length = None;
        for value in headers.get_all("Content-Length") {
            let n = value.trim().parse::<u64>().map_err(|_| {
                FetchError::Protocol(format!("invalid Content-Length {value:?}"))
            })?;
            if length.is_some_and(|prev| prev != n) {
                return Err(FetchError::Protocol("conflicting Content-Length values".to_string()));
            }
            length = Some(n);
        }
        Ok(match length {
            Some(0) => Framing::Empty,
            Some(n) => Framing::Length(n),
            None => Framing::UntilClose,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Length(u64),
    UntilClose,
    ChunkSize,
    ChunkData(u64),
    ChunkDataEnd,
    Trailer,
    Done,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Data(Bytes),
    NeedMore,
    Done,
}

#[derive(Debug)]
pub(crate) struct Decoder {
    state: State,
}

impl Decoder {
    pub(crate) fn new(framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty => State::Done,
            Framing::Length(n) => State::Length(n),
            Framing::Chunked => State::ChunkSize,
            Framing::UntilClose => State::UntilClose,
        };
        Self { state }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Take the next piece of body data out of `buf`.
    pub(crate) fn decode(&mut self, buf: &mut BytesMut) -> Result<Step, FetchError> {
        loop {
            match self.state {
                State::Done => return Ok(Step::Done),
                State::Length(0) => self.state = State::Done,
                State::Length(remaining) => {
                    if buf.is_empty() {
                        return Ok(Step::NeedMore);
                    }
                    let n = remaining.min(buf.len() as u64) as usize;
                    self.state = State::Length(remaining - n as u64);
                    return Ok(Step::Data(buf.split_to(n).freeze()));
                }
                State::UntilClose => {
                    if buf.is_empty() {
                        return Ok(Step::NeedMore);
                    }
                    return Ok(Step::Data(buf.split().freeze()));
                }
                State::ChunkSize => {
                    let Some(line) = take_line(buf)? else {
                        return Ok(Step::NeedMore);
                    };
                    let size = line.split(';').next().unwrap_or_default().trim();
                    let size = u64::from_str_radix(size, 16).map_err(|_| {
                        FetchError::Protocol(format!("invalid chunk size {size:?}"))
                    })?;
                    self.state = if size == 0 { State::Trailer } else { State::ChunkData(size) };
                }
                State::ChunkData(remaining) => {
                    if buf.is_empty() {
                        return Ok(Step::NeedMore);
                    }
                    let n = remaining.min(buf.len() as u64) as usize;
                    let left = remaining - n as u64;
                    self.state = if left == 0 { State::ChunkDataEnd } else { State::ChunkData(left) };
                    return Ok(Step::Data(buf.split_to(n).freeze()));
                }
                State::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(Step::NeedMore);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(FetchError::Protocol("chunk not terminated by CRLF".to_string()));
                    }
                    buf.advance(2);
                    self.state = State::ChunkSize;
                }
                State::Trailer => {
                    let Some(line) = take_line(buf)? else {
                        return Ok(Step::NeedMore);
                    };
                    // trailer fields are discarded
                    if line.is_empty() {
                        self.state = State::Done;
                    }
                }
            }
        }
    }

    /// The peer closed the connection; decide whether the body was complete.
    pub(crate) fn finish(&mut self) -> Result<(), FetchError> {
        match self.state {
            State::Done | State::Length(0) => {}
            State::UntilClose => {}
            _ => return Err(FetchError::Aborted),
        }
        self.state = State::Done;
        Ok(())
    }
}

/// Split one CRLF-terminated line off `buf`, without the terminator.
fn take_line(buf: &mut BytesMut) -> Result<Option<String>, FetchError> {
    let Some(end) = buf.windows(2).position(|w| w == b"\r\n") else {
        if buf.len() > MAX_CHUNK_LINE {
            return Err(FetchError::Protocol("chunk line too long".to_string()));
        }
        return Ok(None);
    };
    let line = buf.split_to(end);
    buf.advance(2);
    String::from_utf8(line.to_vec())
        .map(Some)
        .map_err(|_| FetchError::Protocol("chunk line is not valid UTF-8".to_string()))
}

/// The raw inbound body: yields chunks in arrival order until the framed
/// body ends. The connection is released as soon as the body is complete.
pub struct BodyStream {
    conn: Option<Connection>,
    buf: BytesMut,
    decoder: Decoder,
    aborted: bool,
}

impl BodyStream {
    pub(crate) fn new(conn: Connection, buf: BytesMut, framing: Framing) -> Self {
        let decoder = Decoder::new(framing);
        let conn = if decoder.is_done() { None } else { Some(conn) };
        Self {
            conn,
            buf,
            decoder,
            aborted: false,
        }
    }

    /// A stream over bytes already in memory, with no peer behind it.
    #[cfg(test)]
    pub(crate) fn from_buffer(buf: &[u8], framing: Framing) -> Self {
        Self {
            conn: None,
            buf: BytesMut::from(buf),
            decoder: Decoder::new(framing),
            aborted: false,
        }
    }

    /// Next chunk of body data, or `None` once the body is complete.
    ///
    /// Fails with [`FetchError::Aborted`] if the peer goes away before the
    /// framed length (or the final chunk) arrived.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let result = self.next_chunk().await;
        if matches!(result, Err(FetchError::Aborted)) {
            self.aborted = true;
        }
        result
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        loop {
            match self.decoder.decode(&mut self.buf)? {
                Step::Data(data) => return Ok(Some(data)),
                Step::Done => {
                    self.conn = None;
                    return Ok(None);
                }
                Step::NeedMore => {}
            }
            let Some(conn) = self.conn.as_mut() else {
                self.decoder.finish()?;
                return Ok(None);
            };
            self.buf.reserve(READ_CHUNK);
            let read = match conn.read_buf(&mut self.buf).await {
                Ok(n) => n,
                // rustls reports a close without close_notify this way
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
                Err(e) if is_abort(&e) => {
                    self.conn = None;
                    return Err(FetchError::Aborted);
                }
                Err(e) => return Err(e.into()),
            };
            if read == 0 {
                self.conn = None;
                self.decoder.finish()?;
                return Ok(None);
            }
        }
    }

    /// True once every body byte has been handed out.
    pub fn is_finished(&self) -> bool {
        self.decoder.is_done()
    }

    /// True if the peer went away before the body completed.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

fn is_abort(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("state", &self.decoder.state)
            .field("buffered", &self.buf.len())
            .field("connected", &self.conn.is_some())
            .field("aborted", &self.aborted)
            .finish()
    }
}
