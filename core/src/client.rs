//! The dispatcher: turns a `Request` into a `Response` over a live connection.
//!
//! # Design
//! A call goes `CONNECTING → FAILED | RESPONDED`. `fetch` resolves as soon
//! as the response head has been parsed; the still-open connection moves
//! into the response body and is only read further when the caller decodes
//! it. Nothing is shared between calls except the TLS connector, so calls
//! may run concurrently.
//!
//! Redirects are returned as-is and content encodings are left untouched.

use std::sync::OnceLock;

use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_rustls::TlsConnector;

use crate::body::{BodyStream, Framing};
use crate::config::{ClientBuilder, ClientConfig};
use crate::error::FetchError;
use crate::http::{encode_request, parse_head, ResponseHead};
use crate::request::Request;
use crate::response::Response;
use crate::transport::{default_connector, Connection, Scheme, Transport};

const READ_CHUNK: usize = 8192;

/// Sends requests. Cheap to clone; holds only configuration and the TLS
/// connector.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    connector: TlsConnector,
}

impl Default for Client {
    fn default() -> Self {
        Self::with_config(ClientConfig::default())
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            connector: default_connector(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` and wait for the response head.
    ///
    /// Fails with `UnsupportedScheme` for anything but `http:`/`https:`,
    /// with `InvalidHeader` when a header edited after construction cannot be
    /// sent, and with a transport error (naming the host) when the peer
    /// cannot be reached. A configured `connect_timeout` bounds everything up
    /// to the response head and fails with `Timeout`. Status codes never
    /// cause a failure.
    pub async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let url = request.url();
        let scheme = Scheme::from_url(url)?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::Protocol(format!("URL {url} has no host")))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let transport = Transport::for_scheme(scheme, &self.connector);
        let connecting = self.exchange(&request, &transport, &host, port);
        let (conn, buf, head) = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| FetchError::Timeout { host: host.clone() })??,
            None => connecting.await?,
        };
        debug!("{} {} -> {} {}", request.method(), url, head.status, head.reason);

        let framing = Framing::for_response(request.method(), head.status, &head.headers)?;
        let body = BodyStream::new(conn, buf, framing);
        Ok(Response::new(url.clone(), head, body))
    }

    /// The CONNECTING phase: connect, send the request, read the final head.
    async fn exchange(
        &self,
        request: &Request,
        transport: &Transport,
        host: &str,
        port: u16,
    ) -> Result<(Connection, BytesMut, ResponseHead), FetchError> {
        let wire = encode_request(request, self.config.user_agent.as_deref())?;
        let mut conn = transport.connect(host, port).await?;
        conn.write_all(&wire).await?;
        conn.flush().await?;
        debug!("{} {} sent ({} bytes)", request.method(), request.url(), wire.len());

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let head = read_head(&mut conn, &mut buf, self.config.max_head_size).await?;
        Ok((conn, buf, head))
    }
}

/// Read until a final (non-1xx) response head is complete. Interim heads
/// such as `100 Continue` are skipped; `101` is returned like a final one.
async fn read_head(
    conn: &mut Connection,
    buf: &mut BytesMut,
    max_head_size: usize,
) -> Result<ResponseHead, FetchError> {
    loop {
        if let Some(head) = parse_head(buf)? {
            if (100..200).contains(&head.status) && head.status != 101 {
                debug!("skipping interim response {}", head.status);
                continue;
            }
            return Ok(head);
        }
        if buf.len() > max_head_size {
            return Err(FetchError::Protocol(format!(
                "response head exceeds {max_head_size} bytes"
            )));
        }
        buf.reserve(READ_CHUNK);
        if conn.read_buf(buf).await? == 0 {
            return Err(FetchError::Protocol(
                "connection closed before the response head was complete".to_string(),
            ));
        }
    }
}

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

/// Send `request` with a shared default [`Client`].
pub async fn fetch(request: Request) -> Result<Response, FetchError> {
    DEFAULT_CLIENT.get_or_init(Client::new).fetch(request).await
}
