//! Plaintext and TLS transports, selected by URL scheme.
//!
//! Only two schemes exist, so both the transport and the resulting
//! connection are closed enums rather than trait objects.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use url::Url;

use crate::error::FetchError;

/// Supported URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_url(url: &Url) -> Result<Self, FetchError> {
        match url.scheme() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(FetchError::UnsupportedScheme(format!("{other}:"))),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// TLS client config with Mozilla roots, advertising HTTP/1.1 only.
fn tls_client_config() -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

pub(crate) fn default_connector() -> TlsConnector {
    DEFAULT_CONNECTOR
        .get_or_init(|| TlsConnector::from(tls_client_config()))
        .clone()
}

/// How to reach the peer for a given scheme.
#[derive(Clone)]
pub(crate) enum Transport {
    Plain,
    Tls(TlsConnector),
}

impl Transport {
    pub(crate) fn for_scheme(scheme: Scheme, connector: &TlsConnector) -> Self {
        match scheme {
            Scheme::Http => Transport::Plain,
            Scheme::Https => Transport::Tls(connector.clone()),
        }
    }

    /// Resolve `host`, connect to the first address that accepts, and run the
    /// TLS handshake when needed.
    pub(crate) async fn connect(&self, host: &str, port: u16) -> Result<Connection, FetchError> {
        // url keeps IPv6 literals bracketed
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        let tcp = connect_tcp(host, bare, port).await?;
        match self {
            Transport::Plain => Ok(Connection::Plain(tcp)),
            Transport::Tls(connector) => {
                let server_name = ServerName::try_from(bare.to_string()).map_err(|e| {
                    FetchError::Tls {
                        host: host.to_string(),
                        source: io::Error::new(io::ErrorKind::InvalidInput, e),
                    }
                })?;
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|source| FetchError::Tls {
                        host: host.to_string(),
                        source,
                    })?;
                trace!("TLS handshake with {host} complete");
                Ok(Connection::Tls(Box::new(tls)))
            }
        }
    }
}

async fn connect_tcp(host: &str, bare: &str, port: u16) -> Result<TcpStream, FetchError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|source| FetchError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(FetchError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        });
    }

    let mut last_err = None;
    for addr in addrs {
        debug!("connecting to {host} at {addr}");
        match TcpStream::connect(addr).await {
            Ok(tcp) => {
                tcp.set_nodelay(true)?;
                return Ok(tcp);
            }
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(FetchError::Connect {
        host: host.to_string(),
        port,
        source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)),
    })
}

/// An open byte stream to the peer.
pub(crate) enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peer = match self {
            Connection::Plain(s) => s.peer_addr(),
            Connection::Tls(s) => s.get_ref().0.peer_addr(),
        };
        let kind = match self {
            Connection::Plain(_) => "plain",
            Connection::Tls(_) => "tls",
        };
        f.debug_struct("Connection")
            .field("kind", &kind)
            .field("peer", &peer.ok())
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_flush(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
