//! A small Fetch-style HTTP/1.1 client over tokio sockets.
//!
//! # Overview
//! Build a [`Request`], hand it to [`fetch`] (or [`Client::fetch`]), and get
//! back a [`Response`] as soon as the status line and headers have arrived.
//! The body stays on the wire until one of the decode methods
//! (`array_buffer`, `text`, `json`) or the raw [`BodyStream`] pulls it.
//!
//! # Design
//! - `http:` uses plain TCP, `https:` uses rustls; any other scheme fails at
//!   dispatch with `UnsupportedScheme`.
//! - [`Headers`] are matched case-insensitively but sent in the casing the
//!   caller used.
//! - Request bodies are sent as given: no content type is inferred.
//! - `Response::ok()` means the connection completed, not that the status
//!   was 2xx.
//! - Redirects are not followed and `Content-Encoding` is informational; the
//!   body is returned exactly as received.
//!
//! ```no_run
//! # async fn run() -> Result<(), fetch_lite::FetchError> {
//! use fetch_lite::{fetch, Request, RequestInit};
//!
//! let init = RequestInit::new()
//!     .method("POST")
//!     .header("Content-Type", "application/json")
//!     .body(r#"{"id":123,"name":"John Smith"}"#);
//! let mut response = fetch(Request::with_init("https://httpbin.org/post", init)?).await?;
//! let echoed: serde_json::Value = response.json().await?;
//! assert_eq!(echoed["json"]["id"], 123);
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;

pub use body::BodyStream;
pub use client::{fetch, Client};
pub use config::{ClientBuilder, ClientConfig};
pub use error::{ErrorKind, FetchError};
pub use headers::Headers;
pub use http::ResponseHead;
pub use request::{Body, Method, Request, RequestInit};
pub use response::Response;
pub use transport::Scheme;
