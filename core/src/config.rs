//! Client settings.

use std::time::Duration;

/// Largest response head (status line plus headers) accepted by default.
pub const DEFAULT_MAX_HEAD_SIZE: usize = 64 * 1024;

/// Settings shared by every request a [`Client`](crate::Client) sends.
///
/// The defaults add nothing to the wire beyond what HTTP/1.1 requires and
/// never time out.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Limit on the whole connecting phase: resolving, connecting, the TLS
    /// handshake, sending the request and reading the response head. Body
    /// reads are not covered.
    pub connect_timeout: Option<Duration>,
    /// Sent as `User-Agent` when the request does not carry one.
    pub user_agent: Option<String>,
    pub max_head_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            user_agent: None,
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
        }
    }
}

/// Builder for [`Client`](crate::Client).
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn max_head_size(mut self, bytes: usize) -> Self {
        self.config.max_head_size = bytes;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build(self) -> crate::Client {
        crate::Client::with_config(self.config)
    }
}
