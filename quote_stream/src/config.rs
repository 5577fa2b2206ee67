//! Stream configuration.
use std::env;
use std::fmt;
use std::time::Duration;

use quote_common::net::DEFAULT_ENDPOINT;

use crate::backoff::BackoffPolicy;

/// Environment variable overriding the feed endpoint.
pub const ENDPOINT_ENV: &str = "QUOTE_STREAM_ENDPOINT";
/// Environment variable carrying the feed credential.
pub const TOKEN_ENV: &str = "QUOTE_STREAM_TOKEN";

/// Settings for a [`QuoteStream`](crate::QuoteStream).
#[derive(Clone)]
pub struct StreamConfig {
    /// Websocket endpoint of the feed (`ws://` or `wss://`).
    pub endpoint: String,
    /// Feed credential, sent as the `token` query parameter.
    pub token: Option<String>,
    /// Reconnect attempts allowed after a disconnect before the stream goes inert.
    pub max_reconnect_attempts: u32,
    /// Unit delay fed to the backoff policy.
    pub reconnect_base_delay: Duration,
    /// Upper bound for any single reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Shape of the reconnect delay curve.
    pub backoff: BackoffPolicy,
    /// Bound on the TCP connect and on each read or write of the websocket handshake.
    pub connect_timeout: Duration,
    /// Socket read timeout; bounds how long an outbound directive waits for the I/O loop.
    pub read_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            backoff: BackoffPolicy::Linear,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl StreamConfig {
    /// Defaults overlaid with `QUOTE_STREAM_ENDPOINT` and `QUOTE_STREAM_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            config.endpoint = endpoint;
        }
        config.token = lookup(TOKEN_ENV);
        config
    }

    /// Sets the feed credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The credential, if one is configured and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Delay before the 1-based reconnect `attempt`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.backoff
            .delay(attempt, self.reconnect_base_delay, self.max_reconnect_delay)
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("backoff", &self.backoff)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
