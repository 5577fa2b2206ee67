//! Error types shared by the streaming library and the client binary.
//!
//! The `QuoteError` enum unifies configuration, transport, decoding and channel
//! failures so every crate in the workspace can propagate a single error type.
//! It is `Clone` because one failed connection attempt is reported to every
//! caller that was waiting on it.
use std::io;

use thiserror::Error;

/// Unified error type shared across the workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// No feed credential is configured. Never retried automatically.
    #[error("Feed credential is not configured")]
    MissingCredential,

    /// The feed endpoint could not be turned into a valid URL.
    #[error("Invalid feed endpoint: {0}")]
    InvalidEndpoint(String),

    /// Dial, handshake or socket failure talking to the feed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    Json(String),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// A symbol was empty or contained whitespace/control characters.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// Error while parsing a symbols file.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// The stream has been shut down and accepts no more work.
    #[error("Quote stream is shut down")]
    ShutDown,
}

impl QuoteError {
    /// Returns `true` for failures that the reconnect loop is expected to recover from.
    ///
    /// Configuration errors (`MissingCredential`, `InvalidEndpoint`) are not transient:
    /// callers should surface them as "feed unavailable" rather than "reconnecting".
    pub fn is_transient(&self) -> bool {
        matches!(self, QuoteError::Transport(_) | QuoteError::Io(_))
    }
}

impl From<io::Error> for QuoteError {
    fn from(err: io::Error) -> Self {
        QuoteError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for QuoteError {
    fn from(err: serde_json::Error) -> Self {
        QuoteError::Json(err.to_string())
    }
}
