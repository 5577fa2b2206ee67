//! Observable connection status.
use std::fmt;
use std::time::Duration;

/// Connection state as seen from outside the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and nothing to serve.
    Idle,
    /// A dial is in flight.
    Connecting,
    /// Connected; subscriptions are live.
    Open,
    /// Disconnected; the next attempt fires after `delay`.
    Reconnecting {
        /// 1-based attempt number since the last successful open.
        attempt: u32,
        /// Backoff delay before the attempt.
        delay: Duration,
    },
    /// Reconnect budget spent. Subscriptions stay registered but inert until
    /// [`QuoteStream::reconnect`](crate::QuoteStream::reconnect) or a new subscribe.
    Exhausted,
    /// The feed cannot be reached because of a configuration problem.
    Unavailable,
    /// The stream was shut down.
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => f.write_str("idle"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Open => f.write_str("open"),
            ConnectionStatus::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {} in {:?})", attempt, delay)
            }
            ConnectionStatus::Exhausted => f.write_str("reconnect attempts exhausted"),
            ConnectionStatus::Unavailable => f.write_str("feed unavailable"),
            ConnectionStatus::Closed => f.write_str("closed"),
        }
    }
}
