//! JSON envelopes exchanged with the streaming feed.
//!
//! Outbound traffic consists of small control `Directive`s:
//! `{"type":"subscribe","symbol":"AAPL"}`. Inbound traffic is an `InboundFrame`,
//! most often a `trade` batch whose `data` array may carry updates for several
//! symbols at once. Batch elements are kept as raw JSON values so each one can be
//! decoded on its own and a single bad element does not spoil the batch.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::Result;
use crate::symbol::Symbol;

/// Outbound control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Directive {
    /// Start streaming trades for `symbol`.
    Subscribe {
        /// Instrument to subscribe to.
        symbol: Symbol,
    },
    /// Stop streaming trades for `symbol`.
    Unsubscribe {
        /// Instrument to unsubscribe from.
        symbol: Symbol,
    },
}

impl Directive {
    /// Encodes the directive as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound message envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Batch of trade updates, possibly for several symbols.
    Trade {
        /// Undecoded batch elements; see [`Trade::decode`].
        #[serde(default)]
        data: Option<Vec<Value>>,
    },
    /// Keep-alive sent by the feed.
    Ping,
    /// Error reported by the feed (bad symbol, rate limit, ...).
    Error {
        /// Human-readable message from the feed.
        #[serde(default)]
        msg: String,
    },
    /// Any other message type.
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    /// Decodes a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Single trade update delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Instrument symbol as reported by the feed.
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Event timestamp in milliseconds since the UNIX epoch (0 when absent).
    pub timestamp: u64,
    /// Traded volume, when the feed provides it.
    pub volume: Option<f64>,
    /// Trade condition codes, when the feed provides them.
    pub conditions: Vec<String>,
}

/// Wire shape of one element of a `trade` batch.
#[derive(Debug, Deserialize)]
struct RawTrade {
    s: String,
    p: f64,
    #[serde(default)]
    t: u64,
    #[serde(default)]
    v: Option<f64>,
    #[serde(default)]
    c: Option<Vec<String>>,
}

impl Trade {
    /// Decodes one element of a `trade` batch.
    pub fn decode(value: Value) -> Result<Self> {
        let raw: RawTrade = serde_json::from_value(value)?;
        Ok(Trade {
            symbol: raw.s,
            price: raw.p,
            timestamp: raw.t,
            volume: raw.v,
            conditions: raw.c.unwrap_or_default(),
        })
    }
}
