//!
//! Common types and utilities shared by the streaming library and the client.
//!
//! This crate aggregates:
//! - `error` — unified error type `QuoteError` used across the workspace.
//! - `result` — handy `Result<T, QuoteError>` alias.
//! - `symbol` — instrument symbols and symbol-list parsing.
//! - `wire` — JSON envelopes exchanged with the market-data feed.
//! - `net` — feed endpoint constants and URL helpers.
#![warn(missing_docs)]
pub mod error;
pub mod net;
pub mod result;
pub mod symbol;
pub mod wire;

pub use error::QuoteError;
pub use result::Result;
pub use symbol::Symbol;
pub use wire::{Directive, InboundFrame, Trade};
