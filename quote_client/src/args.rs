//! Command-line arguments for the Quote Client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use quote_common::net::DEFAULT_ENDPOINT;
use quote_common::symbol::SymbolParser;
use quote_common::{QuoteError, Result, Symbol};
use quote_stream::{BackoffPolicy, StreamConfig};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Symbols to stream, comma separated (e.g. `AAPL,MSFT,BINANCE:BTCUSDT`).
    #[clap(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Path to a text file with symbols to subscribe to.
    /// Symbols may be separated by commas, spaces, or new lines.
    #[clap(long)]
    pub path: Option<String>,

    /// Feed credential, sent as the `token` query parameter.
    #[clap(long, env = "QUOTE_STREAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Websocket endpoint of the feed.
    #[clap(long, env = "QUOTE_STREAM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Reconnect attempts after a disconnect before giving up.
    #[clap(long, default_value_t = 5)]
    pub max_reconnect_attempts: u32,

    /// Base reconnect delay in milliseconds.
    #[clap(long, default_value_t = 1000)]
    pub base_delay_ms: u64,

    /// Reconnect delay curve.
    #[clap(long, value_enum, default_value_t = BackoffPolicy::Linear)]
    pub backoff: BackoffPolicy,

    /// Bound on the TCP connect and websocket handshake, in milliseconds.
    #[clap(long, default_value_t = 10_000)]
    pub connect_timeout_ms: u64,
}

impl Args {
    /// Symbols from `--symbols` followed by those from `--path`, without duplicates.
    pub fn collect_symbols(&self) -> Result<Vec<Symbol>> {
        let mut symbols = Vec::new();
        for raw in self.symbols.iter().filter(|s| !s.trim().is_empty()) {
            let symbol = Symbol::parse(raw)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        if let Some(path) = &self.path {
            let file_path = normalize_path(path);
            if !is_file_exist(&file_path) {
                return Err(QuoteError::ParseSymbolsFile(format!(
                    "{} is not a file",
                    file_path.display()
                )));
            }
            let reader = BufReader::new(File::open(&file_path)?);
            for symbol in Symbol::parse_from_file(reader)? {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }

    /// Stream settings derived from the arguments.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay: Duration::from_millis(self.base_delay_ms),
            backoff: self.backoff,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ..StreamConfig::default()
        }
    }
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}
