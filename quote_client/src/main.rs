//! Quote Client — streams live trade prices for a list of symbols from a websocket
//! market-data feed and logs every update. Symbols come from `--symbols` and/or a
//! text file; the connection, reconnects and resubscription are handled by
//! `quote_stream::QuoteStream`.
//!
//! Usage example (CLI):
//! ```bash
//! QUOTE_STREAM_TOKEN=... quote_client --symbols AAPL,MSFT --path ./tickers.txt
//! ```
//!
//! The symbol file should contain symbols separated by commas, spaces, or new lines.
#![warn(missing_docs)]
mod args;

use std::time::Duration;

use crate::args::Args;
use chrono::{DateTime, Utc};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use log::{error, info, warn};
use quote_common::{QuoteError, Result, Trade};
use quote_stream::{ConnectTicket, QuoteStream};

/// How often the wait for the first connection checks for Ctrl+C.
const STOP_POLL: Duration = Duration::from_millis(200);

fn main() -> Result<(), QuoteError> {
    init_logger();
    let args = Args::parse();

    let symbols = args.collect_symbols()?;
    if symbols.is_empty() {
        error!("No symbols given. Use --symbols or --path.");
        return Err(QuoteError::ParseSymbolsFile("no symbols given".to_string()));
    }
    info!("Symbols: {:?}", symbols);

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down client...");
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| QuoteError::Io(format!("Error setting Ctrl+C handler: {}", e)))?;

    let stream = QuoteStream::new(args.stream_config())?;
    stream.on_status(|status| info!("Feed status: {}", status));
    let mut tickets = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        tickets.push(stream.subscribe(symbol, log_trade)?);
    }

    // Every subscribe joins the same connection attempt; the first ticket speaks for all.
    match tickets.first().and_then(|ticket| wait_for_feed(ticket, &stop_rx)) {
        Some(Ok(())) => info!("Streaming {} symbols. Press Ctrl+C to exit.", symbols.len()),
        Some(Err(e)) if !e.is_transient() => {
            error!("Feed unavailable: {}", e);
            stream.shutdown();
            return Err(e);
        }
        Some(Err(e)) => warn!("Initial connection failed ({}); retrying in the background", e),
        None => {
            stream.shutdown();
            info!("Client stopped before the feed connected");
            return Ok(());
        }
    }

    if stop_rx.recv().is_err() {
        warn!("Ctrl+C handler dropped");
    }
    stream.shutdown();
    info!("Client stopped");
    Ok(())
}

/// Waits for the connection attempt behind `ticket`. Returns `None` if Ctrl+C
/// arrives first.
fn wait_for_feed(ticket: &ConnectTicket, stop_rx: &Receiver<()>) -> Option<Result<()>> {
    loop {
        if let Some(result) = ticket.wait_timeout(STOP_POLL) {
            return Some(result);
        }
        if stop_rx.try_recv().is_ok() {
            return None;
        }
    }
}

fn log_trade(trade: &Trade) {
    let time = i64::try_from(trade.timestamp)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| trade.timestamp.to_string());
    let volume = trade
        .volume
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(
        "QUOTE: {} Price={:.2} Volume={} Time={}",
        trade.symbol, trade.price, volume, time
    );
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
