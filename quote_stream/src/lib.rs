//! Live quote streaming client.
//!
//! `QuoteStream` multiplexes many symbol subscriptions over one websocket to a
//! market-data feed. The connection is opened lazily on the first subscribe,
//! shared by every caller that asks for it while it is being established, and
//! re-established with bounded backoff after a disconnect. Subscriptions live in
//! a registry that outlives the socket and is replayed on every (re)connect.
//!
//! ```no_run
//! use quote_stream::{QuoteStream, StreamConfig};
//!
//! let stream = QuoteStream::new(StreamConfig::from_env())?;
//! stream.subscribe_price("AAPL", |price| println!("AAPL {:.2}", price))?;
//! # Ok::<(), quote_common::QuoteError>(())
//! ```
//!
//! Modules:
//! - `supervisor` — the worker owning connection lifecycle, backoff and replay.
//! - `registry` — symbol → callback map and inbound frame dispatch.
//! - `transport` / `ws` — the `Connector` seam and its websocket implementation.
//! - `config`, `backoff`, `status` — settings and observable state.
#![warn(missing_docs)]
pub mod backoff;
pub mod config;
mod registry;
pub mod status;
mod supervisor;
pub mod transport;
pub mod ws;

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use quote_common::{QuoteError, Result, Symbol, Trade};

pub use backoff::BackoffPolicy;
pub use config::StreamConfig;
pub use status::ConnectionStatus;
pub use transport::{Connector, Link, LinkEvents};
pub use ws::WsConnector;

use supervisor::{Op, Supervisor};

/// Handle to a live quote stream.
///
/// The handle is `Send + Sync`; share it behind an `Arc`. Callbacks run on the
/// stream's worker thread, in feed order. They may call [`subscribe`](Self::subscribe)
/// and [`unsubscribe`](Self::unsubscribe) but must not call the blocking methods.
pub struct QuoteStream {
    ops: Sender<Op>,
    status: Arc<Mutex<ConnectionStatus>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QuoteStream {
    /// Creates a stream that talks to the feed over websockets.
    pub fn new(config: StreamConfig) -> Result<Self> {
        let connector = WsConnector::new(config.connect_timeout, config.read_timeout);
        Self::with_connector(config, connector)
    }

    /// Creates a stream on top of a custom transport.
    pub fn with_connector(config: StreamConfig, connector: impl Connector) -> Result<Self> {
        let (ops_tx, ops_rx) = unbounded();
        let status = Arc::new(Mutex::new(ConnectionStatus::Idle));
        let supervisor = Supervisor::new(
            config,
            Arc::new(connector),
            ops_tx.clone(),
            Arc::clone(&status),
        );
        let worker = thread::Builder::new()
            .name("quote-stream".to_string())
            .spawn(move || supervisor.run(ops_rx))?;

        Ok(Self {
            ops: ops_tx,
            status,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Registers `on_update` for `symbol`, replacing any earlier callback for it,
    /// and makes sure a connection exists or is being established.
    ///
    /// The registration takes effect immediately. The returned ticket reports the
    /// outcome of the connection attempt; dropping it is fine. A failed attempt does
    /// not undo the registration, so a later reconnect still serves the symbol.
    pub fn subscribe<F>(&self, symbol: impl AsRef<str>, on_update: F) -> Result<ConnectTicket>
    where
        F: FnMut(&Trade) + Send + 'static,
    {
        let symbol = Symbol::parse(symbol.as_ref())?;
        let (reply, ticket) = bounded(1);
        self.post(Op::Subscribe {
            symbol,
            callback: Box::new(on_update),
            reply,
        });
        Ok(ConnectTicket { rx: ticket })
    }

    /// Like [`subscribe`](Self::subscribe), delivering only the traded price.
    pub fn subscribe_price<F>(
        &self,
        symbol: impl AsRef<str>,
        mut on_price: F,
    ) -> Result<ConnectTicket>
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.subscribe(symbol, move |trade: &Trade| on_price(trade.price))
    }

    /// Drops interest in `symbol`. Idempotent; invalid symbols are ignored.
    pub fn unsubscribe(&self, symbol: impl AsRef<str>) {
        match Symbol::parse(symbol.as_ref()) {
            Ok(symbol) => self.post(Op::Unsubscribe { symbol }),
            Err(e) => debug!("Ignoring unsubscribe: {}", e),
        }
    }

    /// Blocks until a connection is open, joining an in-flight attempt if there
    /// is one.
    pub fn ensure_connected(&self) -> Result<()> {
        let (reply, rx) = bounded(1);
        self.post(Op::EnsureConnected { reply });
        ConnectTicket { rx }.wait()
    }

    /// Resets the reconnect budget and connects. Revives an exhausted stream.
    pub fn reconnect(&self) -> Result<()> {
        let (reply, rx) = bounded(1);
        self.post(Op::Reconnect { reply });
        ConnectTicket { rx }.wait()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs a listener for status transitions. It is called once right away
    /// with the current status, then on every change, on the worker thread.
    pub fn on_status<F>(&self, listener: F)
    where
        F: FnMut(&ConnectionStatus) + Send + 'static,
    {
        self.post(Op::SetStatusListener(Box::new(listener)));
    }

    /// Closes the connection, clears every subscription and stops the worker.
    ///
    /// Safe to call more than once. Called from a callback it stops the worker
    /// without waiting for it.
    pub fn shutdown(&self) {
        let _ = self.ops.send(Op::Shutdown);
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("Quote stream worker panicked");
            }
        }
    }

    fn post(&self, op: Op) {
        if self.ops.send(op).is_err() {
            debug!("Quote stream is shut down; request dropped");
        }
    }
}

impl Drop for QuoteStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Outcome of the connection attempt triggered by a subscribe.
#[derive(Debug)]
pub struct ConnectTicket {
    rx: Receiver<Result<()>>,
}

impl ConnectTicket {
    /// Blocks until the connection attempt resolves.
    pub fn wait(self) -> Result<()> {
        self.rx.recv().unwrap_or(Err(QuoteError::ShutDown))
    }

    /// Waits at most `timeout`. Returns `None` if the attempt is still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(QuoteError::ShutDown)),
        }
    }
}
