//! Connection supervisor.
//!
//! One worker thread owns every piece of mutable state: the subscription
//! registry, the connection handle, the reconnect counter, the callers waiting on
//! an in-flight dial and the backoff timer. Caller requests and transport events
//! share a single FIFO channel, so the worker sees them in one linear order. That
//! order is what makes "subscribe then unsubscribe before the socket opens" leave
//! no trace on the wire: both requests are handled before the open event.
//!
//! Lifecycle:
//! - `Absent → Connecting` on demand (a subscribe, `ensure_connected`, or the
//!   backoff timer). Callers arriving while `Connecting` attach to the same dial.
//! - `Connecting → Open` when the dial succeeds: the counter resets, every
//!   registered symbol is replayed once, then the waiters are released.
//! - `Open → Absent` on an unexpected close, and `Connecting → Absent` on a failed
//!   dial. Both arm the backoff timer while subscriptions exist and the attempt
//!   budget lasts; after that the stream stays inert with its registry intact.
//! - Any state ends on `Op::Shutdown`.
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{never, select, after, Receiver, Sender};
use log::{debug, error, info, warn};
use quote_common::net::feed_url;
use quote_common::wire::Directive;
use quote_common::{QuoteError, Result, Symbol};

use crate::config::StreamConfig;
use crate::registry::{Callback, Registry};
use crate::status::ConnectionStatus;
use crate::transport::{Connector, Link, LinkEvents};

/// Reply channel for a caller waiting on a connection.
pub(crate) type Waiter = Sender<Result<()>>;
/// Listener notified of every status transition.
pub(crate) type StatusListener = Box<dyn FnMut(&ConnectionStatus) + Send>;

/// Everything the worker reacts to: caller requests and transport events.
pub(crate) enum Op {
    Subscribe {
        symbol: Symbol,
        callback: Callback,
        reply: Waiter,
    },
    Unsubscribe {
        symbol: Symbol,
    },
    EnsureConnected {
        reply: Waiter,
    },
    Reconnect {
        reply: Waiter,
    },
    SetStatusListener(StatusListener),
    Shutdown,
    Dialed {
        generation: u64,
        result: Result<Box<dyn Link>>,
    },
    Frame {
        generation: u64,
        text: String,
    },
    Closed {
        generation: u64,
    },
}

enum LinkState {
    Absent,
    Connecting {
        generation: u64,
        waiters: Vec<Waiter>,
        closed_early: bool,
    },
    Open {
        generation: u64,
        link: Box<dyn Link>,
    },
}

pub(crate) struct Supervisor {
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    ops_tx: Sender<Op>,
    registry: Registry,
    state: LinkState,
    reconnect_attempts: u32,
    next_generation: u64,
    retry_timer: Receiver<Instant>,
    status: Arc<Mutex<ConnectionStatus>>,
    listener: Option<StatusListener>,
}

impl Supervisor {
    pub(crate) fn new(
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        ops_tx: Sender<Op>,
        status: Arc<Mutex<ConnectionStatus>>,
    ) -> Self {
        Self {
            config,
            connector,
            ops_tx,
            registry: Registry::default(),
            state: LinkState::Absent,
            reconnect_attempts: 0,
            next_generation: 0,
            retry_timer: never(),
            status,
            listener: None,
        }
    }

    /// Worker loop. Returns after `Op::Shutdown` or when every sender is gone.
    pub(crate) fn run(mut self, ops: Receiver<Op>) {
        info!("Quote stream worker started for {}", self.config.endpoint);
        loop {
            let retry_timer = self.retry_timer.clone();
            select! {
                recv(ops) -> op => match op {
                    Ok(Op::Shutdown) | Err(_) => break,
                    Ok(op) => self.handle(op),
                },
                recv(retry_timer) -> _ => {
                    self.retry_timer = never();
                    self.on_retry_timer();
                }
            }
        }
        self.teardown();
        info!("Quote stream worker stopped");
    }

    fn handle(&mut self, op: Op) {
        match op {
            Op::Subscribe {
                symbol,
                callback,
                reply,
            } => self.subscribe(symbol, callback, reply),
            Op::Unsubscribe { symbol } => self.unsubscribe(symbol),
            Op::EnsureConnected { reply } => self.ensure_connected(Some(reply)),
            Op::Reconnect { reply } => {
                info!("Manual reconnect requested");
                self.reconnect_attempts = 0;
                self.retry_timer = never();
                self.ensure_connected(Some(reply));
            }
            Op::SetStatusListener(listener) => {
                self.listener = Some(listener);
                let current = self.current_status();
                self.notify(&current);
            }
            Op::Shutdown => {}
            Op::Dialed { generation, result } => match result {
                Ok(link) => self.on_open(generation, link),
                Err(e) => self.on_dial_failed(generation, e),
            },
            Op::Frame { generation, text } => {
                if self.is_current(generation) {
                    self.registry.dispatch(&text);
                } else {
                    debug!("Dropping frame from stale link (generation {})", generation);
                }
            }
            Op::Closed { generation } => self.on_closed(generation),
        }
    }

    fn subscribe(&mut self, symbol: Symbol, callback: Callback, reply: Waiter) {
        if self.registry.insert(symbol.clone(), callback) {
            debug!("Replaced callback for {}", symbol);
        } else {
            info!("Subscribed to {} ({} active)", symbol, self.registry.len());
        }

        if matches!(self.state, LinkState::Open { .. }) {
            self.send(Directive::Subscribe { symbol });
            let _ = reply.send(Ok(()));
        } else {
            // A pending or future dial replays the registry, which now holds `symbol`.
            self.ensure_connected(Some(reply));
        }
    }

    fn unsubscribe(&mut self, symbol: Symbol) {
        if matches!(self.state, LinkState::Open { .. }) {
            self.send(Directive::Unsubscribe {
                symbol: symbol.clone(),
            });
        }
        if self.registry.remove(&symbol) {
            info!("Unsubscribed from {} ({} active)", symbol, self.registry.len());
        }
    }

    fn ensure_connected(&mut self, waiter: Option<Waiter>) {
        match &mut self.state {
            LinkState::Open { .. } => {
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(()));
                }
            }
            LinkState::Connecting { waiters, .. } => waiters.extend(waiter),
            LinkState::Absent => self.dial(waiter),
        }
    }

    fn dial(&mut self, waiter: Option<Waiter>) {
        let url = match self.config.credential() {
            Some(token) => feed_url(&self.config.endpoint, token),
            None => Err(QuoteError::MissingCredential),
        };
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot connect to the feed: {}", e);
                self.retry_timer = never();
                self.publish(ConnectionStatus::Unavailable);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(e));
                }
                return;
            }
        };

        self.retry_timer = never();
        self.next_generation += 1;
        let generation = self.next_generation;
        self.state = LinkState::Connecting {
            generation,
            waiters: waiter.into_iter().collect(),
            closed_early: false,
        };
        self.publish(ConnectionStatus::Connecting);
        info!(
            "Connecting to {} (generation {})",
            self.config.endpoint, generation
        );

        let connector = Arc::clone(&self.connector);
        let ops_tx = self.ops_tx.clone();
        let events = LinkEvents::new(generation, ops_tx.clone());
        let spawned = thread::Builder::new()
            .name(format!("quote-dial-{}", generation))
            .spawn(move || {
                let result = connector.connect(&url, events);
                if let Err(returned) = ops_tx.send(Op::Dialed { generation, result }) {
                    if let Op::Dialed {
                        result: Ok(mut link),
                        ..
                    } = returned.into_inner()
                    {
                        link.close();
                    }
                }
            });
        if let Err(e) = spawned {
            self.on_dial_failed(generation, QuoteError::from(e));
        }
    }

    fn on_open(&mut self, generation: u64, mut link: Box<dyn Link>) {
        let (waiters, closed_early) = match &mut self.state {
            LinkState::Connecting {
                generation: current,
                waiters,
                closed_early,
            } if *current == generation => (mem::take(waiters), *closed_early),
            _ => {
                debug!("Discarding stale connection (generation {})", generation);
                link.close();
                return;
            }
        };

        self.state = LinkState::Open { generation, link };
        self.reconnect_attempts = 0;
        info!("Connected to {}", self.config.endpoint);
        self.replay();
        self.publish(ConnectionStatus::Open);
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }

        if closed_early {
            self.on_closed(generation);
        }
    }

    fn on_dial_failed(&mut self, generation: u64, err: QuoteError) {
        let waiters = match &mut self.state {
            LinkState::Connecting {
                generation: current,
                waiters,
                ..
            } if *current == generation => mem::take(waiters),
            _ => {
                debug!("Ignoring failure of stale dial (generation {})", generation);
                return;
            }
        };

        self.state = LinkState::Absent;
        error!("Connection attempt failed: {}", err);
        for waiter in waiters {
            let _ = waiter.send(Err(err.clone()));
        }

        if err.is_transient() {
            self.schedule_reconnect();
        } else {
            self.publish(ConnectionStatus::Unavailable);
        }
    }

    fn on_closed(&mut self, generation: u64) {
        match &mut self.state {
            LinkState::Open {
                generation: current,
                ..
            } if *current == generation => {}
            LinkState::Connecting {
                generation: current,
                closed_early,
                ..
            } if *current == generation => {
                // The link reported its close before the dial result came in.
                *closed_early = true;
                return;
            }
            _ => {
                debug!("Ignoring close of stale link (generation {})", generation);
                return;
            }
        }

        self.state = LinkState::Absent;
        warn!("Disconnected from {}", self.config.endpoint);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.registry.is_empty() {
            info!("No active subscriptions; staying disconnected");
            self.publish(ConnectionStatus::Idle);
            return;
        }
        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            error!(
                "Max reconnect attempts ({}) reached. Halting reconnection with {} subscriptions registered",
                self.config.max_reconnect_attempts,
                self.registry.len()
            );
            self.publish(ConnectionStatus::Exhausted);
            return;
        }

        self.reconnect_attempts += 1;
        let attempt = self.reconnect_attempts;
        let delay = self.config.reconnect_delay(attempt);
        warn!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay, attempt, self.config.max_reconnect_attempts
        );
        self.retry_timer = after(delay);
        self.publish(ConnectionStatus::Reconnecting { attempt, delay });
    }

    fn on_retry_timer(&mut self) {
        if !matches!(self.state, LinkState::Absent) {
            return;
        }
        if self.registry.is_empty() {
            info!("Subscriptions dropped while waiting to reconnect");
            self.publish(ConnectionStatus::Idle);
            return;
        }
        info!("Reconnect attempt {}", self.reconnect_attempts);
        self.dial(None);
    }

    fn replay(&mut self) {
        let symbols = self.registry.symbols();
        if !symbols.is_empty() {
            info!("Replaying {} subscriptions", symbols.len());
        }
        for symbol in symbols {
            self.send(Directive::Subscribe { symbol });
        }
    }

    /// Writes a directive if the link is open; otherwise drops it. The replay at the
    /// next open brings the feed back in line with the registry.
    fn send(&mut self, directive: Directive) {
        let LinkState::Open { link, .. } = &mut self.state else {
            debug!("Not connected; dropping {:?}", directive);
            return;
        };
        match directive.to_json() {
            Ok(text) => {
                debug!("-> {}", text);
                if let Err(e) = link.send(text) {
                    warn!("Failed to send {:?}: {}", directive, e);
                }
            }
            Err(e) => error!("Failed to encode {:?}: {}", directive, e),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        match &self.state {
            LinkState::Open {
                generation: current,
                ..
            }
            | LinkState::Connecting {
                generation: current,
                ..
            } => *current == generation,
            LinkState::Absent => false,
        }
    }

    fn teardown(&mut self) {
        self.retry_timer = never();
        match mem::replace(&mut self.state, LinkState::Absent) {
            LinkState::Open { mut link, .. } => link.close(),
            LinkState::Connecting { waiters, .. } => {
                for waiter in waiters {
                    let _ = waiter.send(Err(QuoteError::ShutDown));
                }
            }
            LinkState::Absent => {}
        }
        self.registry.clear();
        self.publish(ConnectionStatus::Closed);
    }

    fn current_status(&self) -> ConnectionStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&mut self, next: ConnectionStatus) {
        {
            let mut status = match self.status.lock() {
                Ok(status) => status,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *status == next {
                return;
            }
            debug!("Status: {} -> {}", *status, next);
            *status = next.clone();
        }
        self.notify(&next);
    }

    fn notify(&mut self, status: &ConnectionStatus) {
        if let Some(listener) = self.listener.as_mut() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
                error!("Status listener panicked on {}", status);
            }
        }
    }
}
