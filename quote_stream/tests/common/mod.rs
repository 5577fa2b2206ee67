//! In-memory feed used to drive `QuoteStream` without a network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use quote_common::wire::Directive;
use quote_common::{QuoteError, Result};
use quote_stream::{Connector, Link, LinkEvents, StreamConfig};

/// Scripted result of one dial.
#[derive(Debug, Clone)]
pub enum Dial {
    Accept,
    /// Accepts, but the link reports its close before `connect` returns.
    AcceptClosed,
    Refuse,
}

#[derive(Default)]
struct FeedState {
    dials: AtomicUsize,
    script: Mutex<VecDeque<Dial>>,
    gate: Mutex<Option<Receiver<()>>>,
    sent: Mutex<Vec<(u64, String)>>,
    links: Mutex<Vec<LinkEvents>>,
    client_closes: AtomicUsize,
}

/// Test double for the market-data feed. Clones share state.
#[derive(Clone, Default)]
pub struct FakeFeed {
    state: Arc<FeedState>,
}

impl FakeFeed {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    /// Queues dial outcomes; once the script runs out every dial is accepted.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Dial>) {
        self.state.script.lock().unwrap().extend(outcomes);
    }

    /// Makes every dial block until the returned sender releases it (one `()` per
    /// dial) or is dropped.
    pub fn hold_dials(&self) -> Sender<()> {
        let (tx, rx) = unbounded();
        *self.state.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn dials(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn client_closes(&self) -> usize {
        self.state.client_closes.load(Ordering::SeqCst)
    }

    /// Every directive written by the client, in order.
    pub fn directives(&self) -> Vec<Directive> {
        self.state
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// Subscribe directives written on the link of the given generation.
    pub fn subscribes_on(&self, generation: u64) -> Vec<String> {
        self.state
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == generation)
            .filter_map(|(_, text)| match serde_json::from_str(text).unwrap() {
                Directive::Subscribe { symbol } => Some(symbol.to_string()),
                Directive::Unsubscribe { .. } => None,
            })
            .collect()
    }

    /// Generation of the most recent accepted link.
    pub fn last_generation(&self) -> u64 {
        self.state
            .links
            .lock()
            .unwrap()
            .last()
            .map(LinkEvents::generation)
            .unwrap()
    }

    /// Pushes a text frame on the most recent link.
    pub fn push(&self, text: &str) {
        let events = self.state.links.lock().unwrap().last().cloned().unwrap();
        events.frame(text.to_string());
    }

    /// Pushes a single-trade batch on the most recent link.
    pub fn push_trade(&self, symbol: &str, price: f64) {
        self.push(&format!(
            r#"{{"type":"trade","data":[{{"s":"{}","p":{},"t":1700000000000}}]}}"#,
            symbol, price
        ));
    }

    /// Simulates a late close from the link of `generation`.
    pub fn drop_generation(&self, generation: u64) {
        let links = self.state.links.lock().unwrap();
        let events = links
            .iter()
            .find(|events| events.generation() == generation)
            .cloned()
            .unwrap();
        drop(links);
        events.closed();
    }

    /// Simulates the feed dropping the most recent link.
    pub fn drop_connection(&self) {
        let events = self.state.links.lock().unwrap().last().cloned().unwrap();
        events.closed();
    }
}

impl Connector for FakeFeed {
    fn connect(&self, _url: &str, events: LinkEvents) -> Result<Box<dyn Link>> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let outcome = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Dial::Accept);
        match outcome {
            Dial::Accept | Dial::AcceptClosed => {
                let generation = events.generation();
                self.state.links.lock().unwrap().push(events.clone());
                if matches!(outcome, Dial::AcceptClosed) {
                    events.closed();
                }
                Ok(Box::new(FakeLink {
                    generation,
                    state: Arc::clone(&self.state),
                    open: true,
                }))
            }
            Dial::Refuse => Err(QuoteError::Transport("connection refused".to_string())),
        }
    }
}

struct FakeLink {
    generation: u64,
    state: Arc<FeedState>,
    open: bool,
}

impl Link for FakeLink {
    fn send(&mut self, text: String) -> Result<()> {
        if !self.open {
            return Err(QuoteError::Transport("link closed".to_string()));
        }
        self.state.sent.lock().unwrap().push((self.generation, text));
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.state.client_closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Config with a credential and millisecond-scale backoff.
pub fn fast_config(max_reconnect_attempts: u32) -> StreamConfig {
    StreamConfig {
        endpoint: "ws://feed.test".to_string(),
        token: Some("test-token".to_string()),
        max_reconnect_attempts,
        reconnect_base_delay: Duration::from_millis(5),
        max_reconnect_delay: Duration::from_millis(50),
        ..StreamConfig::default()
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

/// Lets the worker drain anything already queued.
pub fn settle() {
    thread::sleep(Duration::from_millis(60));
}
