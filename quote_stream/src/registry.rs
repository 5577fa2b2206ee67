//! Subscription registry and inbound frame dispatch.
//!
//! The registry maps each subscribed `Symbol` to the caller's update callback. It
//! is the source of truth for what the transport should be subscribed to and it
//! outlives any individual connection, which is what makes replay possible.
//!
//! Dispatch never fails: a malformed envelope or batch element is logged and
//! dropped, updates for unknown symbols are ignored, and a panicking callback is
//! contained so one subscriber cannot stop delivery to the others.
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, warn};
use quote_common::wire::{InboundFrame, Trade};
use quote_common::Symbol;

/// Update callback registered for one symbol.
pub(crate) type Callback = Box<dyn FnMut(&Trade) + Send>;

/// Longest slice of a bad frame echoed into the log.
const PREVIEW_CHARS: usize = 200;

#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Symbol, Callback>,
}

impl Registry {
    /// Inserts or replaces the callback for `symbol`. Returns `true` on replace.
    pub(crate) fn insert(&mut self, symbol: Symbol, callback: Callback) -> bool {
        self.entries.insert(symbol, callback).is_some()
    }

    /// Removes `symbol`. Returns `true` if it was registered.
    pub(crate) fn remove(&mut self, symbol: &Symbol) -> bool {
        self.entries.remove(symbol).is_some()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn symbols(&self) -> Vec<Symbol> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Routes one inbound text frame to the matching callbacks.
    ///
    /// Returns the number of callbacks invoked.
    pub(crate) fn dispatch(&mut self, text: &str) -> usize {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed frame ({}): {}", e, preview(text));
                return 0;
            }
        };

        match frame {
            InboundFrame::Trade { data } => {
                let mut delivered = 0;
                for value in data.unwrap_or_default() {
                    match Trade::decode(value) {
                        Ok(trade) => {
                            if self.deliver(&trade) {
                                delivered += 1;
                            }
                        }
                        Err(e) => warn!("Dropping malformed trade: {}", e),
                    }
                }
                delivered
            }
            InboundFrame::Ping => {
                debug!("Feed ping");
                0
            }
            InboundFrame::Error { msg } => {
                warn!("Feed reported an error: {}", msg);
                0
            }
            InboundFrame::Unknown => {
                debug!("Ignoring frame: {}", preview(text));
                0
            }
        }
    }

    fn deliver(&mut self, trade: &Trade) -> bool {
        let Some(callback) = self.entries.get_mut(trade.symbol.as_str()) else {
            debug!("No subscriber for {}; dropping update", trade.symbol);
            return false;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| callback(trade))).is_err() {
            error!("Update callback for {} panicked", trade.symbol);
        }
        true
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
