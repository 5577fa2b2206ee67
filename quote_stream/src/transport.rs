//! Transport seam between the supervisor and the network.
//!
//! A `Connector` dials the feed and hands back a `Link` used for outbound text
//! frames. Everything that arrives on the link (text frames, and finally its
//! close) is reported through the `LinkEvents` handle passed to `connect`.
//! Events are tagged with the generation of the dial that produced the link so
//! the supervisor can ignore a link it has already replaced or torn down.
use crossbeam_channel::Sender;
use quote_common::Result;

use crate::supervisor::Op;

/// Dials the feed.
pub trait Connector: Send + Sync + 'static {
    /// Opens a connection to `url`. Blocks until the link is usable or the attempt
    /// fails. Inbound frames and the eventual close must be reported on `events`.
    fn connect(&self, url: &str, events: LinkEvents) -> Result<Box<dyn Link>>;
}

/// Outbound half of an open connection.
pub trait Link: Send {
    /// Queues a text frame for the feed.
    fn send(&mut self, text: String) -> Result<()>;

    /// Starts a deliberate close. No further events are expected to matter.
    fn close(&mut self);
}

/// Reports inbound activity of one link back to the supervisor.
#[derive(Clone)]
pub struct LinkEvents {
    generation: u64,
    tx: Sender<Op>,
}

impl LinkEvents {
    pub(crate) fn new(generation: u64, tx: Sender<Op>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the dial that owns these events.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forwards an inbound text frame. Returns `false` once the stream is gone,
    /// at which point the link should stop reading.
    pub fn frame(&self, text: String) -> bool {
        self.tx
            .send(Op::Frame {
                generation: self.generation,
                text,
            })
            .is_ok()
    }

    /// Reports that the link has closed, for whatever reason.
    pub fn closed(&self) {
        let _ = self.tx.send(Op::Closed {
            generation: self.generation,
        });
    }
}
