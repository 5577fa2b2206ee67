//! Websocket transport over blocking `tungstenite`.
//!
//! The TCP socket is opened here with a connect timeout, and the same bound is
//! set as the socket's read and write timeout for the TLS and HTTP upgrade
//! handshakes. A feed that accepts the connection but never answers therefore
//! fails the dial instead of stalling it. After the handshake the socket is moved into a dedicated I/O thread. The
//! thread alternates between flushing queued outbound frames and reading with a
//! short socket read timeout, so a single thread can own the socket for both
//! directions. The loop ends on a close frame, a socket error, a deliberate
//! close or when the `WsLink` is dropped, and always reports `closed()` last.
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use quote_common::{QuoteError, Result};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::transport::{Connector, Link, LinkEvents};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

enum Outbound {
    Text(String),
    Close,
}

/// Production [`Connector`] dialing the feed over `ws://` or `wss://`.
pub struct WsConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WsConnector {
    /// Creates a connector. `connect_timeout` bounds the TCP connect and each
    /// handshake read or write; the I/O loop then polls the socket every
    /// `read_timeout`.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str, events: LinkEvents) -> Result<Box<dyn Link>> {
        let request = url
            .into_client_request()
            .map_err(|e| QuoteError::Transport(e.to_string()))?;
        let uri = request.uri();
        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| QuoteError::Transport(format!("no host in {}", uri)))?;
        let port = uri
            .port_u16()
            .unwrap_or(if uri.scheme_str() == Some("wss") { 443 } else { 80 });

        let stream = open_tcp(&host, port, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_write_timeout(Some(self.connect_timeout))?;
        let (mut socket, response) = tungstenite::client_tls(request, stream)
            .map_err(|e| QuoteError::Transport(format!("handshake with {} failed: {}", host, e)))?;
        debug!("Websocket handshake complete: HTTP {}", response.status());
        set_read_timeout(&mut socket, self.read_timeout)?;

        let (outbound_tx, outbound_rx) = unbounded::<Outbound>();
        thread::Builder::new()
            .name(format!("quote-ws-{}", events.generation()))
            .spawn(move || run_io_loop(socket, outbound_rx, events))?;

        Ok(Box::new(WsLink {
            outbound: outbound_tx,
        }))
    }
}

struct WsLink {
    outbound: Sender<Outbound>,
}

impl Link for WsLink {
    fn send(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|e| QuoteError::ChannelSend(format!("websocket writer gone: {}", e)))
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Tries every resolved address in turn, each bounded by `timeout`.
fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(match last_err {
        Some(e) => QuoteError::Transport(format!("connect to {}:{} failed: {}", host, port, e)),
        None => QuoteError::Transport(format!("{} did not resolve", host)),
    })
}

fn set_read_timeout(socket: &mut Socket, timeout: Duration) -> Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout))?,
        MaybeTlsStream::NativeTls(stream) => stream.get_mut().set_read_timeout(Some(timeout))?,
        _ => warn!("Unknown websocket stream type; reads will block"),
    }
    Ok(())
}

fn run_io_loop(mut socket: Socket, outbound: Receiver<Outbound>, events: LinkEvents) {
    let generation = events.generation();
    'io: loop {
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Text(text)) => {
                    if let Err(e) = socket.send(Message::text(text)) {
                        warn!("Websocket send failed: {}", e);
                        break 'io;
                    }
                }
                Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                    debug!("Closing websocket (generation {})", generation);
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    break 'io;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if !events.frame(text.as_str().to_owned()) {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                info!("Feed closed the websocket: {:?}", frame);
                let _ = socket.flush();
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(e) => {
                warn!("Websocket read failed: {}", e);
                break;
            }
        }
    }
    events.closed();
}
