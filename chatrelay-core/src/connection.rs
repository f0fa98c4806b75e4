//! Connection handles and the per-connection lifecycle.
//!
//! # Overview
//!
//! - [`ConnectionHandle`]: a cheap, cloneable handle used to push messages to
//!   one client. The registry owns one per live client.
//! - [`handle_websocket`]: drives a single upgraded connection from open to
//!   close and hands its events to a [`ConnectionHandler`].
//!
//! # Architecture
//!
//! Each connection runs a **write task** that drains an unbounded queue into
//! the socket, while the **read loop** runs inline in the connection's own
//! task. Inbound frames are therefore handled strictly in arrival order, and a
//! slow socket never blocks a broadcast originating on another connection:
//! senders only push into the queue.
//!
//! A handle carries an explicit open flag. [`handle_websocket`] clears it
//! before the close transition runs, and [`ConnectionHandle::send`] checks it
//! first, so nothing is ever queued for a connection that is going away.

use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::frame::OutboundFrame;
use crate::handler::ConnectionHandler;
use crate::message::Message;

/// Handle used to push messages to one connected client.
///
/// Clones share the same outbound queue and open flag. Two handles compare
/// equal when they feed the same queue, which is how the router tells a
/// sender's own copy of a broadcast apart from everyone else's.
#[derive(Clone)]
pub struct ConnectionHandle {
    addr: SocketAddr,
    sender: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Creates an open handle feeding `sender`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay_core::connection::ConnectionHandle;
    /// use tokio::sync::mpsc;
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel();
    /// let conn = ConnectionHandle::new("127.0.0.1:8000".parse().unwrap(), tx);
    /// assert!(conn.is_open());
    /// ```
    pub fn new(addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            addr,
            sender,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Peer address of the client.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the transport is still open for writing.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Marks the transport as closed. Later sends are skipped.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Queues a message for the client.
    ///
    /// Sends to a connection that is not open are skipped silently and
    /// return `Ok`; nothing is buffered or retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the queue's receiver was dropped
    /// between the open check and the push.
    pub fn send(&self, message: Message) -> Result<()> {
        if !self.is_open() {
            trace!("Skipping send to non-open connection {}", self.addr);
            return Ok(());
        }
        self.sender
            .send(message)
            .map_err(|_| Error::ConnectionClosed(self.addr.to_string()))
    }

    /// Serializes a protocol frame and queues it.
    pub fn send_frame(&self, frame: &OutboundFrame) -> Result<()> {
        self.send(Message::json(frame)?)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("addr", &self.addr)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Drives one upgraded WebSocket connection from open to close.
///
/// # Lifecycle Events
///
/// 1. An outbound queue and [`ConnectionHandle`] are created
/// 2. `handler.on_open` runs and produces the connection's session
/// 3. The write task drains the queue while the read loop feeds every inbound
///    message to `handler.on_message`, one at a time
/// 4. When the client closes, the socket errors, or the writer fails, the
///    handle is marked closed
/// 5. `handler.on_close` runs exactly once
///
/// The write task is left to flush whatever was queued before the close and
/// ends once the last handle clone is dropped.
pub async fn handle_websocket<H>(
    stream: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) where
    H: ConnectionHandler,
{
    info!("WebSocket connection established from {}", peer_addr);

    let (mut ws_sender, mut ws_receiver) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn = ConnectionHandle::new(peer_addr, tx);

    let mut session = handler.on_open(conn.clone()).await;

    let mut write_task = tokio::spawn(async move {
        debug!("Write task started for {}", peer_addr);
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message.into_tungstenite()).await {
                warn!("Failed to send message to {}: {}", peer_addr, e);
                break;
            }
        }
        debug!("Write task ended for {}", peer_addr);
    });

    let read_loop = async {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    let message = Message::from_tungstenite(msg);
                    if message.is_close() {
                        info!("Close message received from {}", peer_addr);
                        break;
                    }
                    handler.on_message(&mut session, message).await;
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", peer_addr, e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = read_loop => {
            debug!("Read loop finished first for {}", peer_addr);
        }
        _ = &mut write_task => {
            debug!("Write task finished first for {}", peer_addr);
        }
    }

    conn.mark_closed();
    handler.on_close(&mut session).await;
    info!("WebSocket connection closed from {}", peer_addr);
}
