//! The seam between the connection lifecycle and the chat protocol.
//!
//! [`handle_websocket`](crate::connection::handle_websocket) knows how to run
//! a socket; a [`ConnectionHandler`] knows what the frames mean. The handler
//! creates a per-connection session when the socket opens and receives that
//! session back, by mutable reference, for every later event. Events for one
//! connection never overlap.

use async_trait::async_trait;

use crate::connection::ConnectionHandle;
use crate::message::Message;

/// Reacts to the open, message and close events of each connection.
///
/// # Examples
///
/// ```
/// use chatrelay_core::prelude::*;
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl ConnectionHandler for Echo {
///     type Session = ConnectionHandle;
///
///     async fn on_open(&self, conn: ConnectionHandle) -> ConnectionHandle {
///         conn
///     }
///
///     async fn on_message(&self, conn: &mut ConnectionHandle, message: Message) {
///         let _ = conn.send(message);
///     }
///
///     async fn on_close(&self, _conn: &mut ConnectionHandle) {}
/// }
/// ```
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Per-connection state owned by the lifecycle driver.
    type Session: Send;

    /// Called once, after the upgrade and before any message is read.
    async fn on_open(&self, conn: ConnectionHandle) -> Self::Session;

    /// Called for every inbound message other than a close frame.
    async fn on_message(&self, session: &mut Self::Session, message: Message);

    /// Called once when the connection ends, after its handle is marked
    /// closed.
    async fn on_close(&self, session: &mut Self::Session);
}
