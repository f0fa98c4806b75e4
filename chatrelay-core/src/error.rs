//! Error types and result handling for the relay.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias over
//! the single [`Error`] enum defined here.
//!
//! # Error Categories
//!
//! - **Transport Errors**: WebSocket, I/O and HTTP response errors
//! - **Serialization Errors**: JSON and timestamp formatting failures
//! - **Registry Errors**: identifier collisions and lookups of departed clients
//! - **Connection Errors**: sends to a connection whose queue is gone
//!
//! None of these are fatal to the server. Registry errors in particular are
//! expected under normal operation: [`Error::DuplicateIdentifier`] is answered
//! by asking the client to reconnect, and [`Error::UnknownClient`] only shows
//! up when a close races a handshake and is ignored.
//!
//! # Examples
//!
//! ```
//! use chatrelay_core::prelude::*;
//!
//! # fn example(result: Result<()>) {
//! match result {
//!     Ok(()) => {}
//!     Err(Error::UnknownClient(id)) => {
//!         println!("client {} already left", id);
//!     }
//!     Err(e) => eprintln!("relay error: {}", e),
//! }
//! # }
//! ```

use std::fmt;
use thiserror::Error;

use crate::registry::ClientId;

/// The main error type for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket protocol error from `tokio-tungstenite`.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error from the listener or a client socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to build the plain HTTP identification response.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Failed to format the server timestamp of a chat frame.
    #[error("Timestamp error: {0}")]
    Timestamp(#[from] time::error::Format),

    /// A freshly generated identifier is already held by a live client.
    ///
    /// The registry never overwrites an existing record; the connection that
    /// drew the colliding identifier is told to reconnect instead.
    #[error("Duplicate client identifier: {0}")]
    DuplicateIdentifier(ClientId),

    /// The identifier is not (or no longer) present in the registry.
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    /// The connection's outbound queue has been dropped.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Application-defined error.
    #[error("Custom error: {0}")]
    Custom(String),
}

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a custom error with the given message.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay_core::Error;
    ///
    /// let err = Error::custom("listener gone");
    /// assert_eq!(err.to_string(), "Custom error: listener gone");
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Returns `true` for conditions the relay recovers from without
    /// involving any other connection.
    pub fn is_registry_race(&self) -> bool {
        matches!(self, Error::UnknownClient(_))
    }
}
