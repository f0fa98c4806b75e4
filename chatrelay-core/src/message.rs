//! Transport-level WebSocket messages.
//!
//! [`Message`] is what travels through a connection's outbound queue and what
//! the read loop hands to the protocol. It is deliberately thin: the JSON wire
//! frames of the chat protocol live in [`crate::frame`] and are carried here as
//! [`Message::Text`].

use serde::Serialize;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use crate::error::Result;

/// A WebSocket message as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text message. All chat protocol traffic uses this variant.
    Text(String),
    /// Binary message. Never routed.
    Binary(Vec<u8>),
    /// Ping control frame.
    Ping(Vec<u8>),
    /// Pong control frame.
    Pong(Vec<u8>),
    /// Close frame.
    Close,
}

impl Message {
    /// Creates a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// Serializes `data` to JSON and wraps it in a text message.
    pub fn json<T: Serialize>(data: &T) -> Result<Self> {
        Ok(Message::Text(serde_json::to_string(data)?))
    }

    /// Returns the text payload, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` for close frames.
    pub fn is_close(&self) -> bool {
        matches!(self, Message::Close)
    }

    /// Converts into a `tungstenite` message for the socket writer.
    pub fn into_tungstenite(self) -> TungsteniteMessage {
        match self {
            Message::Text(text) => TungsteniteMessage::Text(text),
            Message::Binary(data) => TungsteniteMessage::Binary(data),
            Message::Ping(data) => TungsteniteMessage::Ping(data),
            Message::Pong(data) => TungsteniteMessage::Pong(data),
            Message::Close => TungsteniteMessage::Close(None),
        }
    }

    /// Converts from a `tungstenite` message read off the socket.
    ///
    /// Raw frames only appear when reading with a custom configuration and
    /// are mapped to an empty binary message.
    pub fn from_tungstenite(msg: TungsteniteMessage) -> Self {
        match msg {
            TungsteniteMessage::Text(text) => Message::Text(text),
            TungsteniteMessage::Binary(data) => Message::Binary(data),
            TungsteniteMessage::Ping(data) => Message::Ping(data),
            TungsteniteMessage::Pong(data) => Message::Pong(data),
            TungsteniteMessage::Close(_) => Message::Close,
            TungsteniteMessage::Frame(_) => Message::Binary(Vec::new()),
        }
    }
}
