//! # chatrelay-core
//!
//! Core of a channel-based WebSocket chat relay.
//!
//! Clients connect, receive an identifier, join a channel with a handshake and
//! then exchange short text messages with everyone else in that channel. The
//! relay keeps no history: a message reaches whoever is in the channel at the
//! moment it arrives, and a restart forgets everything.
//!
//! ## Components
//!
//! - [`identity`]: random 10-character client identifiers
//! - [`sanitize`]: markup neutralization and display-name truncation
//! - [`registry`]: the table of live clients and their channel membership
//! - [`channel`]: channel membership queries over the registry
//! - [`frame`]: the JSON wire frames
//! - [`router`]: the per-connection protocol state machine
//! - [`connection`]: send handles and the per-connection lifecycle
//! - [`server`]: the TCP listener serving WebSocket and plain HTTP
//!
//! ## Quick Start
//!
//! ```no_run
//! use chatrelay_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     Server::new().run().await
//! }
//! ```
//!
//! ## Protocol Walkthrough
//!
//! ```text
//! server → client   {"init":true,"uuid":"aB3dE5gH7j"}
//! client → server   {"init":true,"uuid":"aB3dE5gH7j","channel":"42","name":"Alice"}
//! server → channel  {"channel":"42","message":"Aliceさん(aB3dE5gH7j)が入室しました！","type":"info"}
//! server → channel  {"channel":"42","type":"headcount","count":1}
//! client → server   {"uuid":"aB3dE5gH7j","channel":"42","name":"Alice","message":"hi"}
//! server → sender   {"uuid":"aB3dE5gH7j","channel":"42","name":"Alice","message":"hi","type":"mine","time":"..."}
//! server → others   {... "type":"other" ...}
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod identity;
pub mod message;
pub mod registry;
pub mod router;
pub mod sanitize;
pub mod server;

pub use channel::ChannelIndex;
pub use config::ServerConfig;
pub use connection::{ConnectionHandle, handle_websocket};
pub use error::{Error, Result};
pub use frame::{FrameKind, InboundFrame, OutboundFrame};
pub use handler::ConnectionHandler;
pub use identity::{IdentityGenerator, RandomIdGenerator};
pub use message::Message;
pub use registry::{ClientId, ClientRecord, Registry};
pub use router::{MessageRouter, Session, SessionState};
pub use server::Server;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::channel::ChannelIndex;
    pub use crate::config::ServerConfig;
    pub use crate::connection::{ConnectionHandle, handle_websocket};
    pub use crate::error::{Error, Result};
    pub use crate::frame::{FrameKind, InboundFrame, OutboundFrame};
    pub use crate::handler::ConnectionHandler;
    pub use crate::identity::{IdentityGenerator, RandomIdGenerator};
    pub use crate::message::Message;
    pub use crate::registry::{ClientId, ClientRecord, Registry};
    pub use crate::router::{MessageRouter, Session, SessionState};
    pub use crate::server::Server;
}
