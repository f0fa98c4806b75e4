//! # chatrelay
//!
//! Channel-based WebSocket chat relay.
//!
//! This crate re-exports [`chatrelay_core`] and ships the `chatrelay` server
//! binary, which listens on port 8000 with the default configuration.
//!
//! ```no_run
//! use chatrelay::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let config = ServerConfig::new().identification("websocket-server");
//! Server::with_config(config).run().await
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export everything from chatrelay-core
pub use chatrelay_core::*;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use chatrelay_core::prelude::*;
}
