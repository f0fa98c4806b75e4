//! Server configuration.
//!
//! The relay reads no flags, environment variables or files; a
//! [`ServerConfig`] is built in code and handed to
//! [`Server::with_config`](crate::server::Server::with_config).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port the relay listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8000;

/// Body of the plain HTTP response served on the WebSocket port.
pub const DEFAULT_IDENTIFICATION: &str = "websocket-server";

/// Settings for a [`Server`](crate::server::Server).
///
/// # Examples
///
/// ```
/// use chatrelay_core::config::ServerConfig;
///
/// let config = ServerConfig::new()
///     .bind_addr("127.0.0.1:9000".parse().unwrap())
///     .identification("relay-staging");
///
/// assert_eq!(config.bind_addr.port(), 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to. Defaults to `0.0.0.0:8000`.
    pub bind_addr: SocketAddr,
    /// Text returned to plain HTTP `GET` requests.
    pub identification: String,
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the plain HTTP identification text.
    pub fn identification(mut self, text: impl Into<String>) -> Self {
        self.identification = text.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            identification: DEFAULT_IDENTIFICATION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(config.identification, "websocket-server");
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new().identification("other");
        assert_eq!(config.identification, "other");
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
    }
}
