//! TCP listener and connection dispatch.
//!
//! The relay answers two kinds of traffic on one port:
//!
//! - **WebSocket upgrades** are accepted and handed to
//!   [`handle_websocket`] with the shared [`MessageRouter`].
//! - **Plain HTTP** requests get a short `text/plain` identification string
//!   (`GET`/`HEAD`) or `405 Method Not Allowed`.
//!
//! The two are told apart by peeking at the request head before the
//! WebSocket handshake consumes it.
//!
//! # Examples
//!
//! ```no_run
//! use chatrelay_core::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! Server::new().listen("0.0.0.0:8000").await?;
//! # Ok(())
//! # }
//! ```

use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::connection::handle_websocket;
use crate::error::{Error, Result};
use crate::identity::IdentityGenerator;
use crate::registry::Registry;
use crate::router::MessageRouter;

/// Largest request head inspected before deciding between upgrade and HTTP.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Delay between peeks while the request head is still arriving.
const HEAD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Peeks without new bytes before the head is judged on what has arrived.
const HEAD_STALL_LIMIT: u32 = 200;

/// The relay server: one registry, one router, one listener.
pub struct Server {
    config: ServerConfig,
    router: Arc<MessageRouter>,
}

impl Server {
    /// Creates a server with the default configuration and an empty registry.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a server with `config` and an empty registry.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            router: Arc::new(MessageRouter::new(Arc::new(Registry::new()))),
        }
    }

    /// Replaces the identifier source used for new connections.
    pub fn with_id_generator(self, ids: impl IdentityGenerator) -> Self {
        let registry = self.router.registry().clone();
        Self {
            config: self.config,
            router: Arc::new(MessageRouter::new(registry).with_id_generator(ids)),
        }
    }

    /// The server's configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The protocol router shared by every connection.
    pub fn router(&self) -> Arc<MessageRouter> {
        self.router.clone()
    }

    /// Binds to the configured address and serves forever.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Binds to `addr` and serves forever.
    pub async fn listen(self, addr: impl AsRef<str>) -> Result<()> {
        let addr: SocketAddr = addr
            .as_ref()
            .parse()
            .map_err(|e| Error::custom(format!("Invalid address: {}", e)))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves connections accepted from an already bound listener.
    ///
    /// Failures are confined to the connection they happen on; this only
    /// returns if reading the listener's own address fails.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("Chat relay listening on {}", listener.local_addr()?);
        let server = Arc::new(self);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let server = server.clone();

            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    error!("Connection error from {}: {}", peer_addr, e);
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        let peeked = peek_request_head(&stream).await?;
        if peeked.is_empty() {
            debug!("Connection from {} closed before sending a request", peer_addr);
            return Ok(());
        }

        let head = String::from_utf8_lossy(&peeked).into_owned();
        if is_websocket_upgrade(&head) {
            let ws_stream = accept_async(stream).await?;
            handle_websocket(ws_stream, peer_addr, self.router.clone()).await;
            Ok(())
        } else {
            self.handle_http_request(stream, peeked.len(), &head).await
        }
    }

    async fn handle_http_request(
        &self,
        mut stream: TcpStream,
        peeked: usize,
        head: &str,
    ) -> Result<()> {
        // Drain what was peeked so closing the socket sends FIN, not RST.
        let mut discard = vec![0u8; peeked];
        stream.read_exact(&mut discard).await?;

        let method = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .and_then(|token| Method::from_bytes(token.as_bytes()).ok());

        let response = identification_response(method.as_ref(), &self.config.identification)?;
        debug!("Plain HTTP {:?} answered with {}", method, response.status());

        stream.write_all(&encode_response(&response)).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Peeks at the request head without consuming it.
///
/// Keeps peeking until the blank line ending the head has arrived, the
/// buffer is full, or the peer has sent nothing new for a while. Returns an
/// empty buffer if the peer closed without sending anything.
async fn peek_request_head(stream: &TcpStream) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; MAX_REQUEST_HEAD];
    let mut seen = 0;
    let mut stalled = 0;

    loop {
        let n = stream.peek(&mut buffer).await?;
        if n == 0 || n == buffer.len() || head_complete(&buffer[..n]) {
            buffer.truncate(n);
            return Ok(buffer);
        }

        if n > seen {
            seen = n;
            stalled = 0;
        } else {
            stalled += 1;
            if stalled >= HEAD_STALL_LIMIT {
                trace!("Request head stalled at {} bytes", n);
                buffer.truncate(n);
                return Ok(buffer);
            }
        }
        tokio::time::sleep(HEAD_POLL_INTERVAL).await;
    }
}

fn head_complete(bytes: &[u8]) -> bool {
    bytes.windows(4).any(|w| w == b"\r\n\r\n")
}

/// True if the head carries an `Upgrade` header listing `websocket`.
fn is_websocket_upgrade(head: &str) -> bool {
    head.lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .any(|(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
        })
}

fn identification_response(
    method: Option<&Method>,
    identification: &str,
) -> Result<Response<Vec<u8>>> {
    let (status, body) = match method {
        Some(m) if *m == Method::GET => (StatusCode::OK, identification.as_bytes().to_vec()),
        Some(m) if *m == Method::HEAD => (StatusCode::OK, Vec::new()),
        _ => (StatusCode::METHOD_NOT_ALLOWED, Vec::new()),
    };

    let length = if method == Some(&Method::HEAD) {
        identification.len()
    } else {
        body.len()
    };

    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, length)
        .header(CONNECTION, "close")
        .body(body)?)
}

fn encode_response(response: &Response<Vec<u8>>) -> Vec<u8> {
    let status = response.status();
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    for (name, value) in response.headers() {
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(value.to_str().unwrap_or_default());
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(response.body());
    bytes
}
