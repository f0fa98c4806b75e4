//! The chat protocol: a per-connection state machine.
//!
//! ```text
//!            open (id inserted)         init frame            close
//!   ───────▶ Unjoined ───────────────▶ Joined ─────────────▶ Closed
//!     │                                                        ▲
//!     │ id collision                                           │
//!     └──────▶ Rejected ───────────────────────────────────────┘
//! ```
//!
//! - **Open**: a new identifier is drawn and inserted into the registry. The
//!   client gets `{init: true, uuid}`, or an `info` notice asking it to
//!   reconnect if the identifier is already taken.
//! - **Init**: a handshake echoing the assigned identifier with a non-empty
//!   channel joins that channel. Everyone in the channel, the newcomer
//!   included, gets a login notice and the new headcount.
//! - **Chat**: a non-empty message is stamped with the server time and sent to
//!   every member of the sender's *recorded* channel, marked `mine` for the
//!   sender and `other` for everyone else.
//! - **Close**: the record is removed, then the remaining members get a logout
//!   notice and the headcount after the departure.
//!
//! Anything that does not fit the current state is dropped without a reply.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::channel::ChannelIndex;
use crate::connection::ConnectionHandle;
use crate::error::Result;
use crate::frame::{InboundFrame, OutboundFrame, server_timestamp};
use crate::handler::ConnectionHandler;
use crate::identity::{IdentityGenerator, RandomIdGenerator};
use crate::message::Message;
use crate::registry::{ClientId, Registry};
use crate::sanitize::{DEFAULT_DISPLAY_NAME, display_name, sanitize, truncate_display_name};

/// Protocol state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, waiting for the init handshake.
    Unjoined,
    /// Member of a channel.
    Joined,
    /// Drew an identifier that was already taken. Ignores everything.
    Rejected,
    /// Terminal.
    Closed,
}

/// Per-connection protocol state, owned by the connection's task.
#[derive(Debug)]
pub struct Session {
    id: ClientId,
    conn: ConnectionHandle,
    state: SessionState,
}

impl Session {
    /// The identifier assigned at open.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The connection this session talks through.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }
}

/// Interprets inbound frames, keeps the registry in step and fans frames out
/// to channel members.
pub struct MessageRouter {
    registry: Arc<Registry>,
    channels: ChannelIndex,
    ids: Arc<dyn IdentityGenerator>,
}

impl MessageRouter {
    /// Creates a router over `registry` that draws random identifiers.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            channels: ChannelIndex::new(registry.clone()),
            registry,
            ids: Arc::new(RandomIdGenerator),
        }
    }

    /// Replaces the identifier source.
    pub fn with_id_generator(mut self, ids: impl IdentityGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// The registry this router mutates.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Channel membership view over the registry.
    pub fn channels(&self) -> &ChannelIndex {
        &self.channels
    }

    /// Registers a newly opened connection.
    pub fn open(&self, conn: ConnectionHandle) -> Session {
        let id = self.ids.generate();

        match self.registry.insert(id.clone(), conn.clone()) {
            Ok(()) => {
                if let Err(e) = conn.send_frame(&OutboundFrame::init_ack(&id)) {
                    warn!("Failed to send init acknowledgement to {}: {}", id, e);
                }
                Session {
                    id,
                    conn,
                    state: SessionState::Unjoined,
                }
            }
            Err(e) => {
                warn!("Rejecting connection from {}: {}", conn.addr(), e);
                if let Err(e) = conn.send_frame(&OutboundFrame::reconnect()) {
                    warn!("Failed to send reconnect notice to {}: {}", conn.addr(), e);
                }
                Session {
                    id,
                    conn,
                    state: SessionState::Rejected,
                }
            }
        }
    }

    /// Handles one inbound message.
    pub fn receive(&self, session: &mut Session, message: Message) {
        let Some(text) = message.as_text() else {
            debug!("Ignoring non-text message from {}", session.id);
            return;
        };

        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping malformed frame from {}: {}", session.id, e);
                return;
            }
        };

        match (session.state, frame.init) {
            (SessionState::Unjoined, true) => self.join(session, &frame),
            (SessionState::Joined, false) => {
                if let Err(e) = self.chat(session, &frame) {
                    if e.is_registry_race() {
                        debug!("Chat from departed client {}: {}", session.id, e);
                    } else {
                        error!("Failed to relay chat from {}: {}", session.id, e);
                    }
                }
            }
            (state, init) => {
                debug!(
                    "Dropping frame from {} (state {:?}, init {})",
                    session.id, state, init
                );
            }
        }
    }

    /// Handles the end of a connection. Safe to call more than once.
    pub fn close(&self, session: &mut Session) {
        session.conn.mark_closed();

        match std::mem::replace(&mut session.state, SessionState::Closed) {
            SessionState::Closed => {
                debug!("Session {} already closed", session.id);
                return;
            }
            // The identifier belongs to another live client.
            SessionState::Rejected => return,
            SessionState::Unjoined | SessionState::Joined => {}
        }

        let record = match self.registry.remove(&session.id) {
            Ok(record) => record,
            Err(e) => {
                debug!("Nothing to remove for {}: {}", session.id, e);
                return;
            }
        };

        let Some(channel) = record.channel else {
            return;
        };
        let name = record
            .display_name
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

        info!("{} ({}) left channel {:?}", name, record.id, channel);
        self.channels.broadcast(
            &channel,
            &OutboundFrame::logout_notice(&channel, &truncate_display_name(&name), &record.id),
        );
        let count = self.channels.headcount(&channel);
        self.channels
            .broadcast(&channel, &OutboundFrame::headcount(&channel, count));
    }

    fn join(&self, session: &mut Session, frame: &InboundFrame) {
        let Some(claimed) = frame.client_id() else {
            debug!("Handshake from {} without identifier", session.id);
            return;
        };
        if sanitize(claimed) != session.id {
            debug!(
                "Handshake from {} claims identifier {:?}",
                session.id, claimed
            );
            return;
        }
        let Some(channel) = frame.channel().map(sanitize) else {
            debug!("Handshake from {} without channel", session.id);
            return;
        };
        let name = display_name(frame.name.as_deref());

        if let Err(e) = self.registry.set_membership(&session.id, &channel, &name) {
            debug!("Handshake from {} lost a race: {}", session.id, e);
            return;
        }
        session.state = SessionState::Joined;
        info!("{} ({}) joined channel {:?}", name, session.id, channel);

        self.channels.broadcast(
            &channel,
            &OutboundFrame::login_notice(&channel, &name, &session.id),
        );
        let count = self.channels.headcount(&channel);
        self.channels
            .broadcast(&channel, &OutboundFrame::headcount(&channel, count));
    }

    fn chat(&self, session: &Session, frame: &InboundFrame) -> Result<()> {
        let (Some(text), Some(_)) = (frame.message(), frame.channel()) else {
            debug!("Dropping empty chat frame from {}", session.id);
            return Ok(());
        };

        let record = self.registry.get(&session.id)?;
        let Some(channel) = record.channel.as_deref() else {
            return Ok(());
        };
        let name = truncate_display_name(
            record
                .display_name
                .as_deref()
                .unwrap_or(DEFAULT_DISPLAY_NAME),
        );
        let line = OutboundFrame::chat(
            &record.id,
            channel,
            &name,
            &sanitize(text),
            server_timestamp()?,
        );

        let members = self.channels.members_of(channel);
        debug!(
            "Relaying chat from {} to {} members of {:?}",
            record.id,
            members.len(),
            channel
        );
        for member in members {
            let frame = line.addressed_to(member.connection == session.conn);
            if let Err(e) = member.connection.send_frame(&frame) {
                error!("Failed to relay chat to {}: {}", member.id, e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionHandler for MessageRouter {
    type Session = Session;

    async fn on_open(&self, conn: ConnectionHandle) -> Session {
        self.open(conn)
    }

    async fn on_message(&self, session: &mut Session, message: Message) {
        self.receive(session, message);
    }

    async fn on_close(&self, session: &mut Session) {
        self.close(session);
    }
}
