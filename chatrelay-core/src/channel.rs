//! Channel membership, derived from the registry on every call.

use std::sync::Arc;
use tracing::{debug, error};

use crate::frame::OutboundFrame;
use crate::registry::{ClientRecord, Registry};

/// Read-only view answering "who is in this channel right now".
///
/// Nothing is cached: every query filters the registry at the moment it is
/// called.
#[derive(Debug, Clone)]
pub struct ChannelIndex {
    registry: Arc<Registry>,
}

impl ChannelIndex {
    /// Creates an index over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Every joined client whose channel equals `channel` exactly.
    ///
    /// An empty channel name never matches anyone.
    pub fn members_of(&self, channel: &str) -> Vec<ClientRecord> {
        if channel.is_empty() {
            return Vec::new();
        }
        self.registry.collect_where(|record| record.in_channel(channel))
    }

    /// Number of clients currently in `channel`.
    pub fn headcount(&self, channel: &str) -> usize {
        self.members_of(channel).len()
    }

    /// Sends `frame` to every member of `channel`.
    ///
    /// Members whose connection is closing are skipped, failed sends are
    /// logged. Returns the number of members the frame was queued for.
    pub fn broadcast(&self, channel: &str, frame: &OutboundFrame) -> usize {
        let members = self.members_of(channel);
        let mut delivered = 0;
        for member in &members {
            if !member.connection.is_open() {
                continue;
            }
            match member.connection.send_frame(frame) {
                Ok(()) => delivered += 1,
                Err(e) => error!("Failed to broadcast to {}: {}", member.id, e),
            }
        }
        debug!(
            "Broadcast to channel {:?}: {} of {} members",
            channel,
            delivered,
            members.len()
        );
        delivered
    }
}
