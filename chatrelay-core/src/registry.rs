//! The client registry: the single source of truth for who is connected and
//! which channel they joined.
//!
//! A [`ClientRecord`] is created when a connection opens, filled in by the
//! init handshake and removed when the connection closes. The registry is a
//! plain owned value; servers share it as `Arc<Registry>` and tests build
//! their own.
//!
//! # Thread Safety
//!
//! Records live in a [`DashMap`]. Every operation locks only the shard it
//! touches, and [`Registry::set_membership`] writes the channel and display
//! name under one entry lock, so a concurrent reader sees a record either
//! fully unjoined or fully joined.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::connection::ConnectionHandle;
use crate::error::{Error, Result};
use crate::sanitize::{sanitize, truncate_display_name};

/// Opaque client identifier, unique among live clients.
pub type ClientId = String;

/// Registry state for one live connection.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Identifier assigned at open.
    pub id: ClientId,
    /// Handle used to push frames to this client.
    pub connection: ConnectionHandle,
    /// Joined channel, unset until the handshake completes.
    pub channel: Option<String>,
    /// Sanitized display name of at most 10 characters.
    pub display_name: Option<String>,
}

impl ClientRecord {
    fn new(id: ClientId, connection: ConnectionHandle) -> Self {
        Self {
            id,
            connection,
            channel: None,
            display_name: None,
        }
    }

    /// Whether the client completed the handshake.
    pub fn is_joined(&self) -> bool {
        self.channel.is_some()
    }

    /// Whether the client is a member of `channel`.
    pub fn in_channel(&self, channel: &str) -> bool {
        self.channel.as_deref() == Some(channel)
    }
}

/// Process-wide table of live clients.
///
/// # Examples
///
/// ```
/// use chatrelay_core::prelude::*;
/// use tokio::sync::mpsc;
///
/// let registry = Registry::new();
/// let (tx, _rx) = mpsc::unbounded_channel();
/// let conn = ConnectionHandle::new("127.0.0.1:50000".parse().unwrap(), tx);
///
/// registry.insert("aB3dE5gH7j".to_string(), conn.clone()).unwrap();
/// assert!(matches!(
///     registry.insert("aB3dE5gH7j".to_string(), conn),
///     Err(Error::DuplicateIdentifier(_))
/// ));
///
/// registry.set_membership("aB3dE5gH7j", "42", "Alice").unwrap();
/// assert_eq!(registry.get("aB3dE5gH7j").unwrap().channel.as_deref(), Some("42"));
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    clients: DashMap<ClientId, ClientRecord>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Registers a freshly opened connection under `id`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateIdentifier`] if `id` is already held; the existing
    /// record is left untouched.
    pub fn insert(&self, id: ClientId, connection: ConnectionHandle) -> Result<()> {
        match self.clients.entry(id) {
            Entry::Occupied(entry) => Err(Error::DuplicateIdentifier(entry.key().clone())),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                entry.insert(ClientRecord::new(id.clone(), connection));
                info!("Registered client {} (Total: {})", id, self.clients.len());
                Ok(())
            }
        }
    }

    /// Records the channel and display name chosen in the handshake.
    ///
    /// The channel is sanitized and the display name sanitized and truncated
    /// here as well, so a record never holds raw client text.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownClient`] if `id` is not registered.
    pub fn set_membership(&self, id: &str, channel: &str, display_name: &str) -> Result<()> {
        let channel = sanitize(channel);
        let display_name = truncate_display_name(&sanitize(display_name));

        let mut record = self
            .clients
            .get_mut(id)
            .ok_or_else(|| Error::UnknownClient(id.to_string()))?;
        record.channel = Some(channel);
        record.display_name = Some(display_name);
        debug!("Client {} joined channel {:?}", id, record.channel);
        Ok(())
    }

    /// Removes and returns the record for `id`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownClient`] if the record is already gone. Callers
    /// handling a close treat this as a no-op.
    pub fn remove(&self, id: &str) -> Result<ClientRecord> {
        let (_, record) = self
            .clients
            .remove(id)
            .ok_or_else(|| Error::UnknownClient(id.to_string()))?;
        info!("Removed client {} (Total: {})", id, self.clients.len());
        Ok(record)
    }

    /// Returns a snapshot of the record for `id`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownClient`] if `id` is not registered.
    pub fn get(&self, id: &str) -> Result<ClientRecord> {
        self.clients
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownClient(id.to_string()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Number of registered clients, joined or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Snapshots every record matching `predicate`.
    ///
    /// Each record is cloned out while its shard is read-locked, so the
    /// result never contains a half-updated record.
    pub(crate) fn collect_where<F>(&self, predicate: F) -> Vec<ClientRecord>
    where
        F: Fn(&ClientRecord) -> bool,
    {
        self.clients
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}
