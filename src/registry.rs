//! Client registry
//!
//! The authoritative view of who is in the chat: per-connection handshake
//! state and nickname, plus the writer used to reach each connection.
//! Every operation takes the one registry lock for its whole duration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ChatError;
use crate::transport::MessageWriter;
use crate::types::{ClientState, ConnectionId};

/// Per-connection membership record
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) state: ClientState,
    pub(crate) nickname: Option<String>,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: ClientState::Connected,
            nickname: None,
        }
    }
}

/// Everything behind the registry lock
#[derive(Debug, Default)]
pub(crate) struct Members {
    pub(crate) entries: HashMap<ConnectionId, Entry>,
    pub(crate) writers: HashMap<ConnectionId, MessageWriter>,
}

impl Members {
    /// Remove and shut down the writer for `id`
    pub(crate) async fn close_writer(&mut self, id: ConnectionId) -> bool {
        let Some(mut writer) = self.writers.remove(&id) else {
            return false;
        };
        if let Err(e) = writer.close().await {
            debug!("Closing writer for {} failed: {}", id, e);
        }
        true
    }
}

/// Ids of entries that are not disconnected, skipping `excluding`
pub(crate) fn active_ids(
    entries: &HashMap<ConnectionId, Entry>,
    excluding: ConnectionId,
) -> impl Iterator<Item = ConnectionId> + '_ {
    entries
        .iter()
        .filter(move |(id, entry)| **id != excluding && entry.state != ClientState::Disconnected)
        .map(|(id, _)| *id)
}

/// Shared handle to the client registry
///
/// Cloning is cheap; all clones see the same membership.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub(crate) inner: Arc<Mutex<Members>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the writer for a freshly accepted connection
    pub async fn attach(&self, id: ConnectionId, writer: MessageWriter) {
        let mut members = self.inner.lock().await;
        members.writers.insert(id, writer);
    }

    /// Drop a connection's writer, shutting down its write side
    ///
    /// Returns false if nothing was attached.
    pub async fn detach(&self, id: ConnectionId) -> bool {
        let mut members = self.inner.lock().await;
        members.close_writer(id).await
    }

    /// Insert a `Connected` entry if none exists
    pub async fn ensure_entry(&self, id: ConnectionId) {
        let mut members = self.inner.lock().await;
        members.entries.entry(id).or_insert_with(Entry::new);
    }

    /// Record a nickname and mark the connection eligible to chat
    ///
    /// Surrounding whitespace is trimmed; the stored name is returned.
    /// A second call overwrites the first.
    pub async fn set_nickname(&self, id: ConnectionId, name: &str) -> String {
        let nickname = name.trim().to_string();
        let mut members = self.inner.lock().await;
        let entry = members.entries.entry(id).or_insert_with(Entry::new);
        entry.nickname = Some(nickname.clone());
        entry.state = ClientState::NicknameSet;
        nickname
    }

    /// Delete the entry, returning the nickname on record (empty if none)
    pub async fn remove(&self, id: ConnectionId) -> String {
        self.remove_entry(id)
            .await
            .and_then(|(_, nickname)| nickname)
            .unwrap_or_default()
    }

    /// Delete the entry, returning the state and nickname it had
    ///
    /// `None` if there was no entry.
    pub async fn remove_entry(&self, id: ConnectionId) -> Option<(ClientState, Option<String>)> {
        let mut members = self.inner.lock().await;
        members
            .entries
            .remove(&id)
            .map(|entry| (entry.state, entry.nickname))
    }

    /// Nickname of a connection that has joined, `None` otherwise
    pub async fn member_nickname(&self, id: ConnectionId) -> Option<String> {
        let members = self.inner.lock().await;
        members
            .entries
            .get(&id)
            .filter(|entry| entry.state == ClientState::NicknameSet)
            .and_then(|entry| entry.nickname.clone())
    }

    /// Nickname on record, else `fallback`
    pub async fn nickname_or_fallback(&self, id: ConnectionId, fallback: &str) -> String {
        let members = self.inner.lock().await;
        members
            .entries
            .get(&id)
            .and_then(|entry| entry.nickname.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Current handshake state
    ///
    /// A connection with a writer but no entry yet counts as `Connected`;
    /// one with neither is `Disconnected`.
    pub async fn state(&self, id: ConnectionId) -> ClientState {
        let members = self.inner.lock().await;
        match members.entries.get(&id) {
            Some(entry) => entry.state,
            None if members.writers.contains_key(&id) => ClientState::Connected,
            None => ClientState::Disconnected,
        }
    }

    /// Snapshot of all active ids except `excluding`
    pub async fn active_ids(&self, excluding: ConnectionId) -> Vec<ConnectionId> {
        let members = self.inner.lock().await;
        let mut ids: Vec<_> = active_ids(&members.entries, excluding).collect();
        ids.sort();
        ids
    }

    /// Send directly to one connection
    ///
    /// Sending to an id without a writer is a no-op. On failure the writer
    /// is closed and detached before the error is returned.
    pub async fn send_to(&self, id: ConnectionId, text: &str) -> Result<(), ChatError> {
        let mut members = self.inner.lock().await;
        let Some(writer) = members.writers.get_mut(&id) else {
            return Ok(());
        };
        if let Err(e) = writer.send(text).await {
            members.close_writer(id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Close every writer and forget all entries
    pub async fn close_all(&self) {
        let mut members = self.inner.lock().await;
        for (id, mut writer) in members.writers.drain() {
            if let Err(e) = writer.close().await {
                debug!("Closing writer for {} failed: {}", id, e);
            }
        }
        members.entries.clear();
    }
}
