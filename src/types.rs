//! Basic type definitions for the chat relay
//!
//! - `ConnectionId`: counter-based connection identifier
//! - `ClientState`: where a connection is in the nickname handshake
//! - `ConnectionInfo`: what a handler knows about the connection it serves

use std::fmt;
use std::net::SocketAddr;

/// Unique connection identifier (newtype pattern)
///
/// Handed out from a monotonically increasing counter, so an id is never
/// reused for a later connection even while stale references exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Take the current counter value as an id and advance the counter
    pub fn next(counter: &mut u64) -> Self {
        let id = Self(*counter);
        *counter += 1;
        id
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Handshake state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Stream open, no nickname yet
    Connected,
    /// Nickname set, eligible to chat
    NicknameSet,
    /// Terminal
    Disconnected,
}

/// Identity and peer address of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
}

impl ConnectionInfo {
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self { id, peer_addr }
    }
}

/// What the receive loop should do after a message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect,
}
