//! Broadcast engine
//!
//! Best-effort fan-out to every member except the sender. The registry lock
//! stays held across all sends, so one slow peer delays everyone queued
//! behind it; a concurrent removal can never race a send.

use std::collections::HashMap;

use tracing::debug;

use crate::registry::{active_ids, Entry, Members, Registry};
use crate::types::{ClientState, ConnectionId};

/// Active connections that have announced a nickname
fn recipients(
    entries: &HashMap<ConnectionId, Entry>,
    sender: ConnectionId,
) -> impl Iterator<Item = ConnectionId> + '_ {
    active_ids(entries, sender).filter(move |id| {
        entries
            .get(id)
            .is_some_and(|entry| entry.state == ClientState::NicknameSet)
    })
}

impl Registry {
    /// Send `text` to every other member
    ///
    /// Failures are logged and skipped. A failed peer's writer is closed and
    /// detached; its entry is reaped by its own receive loop. Returns how many
    /// sends succeeded.
    pub async fn broadcast(&self, sender: ConnectionId, text: &str) -> usize {
        let mut members = self.inner.lock().await;
        let Members { entries, writers } = &mut *members;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for id in recipients(entries, sender) {
            let Some(writer) = writers.get_mut(&id) else {
                continue;
            };
            match writer.send(text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("Broadcast to {} failed: {}", id, e);
                    failed.push(id);
                }
            }
        }
        for id in failed {
            members.close_writer(id).await;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;
    use crate::config::Framing;
    use crate::transport::{MessageCodec, MessageReader, MessageWriter};

    fn codec() -> MessageCodec {
        MessageCodec::new(Framing::Lines, 1024)
    }

    async fn join(registry: &Registry, n: u64, name: &str) -> MessageReader<DuplexStream> {
        let id = ConnectionId::new(n);
        let (local, remote) = tokio::io::duplex(4096);
        registry.attach(id, MessageWriter::new(local, codec())).await;
        registry.set_nickname(id, name).await;
        MessageReader::new(remote, codec())
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = Registry::new();
        let _alice = join(&registry, 1, "alice").await;
        let mut bob = join(&registry, 2, "bob").await;
        let mut carol = join(&registry, 3, "carol").await;

        let delivered = registry.broadcast(ConnectionId::new(1), "[alice]: hi").await;
        assert_eq!(delivered, 2);
        assert_eq!(bob.recv().await.unwrap().as_deref(), Some("[alice]: hi"));
        assert_eq!(carol.recv().await.unwrap().as_deref(), Some("[alice]: hi"));
    }

    #[tokio::test]
    async fn test_broadcast_skips_unnamed_connections() {
        let registry = Registry::new();
        let _alice = join(&registry, 1, "alice").await;

        let lurker = ConnectionId::new(2);
        let (local, _remote) = tokio::io::duplex(4096);
        registry.attach(lurker, MessageWriter::new(local, codec())).await;
        registry.ensure_entry(lurker).await;

        assert_eq!(registry.broadcast(ConnectionId::new(1), "x").await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_survives_failed_peer() {
        let registry = Registry::new();
        let _alice = join(&registry, 1, "alice").await;
        let broken = join(&registry, 2, "broken").await;
        let mut carol = join(&registry, 3, "carol").await;
        drop(broken);

        let delivered = registry.broadcast(ConnectionId::new(1), "still here").await;
        assert_eq!(delivered, 1);
        assert_eq!(carol.recv().await.unwrap().as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn test_removed_member_gets_nothing() {
        let registry = Registry::new();
        let _alice = join(&registry, 1, "alice").await;
        let _bob = join(&registry, 2, "bob").await;

        registry.remove(ConnectionId::new(2)).await;
        assert_eq!(registry.broadcast(ConnectionId::new(1), "x").await, 0);
    }

    #[tokio::test]
    async fn test_truncated_peer_is_cut_off() {
        let registry = Registry::new();
        let _alice = join(&registry, 1, "alice").await;
        let mut carol = join(&registry, 3, "carol").await;

        // Room for only part of the first message
        let bob = ConnectionId::new(2);
        let (local, mut remote) = tokio::io::duplex(8);
        registry.attach(bob, MessageWriter::new(local, codec())).await;
        registry.set_nickname(bob, "bob").await;

        let alice = ConnectionId::new(1);
        assert_eq!(registry.broadcast(alice, "[alice]: first message").await, 1);
        assert_eq!(registry.broadcast(alice, "[alice]: second").await, 1);
        assert!(!registry.detach(bob).await);

        let mut received = Vec::new();
        remote.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"[alice]:");

        assert_eq!(
            carol.recv().await.unwrap().as_deref(),
            Some("[alice]: first message")
        );
        assert_eq!(carol.recv().await.unwrap().as_deref(), Some("[alice]: second"));
    }
}
