//! Chat protocol handler
//!
//! Interprets each message as a nickname command, `exit`, or chat text and
//! drives the registry and broadcast accordingly.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::handler::MessageHandler;
use crate::message::{ClientMessage, ServerMessage};
use crate::registry::Registry;
use crate::transport::MessageWriter;
use crate::types::{ClientState, ConnectionInfo, Flow};

/// The chat relay protocol
#[derive(Debug, Clone, Default)]
pub struct ChatHandler {
    registry: Registry,
}

impl ChatHandler {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Classify and act on one message
    pub async fn handle(&self, conn: ConnectionInfo, message: &str) -> Flow {
        self.registry.ensure_entry(conn.id).await;

        match ClientMessage::parse(message) {
            ClientMessage::Nickname(name) => {
                self.join(conn, name).await;
                Flow::Continue
            }
            ClientMessage::Exit => {
                self.leave(conn).await;
                Flow::Disconnect
            }
            ClientMessage::Chat(text) => {
                self.chat(conn, text).await;
                Flow::Continue
            }
        }
    }

    async fn join(&self, conn: ConnectionInfo, name: &str) {
        if self.registry.state(conn.id).await == ClientState::NicknameSet {
            warn!("Client {} sent a second nickname command", conn.id);
        }
        let nickname = self.registry.set_nickname(conn.id, name).await;
        info!("User {} joined the chat", nickname);

        let notice = ServerMessage::Joined {
            nickname: nickname.clone(),
        };
        self.registry.broadcast(conn.id, &notice.to_string()).await;

        let confirmation = ServerMessage::NicknameSet { nickname };
        if let Err(e) = self.registry.send_to(conn.id, &confirmation.to_string()).await {
            debug!("Nickname confirmation to {} failed: {}", conn.id, e);
        }
    }

    /// Remove the connection's entry, announcing it if it had joined
    ///
    /// Safe to call twice: the second call finds no entry and stays silent.
    async fn leave(&self, conn: ConnectionInfo) {
        let nickname = match self.registry.remove_entry(conn.id).await {
            Some((ClientState::NicknameSet, nickname)) => {
                nickname.unwrap_or_else(|| conn.peer_addr.to_string())
            }
            Some(_) => {
                debug!("Client {} left without a nickname", conn.id);
                return;
            }
            None => return,
        };

        info!("User {} left the chat", nickname);
        let notice = ServerMessage::Left { nickname };
        self.registry.broadcast(conn.id, &notice.to_string()).await;
    }

    async fn chat(&self, conn: ConnectionInfo, text: &str) {
        let Some(from) = self.registry.member_nickname(conn.id).await else {
            debug!("Ignoring message from {} before nickname", conn.id);
            return;
        };
        let message = ServerMessage::Chat {
            from,
            content: text.to_string(),
        }
        .to_string();
        debug!("Relaying: {}", message);
        self.registry.broadcast(conn.id, &message).await;
    }
}

impl MessageHandler for ChatHandler {
    fn on_connect(
        &self,
        conn: ConnectionInfo,
        writer: MessageWriter,
    ) -> impl Future<Output = ()> + Send {
        async move { self.registry.attach(conn.id, writer).await }
    }

    fn on_message(&self, conn: ConnectionInfo, message: String) -> impl Future<Output = Flow> + Send {
        async move { self.handle(conn, &message).await }
    }

    fn on_disconnect(&self, conn: ConnectionInfo) -> impl Future<Output = ()> + Send {
        async move {
            self.leave(conn).await;
            self.registry.detach(conn.id).await;
            debug!(
                "{} connection(s) remain",
                self.registry.active_ids(conn.id).await.len()
            );
        }
    }

    fn on_shutdown(&self) -> impl Future<Output = ()> + Send {
        async move { self.registry.close_all().await }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::DuplexStream;

    use super::*;
    use crate::config::Framing;
    use crate::transport::{MessageCodec, MessageReader};
    use crate::types::ConnectionId;

    fn codec() -> MessageCodec {
        MessageCodec::new(Framing::Lines, 1024)
    }

    async fn connect(handler: &ChatHandler, n: u64) -> (ConnectionInfo, MessageReader<DuplexStream>) {
        let addr: SocketAddr = format!("127.0.0.1:{}", 40000 + n).parse().unwrap();
        let conn = ConnectionInfo::new(ConnectionId::new(n), addr);
        let (local, remote) = tokio::io::duplex(4096);
        handler
            .on_connect(conn, MessageWriter::new(local, codec()))
            .await;
        (conn, MessageReader::new(remote, codec()))
    }

    async fn next(reader: &mut MessageReader<DuplexStream>) -> String {
        reader.recv().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_nickname_is_trimmed_and_confirmed() {
        let handler = ChatHandler::default();
        let (alice, mut alice_rx) = connect(&handler, 1).await;

        let flow = handler.handle(alice, "NICKNAME   alice  ").await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(next(&mut alice_rx).await, "Nickname set to: alice");
    }

    #[tokio::test]
    async fn test_chat_before_nickname_is_dropped() {
        let handler = ChatHandler::default();
        let (alice, _alice_rx) = connect(&handler, 1).await;
        let (bob, mut bob_rx) = connect(&handler, 2).await;
        handler.handle(bob, "NICKNAME bob").await;
        assert_eq!(next(&mut bob_rx).await, "Nickname set to: bob");

        assert_eq!(handler.handle(alice, "hello?").await, Flow::Continue);
        assert_eq!(handler.handle(alice, "hi").await, Flow::Continue);

        handler.handle(alice, "NICKNAME alice").await;
        assert_eq!(next(&mut bob_rx).await, "SYSTEM: alice joined the chat");
    }

    #[tokio::test]
    async fn test_chat_is_attributed_in_order() {
        let handler = ChatHandler::default();
        let (alice, mut alice_rx) = connect(&handler, 1).await;
        let (bob, mut bob_rx) = connect(&handler, 2).await;

        handler.handle(alice, "NICKNAME alice").await;
        assert_eq!(next(&mut alice_rx).await, "Nickname set to: alice");
        handler.handle(bob, "NICKNAME bob").await;
        assert_eq!(next(&mut alice_rx).await, "SYSTEM: bob joined the chat");
        assert_eq!(next(&mut bob_rx).await, "Nickname set to: bob");

        for text in ["one", "two", "three"] {
            handler.handle(alice, text).await;
        }
        assert_eq!(next(&mut bob_rx).await, "[alice]: one");
        assert_eq!(next(&mut bob_rx).await, "[alice]: two");
        assert_eq!(next(&mut bob_rx).await, "[alice]: three");
    }

    #[tokio::test]
    async fn test_exit_announces_once_and_stops_delivery() {
        let handler = ChatHandler::default();
        let (alice, mut alice_rx) = connect(&handler, 1).await;
        let (bob, mut bob_rx) = connect(&handler, 2).await;
        handler.handle(bob, "NICKNAME bob").await;
        handler.handle(alice, "NICKNAME alice").await;
        assert_eq!(next(&mut bob_rx).await, "Nickname set to: bob");
        assert_eq!(next(&mut bob_rx).await, "SYSTEM: alice joined the chat");

        assert_eq!(handler.handle(bob, "exit").await, Flow::Disconnect);
        handler.on_disconnect(bob).await;
        handler.on_disconnect(bob).await;

        assert!(handler.registry().active_ids(alice.id).await.is_empty());
        assert_eq!(handler.registry().broadcast(alice.id, "anyone?").await, 0);

        assert_eq!(next(&mut alice_rx).await, "Nickname set to: alice");
        assert_eq!(next(&mut alice_rx).await, "SYSTEM: bob left the chat");
        handler.registry().detach(alice.id).await;
        assert_eq!(alice_rx.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disconnect_without_nickname_is_silent() {
        let handler = ChatHandler::default();
        let (alice, mut alice_rx) = connect(&handler, 1).await;
        let (stranger, _stranger_rx) = connect(&handler, 2).await;
        handler.handle(alice, "NICKNAME alice").await;
        assert_eq!(next(&mut alice_rx).await, "Nickname set to: alice");

        handler.handle(stranger, "hi").await;
        handler.on_disconnect(stranger).await;
        handler.handle(alice, "exit").await;
        handler.on_disconnect(alice).await;

        // Alice's writer is closed; nothing arrived before end of stream
        assert_eq!(alice_rx.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transport_disconnect_announces_like_exit() {
        let handler = ChatHandler::default();
        let (alice, mut alice_rx) = connect(&handler, 1).await;
        let (bob, mut bob_rx) = connect(&handler, 2).await;
        handler.handle(bob, "NICKNAME bob").await;
        handler.handle(alice, "NICKNAME alice").await;
        assert_eq!(next(&mut bob_rx).await, "Nickname set to: bob");
        assert_eq!(next(&mut bob_rx).await, "SYSTEM: alice joined the chat");

        handler.on_disconnect(alice).await;
        assert_eq!(next(&mut bob_rx).await, "SYSTEM: alice left the chat");
    }

    #[tokio::test]
    async fn test_duplicate_nicknames_are_independent() {
        let handler = ChatHandler::default();
        let (first, mut first_rx) = connect(&handler, 1).await;
        let (second, mut second_rx) = connect(&handler, 2).await;
        handler.handle(first, "NICKNAME sam").await;
        handler.handle(second, "NICKNAME sam").await;
        assert_eq!(next(&mut first_rx).await, "Nickname set to: sam");
        assert_eq!(next(&mut first_rx).await, "SYSTEM: sam joined the chat");
        assert_eq!(next(&mut second_rx).await, "Nickname set to: sam");

        handler.handle(second, "hey").await;
        handler.handle(first, "hey yourself").await;
        assert_eq!(next(&mut first_rx).await, "[sam]: hey");
        assert_eq!(next(&mut second_rx).await, "[sam]: hey yourself");
    }
}
