//! Connection handling
//!
//! [`handle_connection`] runs the receive loop of one accepted connection and
//! hands every message to a [`MessageHandler`]. The handler decides what a
//! message means; the loop only knows when to stop.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::transport::{self, MessageCodec, MessageWriter};
use crate::types::{ConnectionInfo, Flow};

/// Protocol plugged into the receive loop
///
/// Futures are `Send` so connection tasks can be spawned on the runtime.
pub trait MessageHandler: Send + Sync + 'static {
    /// A connection was accepted; `writer` is how to reach it
    fn on_connect(
        &self,
        conn: ConnectionInfo,
        writer: MessageWriter,
    ) -> impl Future<Output = ()> + Send;

    /// One message arrived
    fn on_message(&self, conn: ConnectionInfo, message: String) -> impl Future<Output = Flow> + Send;

    /// The receive loop ended, for whatever reason
    fn on_disconnect(&self, conn: ConnectionInfo) -> impl Future<Output = ()> + Send;

    /// The server is stopping
    fn on_shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Handle an accepted TCP connection until it ends
///
/// Peer close and an explicit `Flow::Disconnect` return `Ok`; transport
/// failures are returned after the handler has been told about the
/// disconnect.
pub async fn handle_connection<H: MessageHandler>(
    handler: Arc<H>,
    conn: ConnectionInfo,
    stream: TcpStream,
    codec: MessageCodec,
) -> Result<(), ChatError> {
    let (mut reader, writer) = transport::split(stream, codec);
    handler.on_connect(conn, writer).await;
    info!("Client {} connected from {}", conn.id, conn.peer_addr);

    let result = loop {
        match reader.recv().await {
            Ok(Some(message)) => {
                if handler.on_message(conn, message).await == Flow::Disconnect {
                    debug!("Handler ended connection {}", conn.id);
                    break Ok(());
                }
            }
            Ok(None) => {
                info!("Client {} ({}) closed the connection", conn.id, conn.peer_addr);
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    handler.on_disconnect(conn).await;
    info!("Connection {} closed", conn.id);
    result
}

/// Acknowledges every message back to its sender
///
/// Ends the connection when the acknowledgement cannot be delivered.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler {
    registry: Registry,
}

impl EchoHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageHandler for EchoHandler {
    fn on_connect(
        &self,
        conn: ConnectionInfo,
        writer: MessageWriter,
    ) -> impl Future<Output = ()> + Send {
        async move { self.registry.attach(conn.id, writer).await }
    }

    fn on_message(&self, conn: ConnectionInfo, message: String) -> impl Future<Output = Flow> + Send {
        async move {
            debug!("Received from {}: {}", conn.peer_addr, message);
            let reply = ServerMessage::Received { content: message }.to_string();
            match self.registry.send_to(conn.id, &reply).await {
                Ok(()) => Flow::Continue,
                Err(e) => {
                    debug!("Acknowledgement to {} failed: {}", conn.id, e);
                    Flow::Disconnect
                }
            }
        }
    }

    fn on_disconnect(&self, conn: ConnectionInfo) -> impl Future<Output = ()> + Send {
        async move {
            self.registry.detach(conn.id).await;
        }
    }

    fn on_shutdown(&self) -> impl Future<Output = ()> + Send {
        async move { self.registry.close_all().await }
    }
}
