//! Relay server lifecycle
//!
//! Owns the listener and the accept loop. Each accepted stream gets a
//! counter-based id and its own task running [`handle_connection`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::ChatError;
use crate::handler::{handle_connection, MessageHandler};
use crate::transport::{self, MessageCodec};
use crate::types::{ConnectionId, ConnectionInfo};

/// A bound relay server, ready to accept
pub struct ChatServer<H> {
    listener: TcpListener,
    handler: Arc<H>,
    codec: MessageCodec,
}

impl<H: MessageHandler> ChatServer<H> {
    /// Bind the listening endpoint
    pub async fn bind(addr: &str, handler: H, codec: MessageCodec) -> Result<Self, ChatError> {
        let listener = transport::bind(addr).await?;
        Ok(Self::from_listener(listener, handler, codec))
    }

    pub fn from_listener(listener: TcpListener, handler: H, codec: MessageCodec) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            codec,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handler(&self) -> Arc<H> {
        Arc::clone(&self.handler)
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// On shutdown the listener is dropped, connection tasks are aborted and
    /// the handler closes whatever it still holds.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            handler,
            codec,
        } = self;
        let mut tasks = JoinSet::new();
        let mut next_id = 1;
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            info!("Chat relay listening on {}", addr);
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down, {} connection(s) open", tasks.len());
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let conn = ConnectionInfo::new(ConnectionId::next(&mut next_id), peer_addr);
                        debug!("Accepted {} from {}", conn.id, peer_addr);
                        let handler = Arc::clone(&handler);
                        tasks.spawn(async move {
                            if let Err(e) = handle_connection(handler, conn, stream, codec).await {
                                error!("Connection {} failed: {}", conn.id, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Connection task panicked: {}", e);
                        }
                    }
                }
            }
        }

        drop(listener);
        tasks.shutdown().await;
        handler.on_shutdown().await;
        info!("Server stopped");
    }
}
