//! Multi-client TCP Chat Relay Library
//!
//! A chat relay built on tokio: every connection announces a nickname, and
//! every line it sends afterwards is rebroadcast to all other members.
//!
//! # Features
//! - Nickname registration (`NICKNAME <name>`)
//! - Attributed broadcast of chat text (`[<name>]: <text>`)
//! - Join/leave notices, including for dropped connections
//! - Line framing or raw one-read-per-message framing
//! - Pluggable per-connection protocol (`MessageHandler`)
//!
//! # Architecture
//! - `ChatServer` runs the accept loop, one task per connection
//! - `handle_connection` is the receive loop feeding a `MessageHandler`
//! - `ChatHandler` implements the chat protocol over a shared `Registry`
//! - `Registry` holds membership behind one lock; broadcasts fan out while
//!   holding it
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatHandler, ChatServer, MessageCodec, Registry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::ChatError> {
//!     let handler = ChatHandler::new(Registry::new());
//!     let server = ChatServer::bind("127.0.0.1:8888", handler, MessageCodec::default()).await?;
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use chat::ChatHandler;
pub use client::{ChatClient, ExitReason};
pub use config::{ClientArgs, Framing, HandlerKind, ServerArgs, ServerConfig};
pub use error::ChatError;
pub use handler::{handle_connection, EchoHandler, MessageHandler};
pub use message::{ClientMessage, ServerMessage};
pub use registry::Registry;
pub use server::ChatServer;
pub use transport::{MessageCodec, MessageReader, MessageWriter};
pub use types::{ClientState, ConnectionId, ConnectionInfo, Flow};
