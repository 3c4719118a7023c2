//! Chat Relay Server - Entry Point
//!
//! Loads configuration, binds the listener and runs the accept loop until
//! Ctrl-C.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{
    ChatHandler, ChatServer, EchoHandler, HandlerKind, MessageHandler, Registry, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;

    // Use RUST_LOG env var to override, e.g. RUST_LOG=chat_relay=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        listen = %config.listen,
        framing = ?config.framing,
        handler = ?config.handler,
        buffer_size = config.buffer_size,
        "Starting chat relay"
    );

    let result = match config.handler {
        HandlerKind::Chat => serve(&config, ChatHandler::new(Registry::new())).await,
        HandlerKind::Echo => serve(&config, EchoHandler::new()).await,
    };
    if let Err(e) = &result {
        error!("Server failed to start: {}", e);
    }
    Ok(result?)
}

async fn serve<H: MessageHandler>(config: &ServerConfig, handler: H) -> Result<(), chat_relay::ChatError> {
    let server = ChatServer::bind(&config.listen, handler, config.codec()).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}
