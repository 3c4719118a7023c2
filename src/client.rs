//! Terminal client
//!
//! One connection to the relay. A spawned task writes everything the server
//! sends to `output` while the caller's input lines are sent as messages.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::message::{ClientMessage, EXIT_COMMAND};
use crate::transport::{self, MessageCodec, MessageReader, MessageWriter};

/// Why [`ChatClient::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user typed `exit`
    UserExit,
    /// Input ended; `exit` was sent on the user's behalf
    InputClosed,
    /// The server closed the stream or a send failed
    Disconnected,
}

/// Connected chat client
pub struct ChatClient {
    reader: MessageReader<OwnedReadHalf>,
    writer: MessageWriter,
}

impl ChatClient {
    /// Connect to the relay at `addr`
    pub async fn connect(addr: &str, codec: MessageCodec) -> Result<Self, ChatError> {
        let stream = transport::connect(addr).await?;
        info!("Connected to {}", addr);
        let (reader, writer) = transport::split(stream, codec);
        Ok(Self { reader, writer })
    }

    /// Announce the nickname; must precede any chat input
    pub async fn join(&mut self, nickname: &str) -> Result<(), ChatError> {
        self.writer
            .send(&ClientMessage::nickname_command(nickname))
            .await
    }

    /// Relay `input` lines to the server and server messages to `output`
    ///
    /// Empty lines are not sent.
    pub async fn run<I, O>(self, input: I, output: O) -> Result<ExitReason, ChatError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Send + Unpin + 'static,
    {
        let Self { reader, mut writer } = self;
        let mut receiver = tokio::spawn(receive_loop(reader, output));
        let mut lines = input.lines();

        let reason = loop {
            tokio::select! {
                line = lines.next_line() => {
                    let (line, reason) = match line? {
                        Some(line) => (line, ExitReason::UserExit),
                        None => (EXIT_COMMAND.to_string(), ExitReason::InputClosed),
                    };
                    let line = line.trim_end_matches('\r');
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = writer.send(line).await {
                        warn!("Send failed: {}", e);
                        break ExitReason::Disconnected;
                    }
                    if line == EXIT_COMMAND {
                        break reason;
                    }
                }
                received = &mut receiver => {
                    match received {
                        Ok(Err(e)) => warn!("Receive failed: {}", e),
                        Err(e) => warn!("Receive task ended abnormally: {}", e),
                        Ok(Ok(())) => debug!("Server closed the connection"),
                    }
                    return Ok(ExitReason::Disconnected);
                }
            }
        };

        receiver.abort();
        if let Err(e) = writer.close().await {
            debug!("Closing connection failed: {}", e);
        }
        Ok(reason)
    }
}

/// Copy server messages to `output`, one per line, until end of stream
async fn receive_loop<O>(mut reader: MessageReader<OwnedReadHalf>, mut output: O) -> Result<(), ChatError>
where
    O: AsyncWrite + Unpin,
{
    while let Some(message) = reader.recv().await? {
        output.write_all(message.as_bytes()).await?;
        if !message.ends_with('\n') {
            output.write_all(b"\n").await?;
        }
        output.flush().await?;
    }
    Ok(())
}
