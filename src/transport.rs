//! Stream transport
//!
//! Turns a TCP stream into a [`MessageReader`] and a [`MessageWriter`] that
//! speak whole messages through [`MessageCodec`]. Setup helpers wrap their
//! failures as `ChatError::TransportSetup`.

use std::fmt;

use bytes::{BufMut, BytesMut};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, Encoder, FramedRead};

use crate::config::Framing;
use crate::error::ChatError;

/// Default maximum message size (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Splits a byte stream into text messages and back
///
/// In `Raw` mode one decode hands out everything buffered so far, which is
/// whatever the last read returned. In `Lines` mode a message ends at `\n`
/// and may hold at most `max_length` bytes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCodec {
    framing: Framing,
    max_length: usize,
    // Bytes of `src` already searched for `\n`
    next_index: usize,
}

impl MessageCodec {
    pub fn new(framing: Framing, max_length: usize) -> Self {
        Self {
            framing,
            max_length: max_length.max(1),
            next_index: 0,
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(Framing::default(), DEFAULT_BUFFER_SIZE)
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for MessageCodec {
    type Item = String;
    type Error = ChatError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ChatError> {
        match self.framing {
            Framing::Raw => {
                if src.is_empty() {
                    return Ok(None);
                }
                let len = src.len().min(self.max_length);
                let chunk = src.split_to(len);
                Ok(Some(String::from_utf8_lossy(&chunk).into_owned()))
            }
            Framing::Lines => {
                let read_to = src.len().min(self.max_length.saturating_add(1));
                let start = self.next_index.min(read_to);
                match src[start..read_to].iter().position(|b| *b == b'\n') {
                    Some(offset) => {
                        let pos = start + offset;
                        self.next_index = 0;
                        let line = src.split_to(pos + 1);
                        Ok(Some(decode_text(&line[..pos])))
                    }
                    None if src.len() > self.max_length => {
                        self.next_index = 0;
                        Err(ChatError::FrameTooLong {
                            limit: self.max_length,
                        })
                    }
                    None => {
                        self.next_index = read_to;
                        Ok(None)
                    }
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ChatError> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Unterminated trailing line
        self.next_index = 0;
        let rest = src.split_to(src.len());
        Ok(Some(decode_text(&rest)))
    }
}

impl Encoder<&str> for MessageCodec {
    type Error = ChatError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), ChatError> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        if self.framing == Framing::Lines {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}

/// Receiving half of a connection
pub struct MessageReader<R> {
    frames: FramedRead<R, MessageCodec>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R, codec: MessageCodec) -> Self {
        Self {
            frames: FramedRead::new(inner, codec),
        }
    }

    /// Wait for the next message
    ///
    /// `Ok(None)` means the peer closed the stream.
    pub async fn recv(&mut self) -> Result<Option<String>, ChatError> {
        self.frames.next().await.transpose()
    }
}

/// Sending half of a connection
///
/// Each `send` is a single write; a short write is reported as
/// `ChatError::PartialSend` and not resumed.
pub struct MessageWriter {
    inner: Box<dyn AsyncWrite + Send + Sync + Unpin>,
    codec: MessageCodec,
    buf: BytesMut,
}

impl MessageWriter {
    pub fn new<W>(inner: W, codec: MessageCodec) -> Self
    where
        W: AsyncWrite + Send + Sync + Unpin + 'static,
    {
        Self {
            inner: Box::new(inner),
            codec,
            buf: BytesMut::new(),
        }
    }

    pub async fn send(&mut self, text: &str) -> Result<(), ChatError> {
        self.buf.clear();
        self.codec.encode(text, &mut self.buf)?;

        let expected = self.buf.len();
        let written = self.inner.write(&self.buf).await?;
        if written < expected {
            return Err(ChatError::PartialSend { written, expected });
        }
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side; the peer sees end of stream
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

impl fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageWriter")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Split a connected stream into its message halves
pub fn split(stream: TcpStream, codec: MessageCodec) -> (MessageReader<OwnedReadHalf>, MessageWriter) {
    let (read_half, write_half) = stream.into_split();
    (
        MessageReader::new(read_half, codec),
        MessageWriter::new(write_half, codec),
    )
}

/// Open a client connection
pub async fn connect(addr: &str) -> Result<TcpStream, ChatError> {
    TcpStream::connect(addr)
        .await
        .map_err(|e| ChatError::setup(addr, e))
}

/// Bind a listening endpoint
pub async fn bind(addr: &str) -> Result<TcpListener, ChatError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ChatError::setup(addr, e))
}
