//! Error types for the chat relay
//!
//! Transport setup failures are fatal to the side that hit them. Everything
//! that happens mid-session ends only the affected connection.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Relay-level errors
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bind, listen or connect failed (fatal)
    #[error("Failed to set up transport on {addr}: {source}")]
    TransportSetup {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error on an established stream (treated as disconnection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream accepted fewer bytes than one send asked for
    #[error("Partial send: {written} of {expected} bytes written")]
    PartialSend { written: usize, expected: usize },

    /// A line grew past the configured buffer size without a terminator
    #[error("Line exceeds maximum length of {limit} bytes")]
    FrameTooLong { limit: usize },

    /// Config file could not be read
    #[error("Failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl ChatError {
    /// Wrap a bind/connect failure together with the address it was for
    pub fn setup(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransportSetup {
            addr: addr.into(),
            source,
        }
    }
}
