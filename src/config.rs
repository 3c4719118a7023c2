//! Configuration for the relay server and the terminal client.
//!
//! The server reads command-line arguments and an optional TOML file; CLI
//! values take precedence over file values, file values over defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::error::ChatError;
use crate::transport::{MessageCodec, DEFAULT_BUFFER_SIZE};

/// How messages are delimited on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One `\n`-terminated line per message
    #[default]
    Lines,
    /// One read per message, no delimiter
    Raw,
}

/// Which protocol the server speaks on accepted connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Nickname registration and broadcast
    #[default]
    Chat,
    /// Acknowledge every message back to its sender
    Echo,
}

/// Command-line arguments for the relay server
#[derive(Parser, Debug, Default)]
#[command(name = "chat_relay")]
#[command(version)]
#[command(about = "Multi-client TCP chat relay", long_about = None)]
pub struct ServerArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8888)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum message size in bytes
    #[arg(short = 'b', long)]
    pub buffer_size: Option<usize>,

    /// Message framing
    #[arg(short = 'f', long, value_enum)]
    pub framing: Option<Framing>,

    /// Connection handler
    #[arg(long, value_enum)]
    pub handler: Option<HandlerKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[server]` table
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default)]
    pub handler: HandlerKind,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            buffer_size: default_buffer_size(),
            framing: Framing::default(),
            handler: HandlerKind::default(),
        }
    }
}

/// `[logging]` table
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: String,
    pub buffer_size: usize,
    pub framing: Framing,
    pub handler: HandlerKind,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::merge(ServerArgs::default(), TomlConfig::default())
    }
}

impl ServerConfig {
    /// Load configuration from process arguments and the optional TOML file
    pub fn load() -> Result<Self, ChatError> {
        Self::from_args(ServerArgs::parse())
    }

    pub fn from_args(args: ServerArgs) -> Result<Self, ChatError> {
        let file = match args.config {
            Some(ref path) => read_toml(path)?,
            None => TomlConfig::default(),
        };
        Ok(Self::merge(args, file))
    }

    fn merge(args: ServerArgs, file: TomlConfig) -> Self {
        Self {
            listen: args.listen.unwrap_or(file.server.listen),
            buffer_size: args.buffer_size.unwrap_or(file.server.buffer_size),
            framing: args.framing.unwrap_or(file.server.framing),
            handler: args.handler.unwrap_or(file.server.handler),
            log_level: args.log_level.unwrap_or(file.logging.level),
        }
    }

    pub fn codec(&self) -> MessageCodec {
        MessageCodec::new(self.framing, self.buffer_size)
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig, ChatError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ChatError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Command-line arguments for the terminal client
///
/// Missing host, port or nickname are asked for interactively.
#[derive(Parser, Debug)]
#[command(name = "chat_relay_client")]
#[command(version)]
#[command(about = "Terminal client for the chat relay", long_about = None)]
pub struct ClientArgs {
    /// Server IP or host name
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Nickname to announce after connecting
    #[arg(short, long)]
    pub nickname: Option<String>,

    /// Message framing, must match the server
    #[arg(short = 'f', long, value_enum, default_value_t = Framing::Lines)]
    pub framing: Framing,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "0.0.0.0:8888");
        assert_eq!(config.buffer_size, 1024 * 1024);
        assert_eq!(config.framing, Framing::Lines);
        assert_eq!(config.handler, HandlerKind::Chat);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:9000"
            buffer_size = 4096
            framing = "raw"
            handler = "echo"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.buffer_size, 4096);
        assert_eq!(config.server.framing, Framing::Raw);
        assert_eq!(config.server.handler, HandlerKind::Echo);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let config: TomlConfig = toml::from_str(include_str!("../chat_relay.toml")).unwrap();
        let merged = ServerConfig::merge(ServerArgs::default(), config);
        assert_eq!(merged, ServerConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nlisten = \"127.0.0.1:9000\"\nframing = \"raw\"\n"
        )
        .unwrap();

        let args = ServerArgs {
            config: Some(file.path().to_path_buf()),
            listen: Some("127.0.0.1:9100".to_string()),
            ..ServerArgs::default()
        };
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9100");
        assert_eq!(config.framing, Framing::Raw);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_missing_config_file() {
        let args = ServerArgs {
            config: Some(PathBuf::from("/nonexistent/chat_relay.toml")),
            ..ServerArgs::default()
        };
        assert!(matches!(
            ServerConfig::from_args(args),
            Err(ChatError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_server_args_parse() {
        let args = ServerArgs::parse_from(["chat_relay", "--framing", "raw", "-l", "127.0.0.1:1"]);
        assert_eq!(args.framing, Some(Framing::Raw));
        assert_eq!(args.listen.as_deref(), Some("127.0.0.1:1"));
    }
}
