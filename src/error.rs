//! Error types for plural-proxy.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("System error: {0}")]
    System(#[from] SystemError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors (reading or writing the system file).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Platform transport errors (Discord HTTP API and gateway).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Discord API returned {status} for {route}: {body}")]
    Api {
        route: String,
        status: u16,
        body: String,
    },

    #[error("Channel {0} not found")]
    ChannelNotFound(String),

    #[error("Webhook {0} no longer exists")]
    UnknownWebhook(String),

    #[error("Failed to send message via webhook {webhook_id}: {reason}")]
    SendFailed { webhook_id: String, reason: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Gateway rejected the requested intents (close code {0})")]
    DisallowedIntents(u16),
}

/// Request URLs can embed webhook and interaction tokens, so they are dropped.
impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        ChannelError::Http(e.without_url().to_string())
    }
}

/// Registry / system-level errors surfaced to the command issuer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SystemError {
    #[error("Actor {0} is not the system owner")]
    Unauthorized(String),

    #[error("No system exists")]
    NoSystemExists,

    #[error("A system already exists")]
    SystemAlreadyExists,

    #[error("No member found with ID: {0}")]
    MemberNotFound(String),

    #[error("Invalid color {0:?}: expected a hex code like #ff8800")]
    InvalidColor(String),
}

/// Failures on the background proxy path.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Channel {channel_id} does not support webhooks")]
    UnsupportedChannelKind { channel_id: String },

    #[error("Transport failure: {0}")]
    Transport(#[from] ChannelError),
}

/// Slash-command parsing and registration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing required option {option} for /{command}")]
    MissingOption { command: String, option: String },

    #[error("Invalid command definition /{command}: {reason}")]
    InvalidDefinition { command: String, reason: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
