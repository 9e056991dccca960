//! Error types for the gateway library

use std::path::PathBuf;

/// Central error type for padbridge-gw
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("MIDI {direction} port '{name}' not found")]
    PortNotFound {
        direction: &'static str,
        name: String,
    },

    #[error("failed to open MIDI port '{name}': {message}")]
    PortOpen { name: String, message: String },

    #[error("MIDI send to '{port}' failed: {message}")]
    Send { port: String, message: String },

    #[error("console error: {0}")]
    Console(String),

    #[error("pad actor is no longer running")]
    ActorGone,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
