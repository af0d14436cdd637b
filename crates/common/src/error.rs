//! Common error types for ringguard components.

use std::fmt;

/// A specialized Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The surviving ring path of a switch could not be determined.
    #[error("Topology error: {0}")]
    Topology(String),

    /// A port name has no numeric id bound to it.
    #[error("Port resolution error: {0}")]
    PortResolution(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown switch: {0}")]
    UnknownSwitch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new topology-consistency error.
    pub fn topology(msg: impl fmt::Display) -> Self {
        Error::Topology(msg.to_string())
    }

    /// Create a new port resolution error.
    pub fn port_resolution(msg: impl fmt::Display) -> Self {
        Error::PortResolution(msg.to_string())
    }

    /// Create a new transport error.
    pub fn transport(msg: impl fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    /// Create a new unknown-switch error.
    pub fn unknown_switch(id: impl fmt::Display) -> Self {
        Error::UnknownSwitch(id.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Topology(_) => "topology",
            Error::PortResolution(_) => "port_resolution",
            Error::Transport(_) => "transport",
            Error::UnknownSwitch(_) => "unknown_switch",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Other(_) => "other",
        }
    }
}
