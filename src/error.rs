//! Error types for the bridge.
//!
//! Every failure of a call surfaces as exactly one [`BridgeError`] rejecting the call's
//! [`PendingRequest`](crate::PendingRequest). Nothing is retried and nothing is
//! swallowed; the activity log is written in addition to, never instead of, the error.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Coarse classification of a [`BridgeError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Setup,
    Serialization,
    ChannelUnavailable,
    Launch,
    Transport,
    Protocol,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The call context (clone scope or its principal) could not be built.
    #[error("failed to set up call context: {0}")]
    Setup(String),

    /// The outbound message cannot cross the clone boundary.
    #[error("message is not clone-safe: {0}")]
    Serialization(String),

    /// The native application is not registered, or its manifest is unusable.
    #[error("native application '{app}' is unavailable: {reason}")]
    ChannelUnavailable { app: String, reason: String },

    /// The native process could not be started.
    #[error("failed to launch native application '{app}': {source}")]
    Launch {
        app: String,
        #[source]
        source: io::Error,
    },

    /// The channel went away before a reply arrived.
    #[error("native channel failed before replying: {0}")]
    Transport(String),

    /// A reply arrived but could not be decoded into a structured value.
    #[error("invalid reply from native application: {0}")]
    Protocol(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Setup(_) => ErrorKind::Setup,
            BridgeError::Serialization(_) => ErrorKind::Serialization,
            BridgeError::ChannelUnavailable { .. } => ErrorKind::ChannelUnavailable,
            BridgeError::Launch { .. } => ErrorKind::Launch,
            BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::Protocol(_) => ErrorKind::Protocol,
        }
    }

    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup(reason.into())
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization(reason.into())
    }

    pub fn unavailable(app: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            app: app.into(),
            reason: reason.into(),
        }
    }

    pub fn launch(app: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            app: app.into(),
            source,
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }
}

/// Failure to load a [`BridgeConfig`](crate::BridgeConfig) override file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid bridge config: {0}")]
    Parse(#[from] toml::de::Error),
}
