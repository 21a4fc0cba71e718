//! The transport seam.
//!
//! The broker never spawns processes or touches pipes itself. It asks a
//! [`NativeTransport`] for a [`NativeChannel`] to the named application, posts one
//! [`EncodedMessage`], and waits for one reply.
//!
//! Error contract for implementors:
//!
//! | Situation | Variant |
//! |---|---|
//! | application not registered / manifest unusable / caller not allowed | `BridgeError::ChannelUnavailable` |
//! | process could not be started | `BridgeError::Launch` |
//! | channel closed, process exited, IO failure, timeout | `BridgeError::Transport` |
//! | reply framing violates limits | `BridgeError::Protocol` |
//!
//! Transports return reply bytes undecoded; decoding is the broker's job.

use async_trait::async_trait;

use crate::clone::EncodedMessage;
use crate::context::CallContext;
use crate::error::Result;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "stdio")]
pub use stdio::StdioTransport;

/// Opens channels to native applications by name.
#[async_trait]
pub trait NativeTransport: Send + Sync {
    async fn connect(
        &self,
        context: &CallContext,
        app_id: &str,
    ) -> Result<Box<dyn NativeChannel>>;
}

/// One open channel, used for exactly one message and one reply.
#[async_trait]
pub trait NativeChannel: Send {
    /// Send the message. Returning `Ok` means it was handed to the application.
    async fn post(&mut self, message: &EncodedMessage) -> Result<()>;

    /// Wait for the application's reply, as raw JSON bytes.
    async fn reply(&mut self) -> Result<Vec<u8>>;

    /// Release the channel. Called once, after the reply or the failure.
    async fn close(&mut self) {}
}
