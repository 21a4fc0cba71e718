//! # native_bridge
//!
//! Send **one** structured message from a privileged browser context to a **native
//! messaging host** and await its **one** reply.
//!
//! This is the browser side of Native Messaging, stripped down to a single
//! fire-and-wait exchange: no connection pooling, no multiplexing, no retries. Every call
//! gets its own identity context, its own clone boundary and its own reply future.
//!
//! ---
//!
//! ## How a call works
//!
//! 1. A fresh [`CallContext`] is created by the [`ContextFactory`]: the fixed identity of
//!    the emulated extension (`firefoxpwa@filips.si`, manifest v2), a new [`CloneScope`]
//!    and the [`Principal`] derived from it.
//! 2. The message is cloned through that scope into an [`EncodedMessage`] (plain JSON,
//!    tagged `UserChrome/<extension>/sendNativeMessage/<app>` for log correlation).
//! 3. A [`NativeTransport`] opens a [`NativeChannel`] to the native app (`firefoxpwa`).
//! 4. The message is posted and a single [`PendingRequest`] is registered.
//! 5. The [`PendingRequest`] settles exactly once: the decoded reply, or a [`BridgeError`].
//!
//! Steps 1–2 happen synchronously inside the call. If they fail, the returned request is
//! already rejected and nothing was sent.
//!
//! ### Failure classes
//!
//! | [`ErrorKind`] | Meaning |
//! |---|---|
//! | `Setup` | context/clone scope could not be built, or no tokio runtime |
//! | `Serialization` | the message is not clone-safe (or too large / too deep) |
//! | `ChannelUnavailable` | host not registered, manifest invalid, or extension not allowed |
//! | `Launch` | host process failed to start |
//! | `Transport` | host went away (exit, EOF, timeout) before replying |
//! | `Protocol` | reply could not be decoded into a structured value |
//!
//! None of them are retried by this crate.
//!
//! ---
//!
//! ## Quick start (process transport, default config)
//!
//! ```no_run
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), native_bridge::BridgeError> {
//!     let message = json!({ "cmd": "GetSystemVersions" });
//!     let reply = native_bridge::send_native_message(&message).await?;
//!     eprintln!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! ## Custom transport
//!
//! Anything that can open a channel by name and return one reply works. The broker does
//! the encoding and decoding; the transport only moves bytes.
//!
//! ```
//! use async_trait::async_trait;
//! use native_bridge::{
//!     BridgeConfig, CallContext, EncodedMessage, NativeChannel, NativeTransport, RequestBroker,
//! };
//!
//! struct Echo;
//! struct EchoChannel(Vec<u8>);
//!
//! #[async_trait]
//! impl NativeTransport for Echo {
//!     async fn connect(
//!         &self,
//!         _context: &CallContext,
//!         _app_id: &str,
//!     ) -> native_bridge::Result<Box<dyn NativeChannel>> {
//!         Ok(Box::new(EchoChannel(Vec::new())))
//!     }
//! }
//!
//! #[async_trait]
//! impl NativeChannel for EchoChannel {
//!     async fn post(&mut self, message: &EncodedMessage) -> native_bridge::Result<()> {
//!         self.0 = message.payload().to_vec();
//!         Ok(())
//!     }
//!
//!     async fn reply(&mut self) -> native_bridge::Result<Vec<u8>> {
//!         Ok(std::mem::take(&mut self.0))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let broker = RequestBroker::new(&BridgeConfig::default(), Echo);
//! let reply = broker.send_native_message(&serde_json::json!({ "a": 1 })).await.unwrap();
//! assert_eq!(reply, serde_json::json!({ "a": 1 }));
//! # }
//! ```
//!
//! ---
//!
//! ## Configuration
//!
//! The built-in [`BridgeConfig`] (identity, size/depth limits, process-transport timing)
//! is embedded from `bridge.toml`. Set `NATIVE_BRIDGE_CONFIG` to a TOML file with the same
//! layout to override it; it is read once, on first use.
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber:
//!
//! - `native_bridge::activity`: per-call activity (`api_call`, `api_result`, `api_error`)
//! - `native_bridge::native_stderr`: lines the host wrote to stderr
//! - everything else under `native_bridge::*` at `debug`/`warn`
//!
//! ## Troubleshooting
//!
//! - **`ChannelUnavailable`**: check `~/.mozilla/native-messaging-hosts/<app>.json`
//!   (Linux), `~/Library/Application Support/Mozilla/NativeMessagingHosts/` (macOS) or the
//!   `HKCU\Software\Mozilla\NativeMessagingHosts\<app>` key (Windows, feature
//!   `windows-registry`). The manifest `name` must equal the app ID, `type` must be
//!   `stdio`, and `allowed_extensions` must contain the extension ID.
//! - **`Transport` right after launch**: the host probably crashed or wrote a log line
//!   to stdout. Hosts must keep stdout for framed messages only.

pub mod broker;
pub mod clone;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod identity;
pub mod manifest;
pub mod pending;
pub mod transport;

// -------- Core re-exports --------

#[doc(inline)]
pub use broker::RequestBroker;
#[cfg(feature = "stdio")]
#[doc(inline)]
pub use broker::send_native_message;
#[doc(inline)]
pub use clone::{CloneScope, EncodedMessage};
#[doc(inline)]
pub use config::{BridgeConfig, Limits, StdioSettings};
#[doc(inline)]
pub use context::{CallContext, ContextFactory, Principal};
#[doc(inline)]
pub use error::{BridgeError, ConfigError, ErrorKind, Result};
#[doc(inline)]
pub use identity::{Identity, CHANNEL_NAME, EXTENSION_ID, MANIFEST_VERSION, NATIVE_APP_ID};
#[doc(inline)]
pub use pending::{CallState, PendingRequest};
#[doc(inline)]
pub use transport::{NativeChannel, NativeTransport};

// -------- Transport re-exports --------

#[cfg(feature = "stdio")]
#[doc(inline)]
pub use transport::StdioTransport;
