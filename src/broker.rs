//! The request broker: one encode → dispatch → await cycle per call.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::clone::EncodedMessage;
use crate::config::BridgeConfig;
use crate::context::{CallContext, ContextFactory};
use crate::error::{BridgeError, Result};
use crate::pending::{CallState, CallTracker, PendingRequest};
use crate::transport::NativeTransport;

/// Sends single messages to the configured native application.
///
/// Cheap to share; every call gets its own context, encoded message and
/// [`PendingRequest`]. Nothing is cached between calls, so two identical calls are two
/// round-trips.
pub struct RequestBroker {
    factory: ContextFactory,
    transport: Arc<dyn NativeTransport>,
}

impl RequestBroker {
    pub fn new<T: NativeTransport + 'static>(config: &BridgeConfig, transport: T) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    pub fn with_shared_transport(
        config: &BridgeConfig,
        transport: Arc<dyn NativeTransport>,
    ) -> Self {
        Self {
            factory: ContextFactory::new(config),
            transport,
        }
    }

    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }

    /// Send `message` to the native application and return a handle to its reply.
    ///
    /// Context setup and encoding happen before this returns; if either fails the
    /// returned request is already rejected and the transport is never touched.
    /// Connecting, dispatching and waiting run on a spawned task, so this needs to be
    /// called from inside a tokio runtime (otherwise the call is rejected with
    /// [`BridgeError::Setup`]).
    pub fn send_native_message<M: Serialize + ?Sized>(&self, message: &M) -> PendingRequest {
        let tracker = CallTracker::new();

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                return PendingRequest::rejected(
                    tracker,
                    BridgeError::setup("sendNativeMessage must be called inside a tokio runtime"),
                )
            }
        };

        let context = match self.factory.create_context() {
            Ok(context) => context,
            Err(err) => {
                tracing::debug!(error = %err, "call context setup failed");
                return PendingRequest::rejected(tracker, err);
            }
        };
        context.log_activity(
            "api_call",
            "sendNativeMessage",
            &json!({ "app": context.native_app_id() }),
        );

        tracker.advance(CallState::Encoding);
        let encoded = match context.encode(message) {
            Ok(encoded) => encoded,
            Err(err) => {
                context.log_activity(
                    "api_error",
                    "sendNativeMessage",
                    &json!({ "error": err.to_string() }),
                );
                return PendingRequest::rejected(tracker, err);
            }
        };

        let (settlement, pending) = PendingRequest::channel(tracker);
        let transport = Arc::clone(&self.transport);
        let span = tracing::debug_span!(
            "native_call",
            call = %context.id(),
            app = %context.native_app_id(),
            tag = %encoded.tag()
        );
        runtime.spawn(
            async move {
                let outcome =
                    exchange(&*transport, &context, encoded, settlement.tracker()).await;
                match &outcome {
                    Ok(_) => context.log_activity("api_result", "sendNativeMessage", &Value::Null),
                    Err(err) => context.log_activity(
                        "api_error",
                        "sendNativeMessage",
                        &json!({ "kind": format!("{:?}", err.kind()), "error": err.to_string() }),
                    ),
                }
                settlement.settle(outcome);
            }
            .instrument(span),
        );
        pending
    }
}

async fn exchange(
    transport: &dyn NativeTransport,
    context: &CallContext,
    message: EncodedMessage,
    tracker: &CallTracker,
) -> Result<Value> {
    let mut channel = transport.connect(context, context.native_app_id()).await?;

    let outcome: Result<Value> = async {
        channel.post(&message).await?;
        tracker.advance(CallState::Dispatched);
        tracing::debug!(bytes = message.len(), "message dispatched");

        let raw = channel.reply().await?;
        tracing::debug!(bytes = raw.len(), "reply received");
        context.clone_scope().decode_reply(&raw)
    }
    .await;

    channel.close().await;
    outcome
}

/// Send `message` through the process-wide broker (stdio transport, global config).
///
/// When the `NATIVE_BRIDGE_CONFIG` override cannot be loaded every call is rejected
/// with [`BridgeError::Setup`].
///
/// ```no_run
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), native_bridge::BridgeError> {
/// let message = json!({ "cmd": "GetSystemVersions" });
/// let reply = native_bridge::send_native_message(&message).await?;
/// eprintln!("native host says {reply}");
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "stdio")]
pub fn send_native_message<M: Serialize + ?Sized>(message: &M) -> PendingRequest {
    use once_cell::sync::Lazy;

    use crate::transport::StdioTransport;

    static BROKER: Lazy<std::result::Result<RequestBroker, String>> = Lazy::new(|| {
        let config = BridgeConfig::global().map_err(|err| match err {
            BridgeError::Setup(reason) => reason,
            other => other.to_string(),
        })?;
        Ok(RequestBroker::new(config, StdioTransport::new(config)))
    });
    match &*BROKER {
        Ok(broker) => broker.send_native_message(message),
        Err(reason) => PendingRequest::rejected(CallTracker::new(), BridgeError::setup(reason)),
    }
}
