//! The clone boundary: turning caller values into data that may leave the process.
//!
//! A [`CloneScope`] accepts anything `serde` can turn into a plain JSON value and
//! rejects the rest (live callbacks, handles, non-string map keys). The cloned value is
//! held as UTF-8 JSON bytes in an [`EncodedMessage`], which is what transports send.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Limits;
use crate::context::Principal;
use crate::error::{BridgeError, Result};

/// Isolated serialization sandbox owned by one call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneScope {
    id: Uuid,
    origin: String,
    max_depth: usize,
    max_outgoing_bytes: usize,
}

impl CloneScope {
    pub(crate) fn new(origin: &str, limits: &Limits) -> Result<Self> {
        if origin.is_empty() {
            return Err(BridgeError::setup("clone scope needs a non-empty origin"));
        }
        if origin.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(BridgeError::setup(format!(
                "clone scope origin {origin:?} contains whitespace or control characters"
            )));
        }
        if limits.max_depth == 0 || limits.max_outgoing_bytes == 0 {
            return Err(BridgeError::setup("clone scope limits must be non-zero"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            origin: origin.to_string(),
            max_depth: limits.max_depth,
            max_outgoing_bytes: limits.max_outgoing_bytes,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Extension identity the scope was created for.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Deep-copy `value` into a plain structured value, or explain why it can't cross.
    pub fn clone_value<M: Serialize + ?Sized>(&self, value: &M) -> Result<Value> {
        let cloned = serde_json::to_value(value)
            .map_err(|e| BridgeError::serialization(e.to_string()))?;
        if exceeds_depth(&cloned, self.max_depth) {
            return Err(BridgeError::serialization(format!(
                "value nests deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(cloned)
    }

    pub(crate) fn encode<M: Serialize + ?Sized>(
        &self,
        principal: &Principal,
        tag: String,
        message: &M,
    ) -> Result<EncodedMessage> {
        let value = self.clone_value(message)?;
        let payload =
            serde_json::to_vec(&value).map_err(|e| BridgeError::serialization(e.to_string()))?;
        if payload.len() > self.max_outgoing_bytes {
            return Err(BridgeError::serialization(format!(
                "message of {} bytes exceeds the {} byte limit",
                payload.len(),
                self.max_outgoing_bytes
            )));
        }
        Ok(EncodedMessage {
            tag,
            principal: principal.clone(),
            payload,
        })
    }

    /// Decode bytes received from the native side back into a structured value.
    pub fn decode_reply(&self, raw: &[u8]) -> Result<Value> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| BridgeError::protocol(e.to_string()))?;
        if exceeds_depth(&value, self.max_depth) {
            return Err(BridgeError::protocol(format!(
                "reply nests deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(value)
    }
}

/// A message certified by a clone scope, ready for a transport.
#[derive(Debug, Clone)]
pub struct EncodedMessage {
    tag: String,
    principal: Principal,
    payload: Vec<u8>,
}

impl EncodedMessage {
    /// Diagnostic channel name this message was encoded under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// UTF-8 JSON bytes, without framing.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Read the payload back as a structured value.
    pub fn decode(&self) -> Result<Value> {
        serde_json::from_slice(&self.payload).map_err(|e| BridgeError::serialization(e.to_string()))
    }
}

// Iterative so hostile nesting can't blow the stack. Scalars don't add depth.
fn exceeds_depth(value: &Value, max_depth: usize) -> bool {
    let mut stack = vec![(value, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        match node {
            Value::Array(items) => {
                if depth > max_depth {
                    return true;
                }
                stack.extend(items.iter().map(|v| (v, depth + 1)));
            }
            Value::Object(map) => {
                if depth > max_depth {
                    return true;
                }
                stack.extend(map.values().map(|v| (v, depth + 1)));
            }
            _ => {}
        }
    }
    false
}
