//! Per-call execution contexts.
//!
//! Each call to the native application runs under its own [`CallContext`]: the fixed
//! identity of the emulated extension, a fresh [`CloneScope`] that every outbound
//! message is cloned through, and the [`Principal`] derived from that scope. Contexts
//! are never shared or reused; one is dropped when its call settles.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::clone::{CloneScope, EncodedMessage};
use crate::config::{BridgeConfig, Limits};
use crate::error::{BridgeError, Result};
use crate::identity::Identity;

/// Authorization token derived from a clone scope.
///
/// Transports use it to decide whether the caller may talk to a native application
/// (the stdio transport checks it against the manifest's `allowed_extensions`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    extension_id: String,
    scope_id: Uuid,
}

impl Principal {
    pub fn of(scope: &CloneScope) -> Self {
        Self {
            extension_id: scope.origin().to_string(),
            scope_id: scope.id(),
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.extension_id, self.scope_id)
    }
}

/// Isolated identity/security boundary for exactly one exchange.
#[derive(Debug)]
pub struct CallContext {
    id: Uuid,
    identity: Identity,
    clone_scope: CloneScope,
    principal: Principal,
}

impl CallContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn extension_id(&self) -> &str {
        &self.identity.extension_id
    }

    pub fn native_app_id(&self) -> &str {
        &self.identity.native_app_id
    }

    pub fn manifest_version(&self) -> u8 {
        self.identity.manifest_version
    }

    pub fn env_type(&self) -> &str {
        &self.identity.env_type
    }

    pub fn channel_name(&self) -> String {
        self.identity.channel_name()
    }

    pub fn clone_scope(&self) -> &CloneScope {
        &self.clone_scope
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Clone `message` through this context's scope and tag it with the channel name.
    pub fn encode<M: Serialize + ?Sized>(&self, message: &M) -> Result<EncodedMessage> {
        self.clone_scope
            .encode(&self.principal, self.channel_name(), message)
    }

    /// Record an observability event for this call. Never affects the call itself.
    pub fn log_activity(&self, kind: &str, name: &str, data: &Value) {
        tracing::debug!(
            target: "native_bridge::activity",
            context = %self.id,
            env = %self.identity.env_type,
            kind,
            name,
            data = %data,
            "[UserChromeContext]"
        );
    }
}

/// Builds a fresh [`CallContext`] per call from an immutable identity and limits.
#[derive(Debug, Clone)]
pub struct ContextFactory {
    identity: Identity,
    limits: Limits,
}

impl ContextFactory {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            identity: config.identity.clone(),
            limits: config.limits.clone(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn create_context(&self) -> Result<CallContext> {
        if !matches!(self.identity.manifest_version, 2 | 3) {
            return Err(BridgeError::setup(format!(
                "unsupported manifest version {}",
                self.identity.manifest_version
            )));
        }
        let clone_scope = CloneScope::new(&self.identity.extension_id, &self.limits)?;
        let principal = Principal::of(&clone_scope);
        Ok(CallContext {
            id: Uuid::new_v4(),
            identity: self.identity.clone(),
            clone_scope,
            principal,
        })
    }
}
