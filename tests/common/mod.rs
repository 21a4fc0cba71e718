#![allow(dead_code)]

use std::{
    env,
    ffi::{OsStr, OsString},
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use native_bridge::{BridgeError, CallContext, EncodedMessage, NativeChannel, NativeTransport};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Sets one environment variable; the previous value comes back on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<OsString>,
}

impl EnvVarGuard {
    pub fn set(key: &'static str, value: impl AsRef<OsStr>) -> Self {
        let previous = env::var_os(key);
        env::set_var(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => env::set_var(self.key, value),
            None => env::remove_var(self.key),
        }
    }
}

/// Point HOME at a fresh temp dir so manifest lookups stay inside it.
pub fn sandbox_env() -> (TempDir, EnvVarGuard) {
    let td = TempDir::new().expect("tempdir");
    let home = td.path().join("home");
    std::fs::create_dir_all(&home).unwrap();
    let guard = EnvVarGuard::set("HOME", &home);
    (td, guard)
}

/// How the mocked native application behaves.
#[derive(Clone)]
pub enum Script {
    /// Reply with this value.
    Respond(Value),
    /// Reply with the dispatched payload.
    Echo,
    /// Reply with the dispatched payload once the gate hands out a permit.
    GatedEcho(Arc<Semaphore>),
    /// Reply with raw bytes.
    Raw(Vec<u8>),
    /// Accept the message, then exit without replying.
    DisconnectAfterDispatch,
    /// The application is not registered.
    NotInstalled,
    /// The process cannot be started.
    LaunchFails,
}

#[derive(Debug, Clone)]
pub struct Connect {
    pub context_id: Uuid,
    pub scope_id: Uuid,
    pub extension_id: String,
    pub app_id: String,
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub tag: String,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct Record {
    pub connects: Vec<Connect>,
    pub dispatches: Vec<Dispatch>,
    pub closes: usize,
}

#[derive(Clone)]
pub struct MockTransport {
    script: Script,
    pub record: Arc<Mutex<Record>>,
}

impl MockTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            record: Arc::default(),
        }
    }

    pub fn connects(&self) -> Vec<Connect> {
        self.record.lock().unwrap().connects.clone()
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.record.lock().unwrap().dispatches.clone()
    }

    pub fn closes(&self) -> usize {
        self.record.lock().unwrap().closes
    }
}

#[async_trait]
impl NativeTransport for MockTransport {
    async fn connect(
        &self,
        context: &CallContext,
        app_id: &str,
    ) -> native_bridge::Result<Box<dyn NativeChannel>> {
        self.record.lock().unwrap().connects.push(Connect {
            context_id: context.id(),
            scope_id: context.clone_scope().id(),
            extension_id: context.principal().extension_id().to_string(),
            app_id: app_id.to_string(),
        });
        match &self.script {
            Script::NotInstalled => {
                Err(BridgeError::unavailable(app_id, "no native manifest found"))
            }
            Script::LaunchFails => Err(BridgeError::launch(
                app_id,
                io::Error::new(io::ErrorKind::PermissionDenied, "not executable"),
            )),
            script => Ok(Box::new(MockChannel {
                script: script.clone(),
                record: Arc::clone(&self.record),
                posted: None,
            })),
        }
    }
}

struct MockChannel {
    script: Script,
    record: Arc<Mutex<Record>>,
    posted: Option<Vec<u8>>,
}

#[async_trait]
impl NativeChannel for MockChannel {
    async fn post(&mut self, message: &EncodedMessage) -> native_bridge::Result<()> {
        let payload = message.decode()?;
        self.record.lock().unwrap().dispatches.push(Dispatch {
            tag: message.tag().to_string(),
            payload,
        });
        self.posted = Some(message.payload().to_vec());
        Ok(())
    }

    async fn reply(&mut self) -> native_bridge::Result<Vec<u8>> {
        match &self.script {
            Script::Respond(value) => Ok(serde_json::to_vec(value).unwrap()),
            Script::Echo => Ok(self.posted.take().unwrap_or_default()),
            Script::GatedEcho(gate) => {
                gate.acquire().await.unwrap().forget();
                Ok(self.posted.take().unwrap_or_default())
            }
            Script::Raw(bytes) => Ok(bytes.clone()),
            Script::DisconnectAfterDispatch => {
                Err(BridgeError::transport("native application exited"))
            }
            Script::NotInstalled | Script::LaunchFails => unreachable!("no channel is opened"),
        }
    }

    async fn close(&mut self) {
        self.record.lock().unwrap().closes += 1;
    }
}
