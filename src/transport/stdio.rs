//! Process transport: one native host process per call, framed JSON over its stdio.
//!
//! Mirrors how the browser launches hosts: the manifest's `path` is started with the
//! manifest location and the caller's extension ID as arguments, working directory set
//! to the executable's directory. Anything the host prints on stderr ends up in the
//! `native_bridge::native_stderr` log target; stdout belongs to the protocol.
//!
//! The reply frame is read on its own task from the moment the process starts, so a
//! host that answers while it is still consuming stdin (`cat`, for one) never sees
//! both pipes fill up.

use std::{io, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::clone::EncodedMessage;
use crate::config::{BridgeConfig, Limits};
use crate::context::CallContext;
use crate::error::{BridgeError, Result};
use crate::frame;
use crate::manifest::find_manifest;
use crate::transport::{NativeChannel, NativeTransport};

#[derive(Debug, Clone)]
pub struct StdioTransport {
    limits: Limits,
    reply_timeout: Option<Duration>,
    shutdown_grace: Duration,
}

impl StdioTransport {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            limits: config.limits.clone(),
            reply_timeout: config.stdio.reply_timeout(),
            shutdown_grace: config.stdio.shutdown_grace(),
        }
    }
}

#[async_trait]
impl NativeTransport for StdioTransport {
    async fn connect(
        &self,
        context: &CallContext,
        app_id: &str,
    ) -> Result<Box<dyn NativeChannel>> {
        let extension_id = context.principal().extension_id().to_string();

        let located = {
            let app = app_id.to_string();
            let extension_id = extension_id.clone();
            tokio::task::spawn_blocking(move || find_manifest(&app, &extension_id))
                .await
                .map_err(|e| {
                    BridgeError::unavailable(app_id, format!("manifest lookup aborted: {e}"))
                })??
        };

        let mut command = Command::new(&located.executable);
        command
            .arg(&located.manifest_path)
            .arg(&extension_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = located.executable.parent() {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| BridgeError::launch(app_id, e))?;
        tracing::debug!(
            app = app_id,
            pid = ?child.id(),
            exe = %located.executable.display(),
            "native application started"
        );

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(app_id.to_string(), stderr));
        }
        let (stdin, mut stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(BridgeError::launch(
                    app_id,
                    io::Error::new(io::ErrorKind::Other, "child stdio was not captured"),
                ))
            }
        };

        let max_incoming = self.limits.max_incoming_bytes;
        let reader =
            tokio::spawn(async move { frame::read_frame(&mut stdout, max_incoming).await });

        Ok(Box::new(StdioChannel {
            app: app_id.to_string(),
            child,
            stdin: Some(stdin),
            reader: Some(reader),
            early_reply: None,
            max_outgoing: self.limits.max_outgoing_bytes,
            reply_timeout: self.reply_timeout,
            shutdown_grace: self.shutdown_grace,
        }))
    }
}

struct StdioChannel {
    app: String,
    child: Child,
    stdin: Option<ChildStdin>,
    /// Reads the single reply frame off stdout; started at spawn time.
    reader: Option<ReplyReader>,
    /// A reply that arrived before the request was fully written.
    early_reply: Option<Vec<u8>>,
    max_outgoing: usize,
    reply_timeout: Option<Duration>,
    shutdown_grace: Duration,
}

enum Race {
    Written(io::Result<()>),
    Read(Result<Vec<u8>>),
}

type ReplyReader = JoinHandle<io::Result<Vec<u8>>>;

async fn await_reply(app: &str, reader: &mut ReplyReader) -> Result<Vec<u8>> {
    let outcome = reader
        .await
        .map_err(|e| BridgeError::transport(format!("reading from {app} was aborted: {e}")))?;
    outcome.map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => BridgeError::protocol(e.to_string()),
        io::ErrorKind::UnexpectedEof => {
            BridgeError::transport(format!("{app} disconnected before replying"))
        }
        _ => BridgeError::transport(format!("reading from {app} failed: {e}")),
    })
}

#[async_trait]
impl NativeChannel for StdioChannel {
    async fn post(&mut self, message: &EncodedMessage) -> Result<()> {
        let (Some(stdin), Some(reader)) = (self.stdin.as_mut(), self.reader.as_mut()) else {
            return Err(BridgeError::transport(format!(
                "channel to {} is already closed",
                self.app
            )));
        };
        let race = tokio::select! {
            written = frame::write_frame(stdin, message.payload(), self.max_outgoing) => {
                Race::Written(written)
            }
            read = await_reply(&self.app, reader) => Race::Read(read),
        };

        let write_err = match race {
            Race::Written(Ok(())) => return Ok(()),
            Race::Written(Err(e)) => e,
            Race::Read(outcome) => {
                // Answered (or gone) before taking the whole request.
                self.reader = None;
                drop(self.stdin.take());
                self.early_reply = Some(outcome?);
                return Ok(());
            }
        };

        // A host may answer and exit before reading all of stdin. Its reply still counts.
        drop(self.stdin.take());
        let late = match self.reader.as_mut() {
            Some(reader) => {
                tokio::time::timeout(self.shutdown_grace, await_reply(&self.app, reader)).await
            }
            None => return Err(BridgeError::transport("reply reader is gone")),
        };
        match late {
            Ok(Ok(reply)) => {
                tracing::debug!(
                    app = %self.app,
                    error = %write_err,
                    "host replied before reading the whole request"
                );
                self.reader = None;
                self.early_reply = Some(reply);
                Ok(())
            }
            _ => Err(BridgeError::transport(format!(
                "writing to {} failed: {write_err}",
                self.app
            ))),
        }
    }

    async fn reply(&mut self) -> Result<Vec<u8>> {
        if let Some(reply) = self.early_reply.take() {
            return Ok(reply);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(BridgeError::transport(format!(
                "reply of {} was already taken",
                self.app
            )));
        };
        let outcome = match self.reply_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, await_reply(&self.app, reader)).await {
                    Ok(outcome) => outcome,
                    // The reader stays in place so close() can abort it.
                    Err(_) => {
                        return Err(BridgeError::transport(format!(
                            "{} did not reply within {limit:?}",
                            self.app
                        )))
                    }
                }
            }
            None => await_reply(&self.app, reader).await,
        };
        self.reader = None;
        outcome
    }

    async fn close(&mut self) {
        drop(self.stdin.take());
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(app = %self.app, %status, "native application exited")
            }
            Ok(Err(e)) => {
                tracing::warn!(app = %self.app, error = %e, "failed to reap native application")
            }
            Err(_) => {
                tracing::debug!(app = %self.app, "native application ignored stdin close, killing");
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(
                        app = %self.app,
                        error = %e,
                        "failed to kill native application"
                    );
                }
            }
        }
    }
}

async fn forward_stderr(app: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "native_bridge::native_stderr", app = %app, "{line}");
    }
}
