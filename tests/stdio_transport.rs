#![cfg(all(unix, feature = "stdio"))]

mod common;

use native_bridge::manifest::paths;
use native_bridge::{BridgeConfig, ErrorKind, RequestBroker, StdioTransport, EXTENSION_ID};
use serde_json::json;
use serial_test::serial;
use std::{fs, os::unix::fs::PermissionsExt, path::Path, time::Duration};

/// Install `script` as the host `name` inside the sandboxed HOME.
fn install_host(root: &Path, name: &str, script: &str) {
    let exe = root.join(format!("{name}.sh"));
    fs::write(&exe, script).unwrap();
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
    write_manifest(name, &exe.to_string_lossy());
}

fn write_manifest(name: &str, exe: &str) {
    let manifest = paths::firefox_user_manifest(name).unwrap();
    fs::create_dir_all(manifest.parent().unwrap()).unwrap();
    let body = json!({
        "name": name,
        "description": "bridge test host",
        "path": exe,
        "type": "stdio",
        "allowed_extensions": [EXTENSION_ID],
    });
    fs::write(&manifest, serde_json::to_vec(&body).unwrap()).unwrap();
}

fn broker_for(name: &str, tweak: impl FnOnce(&mut BridgeConfig)) -> RequestBroker {
    let mut config = BridgeConfig::default();
    config.identity.native_app_id = name.to_string();
    config.stdio.shutdown_grace_ms = 200;
    tweak(&mut config);
    RequestBroker::new(&config, StdioTransport::new(&config))
}

#[tokio::test]
#[serial]
async fn cat_host_echoes_the_message() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_echo";
    // Bytes in, same bytes out: the reply frame is the request frame.
    install_host(td.path(), name, "#!/bin/sh\nexec cat\n");

    let reply = broker_for(name, |_| {})
        .send_native_message(&json!({ "a": 1, "nested": { "list": [1, 2, 3] } }))
        .await
        .expect("echo reply");
    assert_eq!(reply, json!({ "a": 1, "nested": { "list": [1, 2, 3] } }));
}

#[tokio::test]
#[serial]
async fn cat_host_echoes_a_message_larger_than_the_pipe_buffer() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_big_echo";
    install_host(td.path(), name, "#!/bin/sh\nexec cat\n");

    let message = json!({ "blob": "x".repeat(512 * 1024) });
    let pending = broker_for(name, |c| c.limits.max_incoming_bytes = 4 * 1_048_576)
        .send_native_message(&message);
    let reply = tokio::time::timeout(Duration::from_secs(10), pending)
        .await
        .expect("exchange settles")
        .expect("echo reply");
    assert_eq!(reply, message);
}

#[cfg(target_endian = "little")]
#[tokio::test]
#[serial]
async fn reply_sent_before_the_request_is_read_still_counts() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_hasty";
    // Answers `{"ok":true}` (11 bytes) and exits without touching stdin.
    install_host(
        td.path(),
        name,
        "#!/bin/sh\nprintf '\\013\\000\\000\\000{\"ok\":true}'\n",
    );

    let pending = broker_for(name, |_| {})
        .send_native_message(&json!({ "blob": "x".repeat(512 * 1024) }));
    let reply = tokio::time::timeout(Duration::from_secs(10), pending)
        .await
        .expect("exchange settles")
        .expect("early reply");
    assert_eq!(reply, json!({ "ok": true }));
}

#[tokio::test]
#[serial]
async fn host_exiting_without_reply_is_transport_error() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_quitter";
    install_host(td.path(), name, "#!/bin/sh\nexit 0\n");

    let err = broker_for(name, |_| {})
        .send_native_message(&json!({ "a": 1 }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
#[serial]
async fn missing_executable_is_launch_error() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_ghost";
    let exe = td.path().join("does-not-exist");
    write_manifest(name, &exe.to_string_lossy());

    let err = broker_for(name, |_| {})
        .send_native_message(&json!({ "a": 1 }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Launch);
}

#[tokio::test]
#[serial]
async fn unregistered_host_is_channel_unavailable() {
    let (_td, _env) = common::sandbox_env();
    let err = broker_for("com.example.bridge_nobody", |_| {})
        .send_native_message(&json!({ "foo": 1 }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChannelUnavailable);
}

#[tokio::test]
#[serial]
async fn silent_host_hits_reply_timeout() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_silent";
    install_host(td.path(), name, "#!/bin/sh\nexec sleep 30\n");

    let err = broker_for(name, |c| c.stdio.reply_timeout_ms = Some(200))
        .send_native_message(&json!({ "a": 1 }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("did not reply"), "{err}");
}

#[tokio::test]
#[serial]
async fn oversized_reply_is_protocol_error() {
    let (td, _env) = common::sandbox_env();
    let name = "com.example.bridge_chatty";
    install_host(td.path(), name, "#!/bin/sh\nexec cat\n");

    // The echoed frame is bigger than the incoming cap.
    let err = broker_for(name, |c| c.limits.max_incoming_bytes = 8)
        .send_native_message(&json!({ "blob": "x".repeat(64) }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}
