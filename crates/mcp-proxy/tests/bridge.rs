use httpmock::prelude::*;
use mcp_client::{ClientConfig, HttpForwarder};
use mcp_proxy::{Bridge, BridgeConfig};
use mcp_server::{FrameReader, FrameWriter};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

async fn bridge_output(config: ClientConfig, input: &'static [u8]) -> String {
    let forwarder = HttpForwarder::new(config).expect("forwarder");
    let bridge = Bridge::new(Arc::new(forwarder), BridgeConfig::default());

    let (out, mut peer) = tokio::io::duplex(1 << 16);
    bridge
        .run(FrameReader::new(input), FrameWriter::new(out))
        .await
        .expect("bridge run");

    let mut written = String::new();
    peer.read_to_string(&mut written).await.unwrap();
    written
}

#[tokio::test]
async fn ping_is_forwarded_and_wrapped() {
    let server = MockServer::start();
    let remote = server.mock(|when, then| {
        when.method(POST)
            .path("/mcp")
            .header("authorization", "Bearer docs-token")
            .json_body(json!({"id": 1, "method": "ping", "params": {}}));
        then.status(200).json_body(json!({"ok": true}));
    });

    let config = ClientConfig::new(server.url("/mcp"))
        .with_auth_token("docs-token")
        .allow_http();
    let output = bridge_output(config, b"{\"id\":1,\"method\":\"ping\",\"params\":{}}\n").await;

    assert_eq!(output, "{\"id\":1,\"result\":{\"ok\":true}}\n");
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn not_json_gets_parse_error_without_remote_call() {
    let server = MockServer::start();
    let remote = server.mock(|when, then| {
        when.method(POST).path("/mcp");
        then.status(200).json_body(json!({}));
    });

    let config = ClientConfig::new(server.url("/mcp")).allow_http();
    let output = bridge_output(config, b"not-json\n").await;

    let reply: Value = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], "parse_error");
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn remote_errors_are_reported_per_request() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/mcp").body_includes("tools/list");
        then.status(500).body("boom");
    });
    server.mock(|when, then| {
        when.method(POST).path("/mcp").body_includes("tools/call");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "error": {"code": -32602, "message": "Invalid params"}
        }));
    });

    let config = ClientConfig::new(server.url("/mcp")).allow_http();
    let output = bridge_output(
        config,
        b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n\
          {\"jsonrpc\":\"2.0\",\"id\":\"call-1\",\"method\":\"tools/call\"}\n",
    )
    .await;

    let replies: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);

    let listed = replies.iter().find(|r| r["id"] == 1).unwrap();
    assert_eq!(listed["error"]["code"], "remote_unavailable");
    assert_eq!(listed["error"]["data"]["status"], 500);

    let called = replies.iter().find(|r| r["id"] == "call-1").unwrap();
    assert_eq!(called["error"]["code"], -32602);
    assert_eq!(called["jsonrpc"], "2.0");
}

#[tokio::test]
async fn unreachable_remote_does_not_stop_the_bridge() {
    let config = ClientConfig::new("http://127.0.0.1:1/mcp")
        .with_timeout(Duration::from_secs(2))
        .allow_http();
    let output = bridge_output(
        config,
        b"{\"id\":1,\"method\":\"ping\"}\n{\"id\":2,\"method\":\"ping\"}\n",
    )
    .await;

    let replies: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);
    assert!(replies
        .iter()
        .all(|r| r["error"]["code"] == "remote_unavailable"));
}

#[tokio::test]
async fn overlapping_requests_keep_their_ids() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/mcp").body_includes("\"slow\"");
        then.status(200)
            .delay(Duration::from_millis(300))
            .json_body(json!({"which": "slow"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/mcp").body_includes("\"fast\"");
        then.status(200).json_body(json!({"which": "fast"}));
    });

    let config = ClientConfig::new(server.url("/mcp")).allow_http();
    let output = bridge_output(
        config,
        b"{\"id\":10,\"method\":\"slow\"}\n{\"id\":11,\"method\":\"fast\"}\n",
    )
    .await;

    let replies: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], 11);
    assert_eq!(replies[0]["result"]["which"], "fast");
    assert_eq!(replies[1]["id"], 10);
    assert_eq!(replies[1]["result"]["which"], "slow");
}
