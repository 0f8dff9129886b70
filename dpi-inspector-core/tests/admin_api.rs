//! End-to-end tests against the real admin HTTP surface: a live
//! `tokio::net::TcpListener` bound to an ephemeral port, driven with plain
//! `TcpStream` writes/reads rather than a client library, matching the
//! teacher's style of testing its own accept loop over the wire instead of
//! through an in-process mock.

use std::io::Write;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use dpi_inspector_core::api::{start_admin_server, AdminState};
use dpi_inspector_core::dispatch::Dispatcher;
use dpi_inspector_core::rules::{FailingRuleStore, InMemoryRuleStore, RuleEngine, RuleSet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

fn pick_free_addr() -> SocketAddr {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local_addr")
}

async fn spawn_server() -> (SocketAddr, Arc<Dispatcher>) {
    let addr = pick_free_addr();
    let rule_engine = Arc::new(RuleEngine::new(InMemoryRuleStore::new()));
    let dispatcher = Dispatcher::start(2, 16, 256, rule_engine);
    let state = AdminState::new(dispatcher.clone(), None);

    tokio::spawn(async move {
        let _ = start_admin_server(addr, state).await;
    });
    sleep(Duration::from_millis(75)).await;
    (addr, dispatcher)
}

/// Like [`spawn_server`], but the admin surface's rule engine is backed
/// by a [`FailingRuleStore`] that errors on every `RuleSet::Ip` call, so
/// `/health` observes real `RuleStoreUnavailable` failures instead of a
/// manufactured counter value.
async fn spawn_server_with_failing_rule_store() -> SocketAddr {
    let addr = pick_free_addr();
    let dispatcher = Dispatcher::start(2, 16, 256, Arc::new(RuleEngine::new(InMemoryRuleStore::new())));
    let failing_engine = Arc::new(RuleEngine::new(FailingRuleStore::failing_on(RuleSet::Ip)));
    let state = AdminState::with_rule_engine(dispatcher, failing_engine, None);

    tokio::spawn(async move {
        let _ = start_admin_server(addr, state).await;
    });
    sleep(Duration::from_millis(75)).await;
    addr
}

async fn http_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect to admin surface");
    stream.write_all(request.as_bytes()).await.expect("write request");
    stream.shutdown().await.ok();

    let mut buf = Vec::new();
    // A bare read-to-end works because every handler here closes the
    // connection after one response (hyper's `auto::Builder` defaults to
    // HTTP/1.1 keep-alive, but the client signals it wants none of that by
    // shutting its write half immediately above).
    let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
    String::from_utf8_lossy(&buf).into_owned()
}

fn body_of(response: &str) -> &str {
    response.split("\r\n\r\n").nth(1).unwrap_or("")
}

fn status_of(response: &str) -> &str {
    response.lines().next().unwrap_or("")
}

/// Builds a raw HTTP/1.1 `POST /analyze` request carrying `pcap_bytes` as
/// a single multipart `file` field.
fn multipart_analyze_request(pcap_bytes: &[u8]) -> Vec<u8> {
    let boundary = "----dpiTestBoundary";
    let mut body = Vec::new();
    write!(body, "--{boundary}\r\n").unwrap();
    write!(body, "Content-Disposition: form-data; name=\"file\"; filename=\"capture.pcap\"\r\n")
        .unwrap();
    write!(body, "Content-Type: application/octet-stream\r\n\r\n").unwrap();
    body.extend_from_slice(pcap_bytes);
    write!(body, "\r\n--{boundary}--\r\n").unwrap();

    let mut request = Vec::new();
    write!(
        request,
        "POST /analyze HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: multipart/form-data; boundary={boundary}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .unwrap();
    request.extend_from_slice(&body);
    request
}

#[tokio::test]
async fn health_reports_healthy_with_no_rule_store_failures() {
    let (addr, _dispatcher) = spawn_server().await;
    let response = http_request(
        addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(status_of(&response).contains("200"));
    assert!(body_of(&response).contains("\"healthy\""));
}

#[tokio::test]
async fn health_reports_degraded_after_a_rule_store_failure() {
    use dpi_inspector_core::testing::pcap::capture_with_tls_client_hello;

    let addr = spawn_server_with_failing_rule_store().await;

    // `/analyze` routes through the same `pcap_pipeline`/`rule_engine`
    // `AdminState::with_rule_engine` built from the failing store, so
    // evaluating this one-packet capture drives a real
    // `RuleStoreUnavailable` through `RuleEngine::evaluate`'s IP check.
    let pcap_bytes = capture_with_tls_client_hello("www.example.com");
    let request = multipart_analyze_request(&pcap_bytes);

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(&request).await.expect("write multipart request");
    stream.shutdown().await.ok();
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
    let analyze_response = String::from_utf8_lossy(&buf).into_owned();
    assert!(status_of(&analyze_response).contains("200"));

    let response = http_request(
        addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(status_of(&response).contains("200"));
    let body = body_of(&response);
    assert!(body.contains("\"degraded\""));
    assert!(!body.contains("\"rule_store_unavailable_total\":0"));
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (addr, _dispatcher) = spawn_server().await;
    let response =
        http_request(addr, "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await;
    assert!(status_of(&response).contains("404"));
}

#[tokio::test]
async fn rules_add_list_and_remove_round_trip() {
    let (addr, _dispatcher) = spawn_server().await;

    let add = http_request(
        addr,
        "POST /rules/ip/203.0.113.9 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    assert!(status_of(&add).contains("200"));

    let list = http_request(
        addr,
        "GET /rules/ip HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(body_of(&list).contains("203.0.113.9"));

    let remove = http_request(
        addr,
        "DELETE /rules/ip/203.0.113.9 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    assert!(status_of(&remove).contains("200"));

    let list_after = http_request(
        addr,
        "GET /rules/ip HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(!body_of(&list_after).contains("203.0.113.9"));
}

#[tokio::test]
async fn ingest_blocked_ip_is_dropped_end_to_end() {
    // spec.md §8 scenario S4, driven through the wire protocol instead of
    // calling the dispatcher directly.
    let (addr, _dispatcher) = spawn_server().await;

    http_request(
        addr,
        "POST /rules/ip/192.168.1.50 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
    )
    .await;

    let payload = serde_json::json!({
        "tuple": {
            "src_ip": "192.168.1.50",
            "dst_ip": "142.250.185.206",
            "src_port": 55000,
            "dst_port": 443,
            "protocol": "TCP"
        },
        "size": 512,
        "outbound": true,
    })
    .to_string();

    let request = format!(
        "POST /ingest HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        payload.len(),
        payload
    );
    let response = http_request(addr, &request).await;

    assert!(status_of(&response).contains("200"));
    assert!(body_of(&response).contains("\"dropped\""));
}

#[tokio::test]
async fn ingest_allowed_packet_is_forwarded_and_counted_in_stats() {
    let (addr, _dispatcher) = spawn_server().await;

    let payload = serde_json::json!({
        "tuple": {
            "src_ip": "10.0.0.5",
            "dst_ip": "10.0.0.6",
            "src_port": 4000,
            "dst_port": 443,
            "protocol": "TCP"
        },
        "size": 64,
        "outbound": true,
    })
    .to_string();
    let request = format!(
        "POST /ingest HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        payload.len(),
        payload
    );
    let response = http_request(addr, &request).await;
    assert!(body_of(&response).contains("\"forwarded\""));

    let stats = http_request(
        addr,
        "GET /stats HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(body_of(&stats).contains("\"packets_processed\":1"));
}

#[tokio::test]
async fn analyze_accepts_a_multipart_pcap_upload() {
    use dpi_inspector_core::testing::pcap::capture_with_tls_client_hello;

    let (addr, _dispatcher) = spawn_server().await;
    let pcap_bytes = capture_with_tls_client_hello("www.google.com");
    let request = multipart_analyze_request(&pcap_bytes);

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(&request).await.expect("write multipart request");
    stream.shutdown().await.ok();
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
    let response = String::from_utf8_lossy(&buf).into_owned();

    assert!(status_of(&response).contains("200"));
    assert!(body_of(&response).contains("www.google.com"));
    assert!(body_of(&response).contains("\"total_packets\":1"));
}
