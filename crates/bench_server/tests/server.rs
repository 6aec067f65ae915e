use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bench_server::{create_server, Backend, BenchServer, MemoryBackend, ServerConfig, ServerError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct RawResponse {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

async fn start_server() -> (Arc<BenchServer>, SocketAddr, JoinHandle<Result<(), ServerError>>) {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        world_count: 50,
        cache_size: 50,
        rng_shards: 2,
        ..Default::default()
    };
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new(50));
    let server = Arc::new(create_server(config, backend).await.unwrap());

    let listeners = server.bind_listeners().unwrap();
    let addr = listeners[0].local_addr().unwrap();
    let handle = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listeners).await }
    });
    (server, addr, handle)
}

/// Splits one response off the front of `buf`, if a whole one is there.
fn take_response(buf: &mut Vec<u8>) -> Option<RawResponse> {
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = String::from_utf8(buf[..head_end - 4].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .map(|line| {
            let (name, value) = line.split_once(':').unwrap();
            (name.to_string(), value.trim().to_string())
        })
        .collect();
    let length: usize = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.parse().unwrap())
        .unwrap_or(0);

    if buf.len() < head_end + length {
        return None;
    }
    let body = buf[head_end..head_end + length].to_vec();
    buf.drain(..head_end + length);
    Some(RawResponse {
        status_line,
        headers,
        body,
    })
}

async fn read_responses(stream: &mut TcpStream, count: usize) -> Vec<RawResponse> {
    let mut buf = Vec::new();
    let mut responses = Vec::with_capacity(count);
    let deadline = Duration::from_secs(5);

    while responses.len() < count {
        while let Some(response) = take_response(&mut buf) {
            responses.push(response);
        }
        if responses.len() == count {
            break;
        }
        let mut chunk = [0u8; 4096];
        let read = tokio::time::timeout(deadline, stream.read(&mut chunk))
            .await
            .expect("timed out waiting for a response")
            .unwrap();
        assert!(read > 0, "connection closed after {} responses", responses.len());
        buf.extend_from_slice(&chunk[..read]);
    }
    responses
}

async fn expect_closed(stream: &mut TcpStream) {
    let mut chunk = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
        .await
        .expect("connection was left open")
        .unwrap_or(0);
    assert_eq!(read, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_json_with_standard_headers() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /json HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let response = read_responses(&mut stream, 1).await.remove(0);
    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    assert_eq!(response.header("Server"), Some("bench"));
    assert!(response.header("Date").unwrap().ends_with("GMT"));
    assert_eq!(response.body, br#"{"message":"Hello, World!"}"#);

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn pipelined_requests_answer_in_order() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /plaintext HTTP/1.1\r\n\r\n\
              GET /queries?queries=3 HTTP/1.1\r\n\r\n\
              GET /fortunes HTTP/1.1\r\n\r\n\
              GET /cached-worlds?queries=2 HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();

    let responses = read_responses(&mut stream, 4).await;
    assert_eq!(responses[0].body, b"Hello, World!");
    assert_eq!(
        responses[0].header("Content-Type"),
        Some("text/plain; charset=utf-8")
    );

    let worlds: serde_json::Value = serde_json::from_slice(&responses[1].body).unwrap();
    assert_eq!(worlds.as_array().unwrap().len(), 3);

    assert_eq!(
        responses[2].header("Content-Type"),
        Some("text/html; charset=utf-8")
    );
    assert!(String::from_utf8_lossy(&responses[2].body).contains("<title>Fortunes</title>"));

    let cached: serde_json::Value = serde_json::from_slice(&responses[3].body).unwrap();
    assert_eq!(cached.as_array().unwrap().len(), 2);

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn updates_and_db_over_the_wire() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /db HTTP/1.1\r\n\r\nGET /updates?queries=600 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let responses = read_responses(&mut stream, 2).await;
    let world: serde_json::Value = serde_json::from_slice(&responses[0].body).unwrap();
    assert!(world["id"].as_i64().unwrap() >= 1);

    let worlds: serde_json::Value = serde_json::from_slice(&responses[1].body).unwrap();
    let ids: Vec<i64> = worlds
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 500);
    assert!(ids.windows(2).all(|pair| pair[0] <= pair[1]));

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn query_values_are_percent_decoded() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /queries?queries=%32%30 HTTP/1.1\r\n\r\n\
              GET /cached-worlds?queries=%2B3 HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();

    let responses = read_responses(&mut stream, 2).await;
    let decoded: serde_json::Value = serde_json::from_slice(&responses[0].body).unwrap();
    assert_eq!(decoded.as_array().unwrap().len(), 20);

    // "+3" is not a plain count.
    let signed: serde_json::Value = serde_json::from_slice(&responses[1].body).unwrap();
    assert_eq!(signed.as_array().unwrap().len(), 1);

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_path_is_404_and_keeps_connection() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /nope HTTP/1.1\r\n\r\n").await.unwrap();
    let missing = read_responses(&mut stream, 1).await.remove(0);
    assert_eq!(missing.status_line, "HTTP/1.1 404 Not Found");
    assert!(missing.body.is_empty());

    stream.write_all(b"GET /json HTTP/1.1\r\n\r\n").await.unwrap();
    let ok = read_responses(&mut stream, 1).await.remove(0);
    assert_eq!(ok.status_line, "HTTP/1.1 200 OK");

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_request_gets_400_and_close() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"BROKEN\r\n\r\n").await.unwrap();
    let response = read_responses(&mut stream, 1).await.remove(0);
    assert_eq!(response.status_line, "HTTP/1.1 400 Bad Request");
    expect_closed(&mut stream).await;

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_close_is_honoured() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /plaintext HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let response = read_responses(&mut stream, 1).await.remove(0);
    assert_eq!(response.body, b"Hello, World!");
    expect_closed(&mut stream).await;

    server.shutdown();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_idle_connections() {
    let (server, addr, handle) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /json HTTP/1.1\r\n\r\n").await.unwrap();
    read_responses(&mut stream, 1).await;

    server.shutdown();
    handle.await.unwrap().unwrap();
    expect_closed(&mut stream).await;
}
