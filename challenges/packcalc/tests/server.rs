use std::path::PathBuf;

use packcalc::config::{Config, PackSizes};
use packcalc::protocol::CalcResponse;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: std::net::SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

async fn start(sizes: &[i64]) -> TestServer {
    let config = Config {
        port: 0,
        bind: "127.0.0.1".parse().unwrap(),
        pack_sizes: Some(PackSizes(sizes.to_vec())),
        max_items: 1_000_000,
        max_sizes: 100,
        ui: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/web/index.html")),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        packcalc::server::run(listener, config, rx).await;
    });
    TestServer { addr, shutdown, task }
}

impl TestServer {
    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        self.task.await.unwrap();
    }
}

/// Sends one raw request with `Connection: close` and returns the whole response.
async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").unwrap().1
}

#[tokio::test]
async fn test_get_calc() {
    let server = start(&[250, 500, 1000, 2000, 5000]).await;
    let response = exchange(
        server.addr,
        "GET /api/calc?items=501 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.contains("Content-Type: application/json\r\n"));
    assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));
    let calc: CalcResponse = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(calc.items_ordered, 501);
    assert_eq!(calc.total_items, 750);
    assert_eq!(calc.packs.len(), 2);
    assert_eq!((calc.packs[0].size, calc.packs[0].qty), (500, 1));
    assert_eq!((calc.packs[1].size, calc.packs[1].qty), (250, 1));
    server.stop().await;
}

#[tokio::test]
async fn test_post_calc() {
    let server = start(&[]).await;
    let json = r#"{"items": 100, "sizes": [25, 10, 5]}"#;
    let raw = format!(
        "POST /api/calc HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        json.len(),
        json
    );
    let response = exchange(server.addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert_eq!(
        body(&response),
        r#"{"itemsOrdered":100,"totalItems":100,"packs":[{"size":25,"qty":4}]}"#
    );
    server.stop().await;
}

#[tokio::test]
async fn test_keep_alive_serves_several_requests() {
    let server = start(&[3, 5]).await;
    let raw = "GET /health HTTP/1.1\r\n\r\nGET /api/calc?items=7 HTTP/1.1\r\nConnection: close\r\n\r\n";
    let response = exchange(server.addr, raw).await;
    let first = response.find("HTTP/1.1 200 OK").unwrap();
    let second = response.rfind("HTTP/1.1 200 OK").unwrap();
    assert!(first < second);
    assert!(response.contains("\r\n\r\nok"));
    assert!(response.ends_with(r#"{"itemsOrdered":7,"totalItems":8,"packs":[{"size":5,"qty":1},{"size":3,"qty":1}]}"#));
    server.stop().await;
}

#[tokio::test]
async fn test_http10_connection_closes_after_response() {
    let server = start(&[250]).await;
    // no Connection header: read_to_string only returns once the server closes
    let response = exchange(server.addr, "GET /health HTTP/1.0\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert_eq!(body(&response), "ok");
    server.stop().await;
}

#[tokio::test]
async fn test_client_errors() {
    let server = start(&[250]).await;

    let response = exchange(server.addr, "GET /api/calc HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(body(&response), "missing items");

    let response = exchange(server.addr, "DELETE /api/calc HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

    let response = exchange(server.addr, "OPTIONS /api/calc HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(response.contains("Access-Control-Allow-Methods: GET,POST,OPTIONS\r\n"));

    // malformed framing is answered once and the connection closed
    let response = exchange(server.addr, "NONSENSE\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains("Connection: close\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn test_serves_ui() {
    let server = start(&[250]).await;
    let response = exchange(server.addr, "GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html"));
    assert!(body(&response).contains("Pack calculator"));
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_idle_connections() {
    let server = start(&[250]).await;
    let mut idle = TcpStream::connect(server.addr).await.unwrap();
    // make sure the connection has been accepted before shutting down
    idle.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !seen.ends_with(b"\r\n\r\nok") {
        let n = idle.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed early");
        seen.extend_from_slice(&buf[..n]);
    }
    assert!(seen.starts_with(b"HTTP/1.1 200 OK"));

    server.stop().await;
    let mut rest = Vec::new();
    idle.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}
