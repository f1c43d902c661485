//! End-to-end checks of the HTTP dispatcher over a real socket.
//!
//! The gateway is built from configuration but no polling supervisor is
//! started, so reads serve the cache's pre-first-poll state and switch
//! writes hit a link that was never opened.

use std::net::SocketAddr;
use std::sync::Arc;

use serialgate::config;
use serialgate::gateway::Gateway;
use serialgate::server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CONFIG: &str = r#"
    [devices.btd1]
    devfile = "/dev/ttyUSB0"
    baud = 9600

    [[devices.btd1.adcs]]
    id = "volt1"
    vref = 5.0
    cmdget = "a"
    expr = "adcval * (vref / 256)"

    [[devices.btd1.tmpts]]
    id = "temp1"
    cmdlsb = "l"
    cmdmsb = "m"

    [[devices.btd1.swts]]
    id = "relay1"
    cmdget = "g"
    cmdset = "s"
    cmdclr = "c"
"#;

async fn serve_gateway() -> SocketAddr {
    let (registry, settings) = config::from_str(CONFIG).unwrap();
    let gateway = Arc::new(Gateway::new(registry, settings));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(gateway);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    roundtrip(addr, &request).await
}

async fn post(addr: SocketAddr, path: &str, body: &str) -> String {
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    roundtrip(addr, &request).await
}

async fn roundtrip(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

#[tokio::test]
async fn read_path_formats_per_kind() {
    let addr = serve_gateway().await;

    let response = get(addr, "/btd1/adcs/volt1").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("0.00\n"));

    let response = get(addr, "/btd1/tmpts/temp1").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("0.0\n"));

    let response = get(addr, "/btd1/swts/relay1").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("false\n"));
}

#[tokio::test]
async fn unknown_keys_are_client_errors() {
    let addr = serve_gateway().await;

    for path in [
        "/nodev/adcs/volt1",
        "/btd1/adcs/nope",
        "/btd1/gauges/volt1",
        "/btd1/tmpts/relay1",
    ] {
        let response = get(addr, path).await;
        assert!(
            response.starts_with("HTTP/1.1 400"),
            "expected 400 for {path}, got: {response}"
        );
    }
}

#[tokio::test]
async fn write_path_validates_before_touching_hardware() {
    let addr = serve_gateway().await;

    // Only the literal bodies "true" and "false" are accepted.
    let response = post(addr, "/btd1/swts/relay1", "maybe").await;
    assert!(response.starts_with("HTTP/1.1 400"));

    // Writes are only defined for switches.
    let response = post(addr, "/btd1/adcs/volt1", "true").await;
    assert!(response.starts_with("HTTP/1.1 400"));

    // Valid request, but the device link was never opened: server error.
    let response = post(addr, "/btd1/swts/relay1", "true").await;
    assert!(response.starts_with("HTTP/1.1 500"));
}
