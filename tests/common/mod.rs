//! Shared test utilities

#![allow(dead_code)]

use std::net::SocketAddr;

use alpaca_server::config::file::ServerConfigFile;
use alpaca_server::{Config, Daemon, Running};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Configuration with ephemeral ports and one device of each kind
#[must_use]
pub fn test_config() -> Config {
    let env = |key: &str| match key {
        "ALPACA_PORT" | "ALPACA_DISCOVERY_PORT" => Some("0".to_string()),
        _ => None,
    };
    Config::resolve(ServerConfigFile::default(), env).expect("failed to resolve test config")
}

/// Start a daemon on ephemeral ports
pub async fn start() -> Running {
    start_with(test_config()).await
}

pub async fn start_with(config: Config) -> Running {
    Daemon::new(config)
        .expect("failed to build daemon")
        .start()
        .await
        .expect("failed to start daemon")
}

/// Send raw bytes and return the full response text
pub async fn raw(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(request.as_bytes()).await.expect("write failed");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read failed");
    String::from_utf8(response).expect("response is not UTF-8")
}

fn body_json(response: &str) -> serde_json::Value {
    let (_, body) = response
        .split_once("\r\n\r\n")
        .expect("response has no header terminator");
    serde_json::from_str(body).expect("body is not JSON")
}

/// `GET path?query` and parse the JSON body
pub async fn get(addr: SocketAddr, path: &str, query: &str) -> serde_json::Value {
    let target = if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    };
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    body_json(&raw(addr, &request).await)
}

/// `PUT path` with a form body and parse the JSON body
pub async fn put(addr: SocketAddr, path: &str, form: &str) -> serde_json::Value {
    let request = format!(
        "PUT {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{form}",
        form.len()
    );
    body_json(&raw(addr, &request).await)
}

/// Address on the loopback interface for a listener bound to all interfaces
#[must_use]
pub fn loopback(addr: SocketAddr) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], addr.port()))
}
