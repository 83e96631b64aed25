//! Shared helpers for the integration tests
#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use vhost_proxy::config::AppConfig;
use vhost_proxy::hostmap::HostMap;
use vhost_proxy::listeners::{HttpProxyServer, TlsProxyServer};
use vhost_proxy::server::ServerResources;

pub const TLS_HANDSHAKE: u8 = 22;
pub const TLS_APPLICATION_DATA: u8 = 23;

/// Write `content` to a fresh temp file
pub fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.servers.http.bind_address = "127.0.0.1".to_string();
    config.servers.http.port = 0;
    config.servers.tls.bind_address = "127.0.0.1".to_string();
    config.servers.tls.port = 0;
    config.servers.healthcheck.port = 0;
    config.proxy.dial_timeout_secs = 1;
    config.proxy.shutdown_grace_ms = 200;
    config
}

/// Resources backed by a temp host map file holding `hosts`
pub async fn resources(hosts: &str) -> (NamedTempFile, ServerResources) {
    resources_with_config(hosts, test_config()).await
}

/// Like [`resources`], starting from a caller-tuned `config`
pub async fn resources_with_config(
    hosts: &str,
    mut config: AppConfig,
) -> (NamedTempFile, ServerResources) {
    let file = temp_file(hosts);
    config.hosts.file = file.path().display().to_string();
    let map = HostMap::load(file.path()).await.unwrap();
    let resources = ServerResources::new(Arc::new(config), Arc::new(map));
    (file, resources)
}

pub async fn spawn_http_proxy(resources: ServerResources) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = HttpProxyServer::new(resources).serve(listener).await;
    });
    addr
}

pub async fn spawn_tls_proxy(resources: ServerResources) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = TlsProxyServer::new(resources).serve(listener).await;
    });
    addr
}

/// Backend that hands every accepted connection to the test
pub async fn spawn_backend() -> (SocketAddr, mpsc::UnboundedReceiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if tx.send(stream).is_err() {
                break;
            }
        }
    });
    (addr, rx)
}

/// Wait for the backend to receive a connection
pub async fn next_backend_conn(rx: &mut mpsc::UnboundedReceiver<TcpStream>) -> TcpStream {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("backend was never contacted")
        .expect("backend listener stopped")
}

/// Assert that no connection reaches the backend within a short window
pub async fn assert_backend_untouched(rx: &mut mpsc::UnboundedReceiver<TcpStream>) {
    let contacted = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(contacted.is_err(), "backend should not have been contacted");
}

/// Poll `condition` until it holds or a few seconds pass
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Split a raw HTTP response into its head and body
pub fn response_body(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);
    text.split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default()
}

pub fn sni_extension(host: &str) -> Vec<u8> {
    let name = host.as_bytes();
    let mut data = Vec::new();
    data.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    data.push(0); // host_name
    data.extend_from_slice(&(name.len() as u16).to_be_bytes());
    data.extend_from_slice(name);
    data
}

/// ClientHello handshake message carrying `extensions`
pub fn client_hello_message(extensions: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut hello = vec![0x03, 0x03];
    hello.extend_from_slice(&[0xab; 32]);
    hello.push(4);
    hello.extend_from_slice(&[1, 2, 3, 4]);
    hello.extend_from_slice(&[0x00, 0x04, 0x13, 0x01, 0x13, 0x02]);
    hello.extend_from_slice(&[0x01, 0x00]);

    let mut block = Vec::new();
    for (extension_type, data) in extensions {
        block.extend_from_slice(&extension_type.to_be_bytes());
        block.extend_from_slice(&(data.len() as u16).to_be_bytes());
        block.extend_from_slice(data);
    }
    hello.extend_from_slice(&(block.len() as u16).to_be_bytes());
    hello.extend_from_slice(&block);

    let mut message = vec![1];
    message.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
    message.extend_from_slice(&hello);
    message
}

pub fn tls_record(content_type: u8, body: &[u8]) -> Vec<u8> {
    let mut record = vec![content_type, 0x03, 0x01];
    record.extend_from_slice(&(body.len() as u16).to_be_bytes());
    record.extend_from_slice(body);
    record
}

/// Full handshake record; `None` leaves the server_name extension out
pub fn client_hello(server_name: Option<&str>) -> Vec<u8> {
    let mut extensions = vec![(43u16, vec![0x02, 0x03, 0x04])];
    if let Some(name) = server_name {
        extensions.insert(0, (0u16, sni_extension(name)));
    }
    tls_record(TLS_HANDSHAKE, &client_hello_message(&extensions))
}
