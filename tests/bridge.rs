use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use vhost_proxy::bridge::{Endpoint, Session, bridge};
use vhost_proxy::metrics::Metrics;
use vhost_proxy::registry::ConnectionRegistry;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn test_bridge_copies_until_eof() {
    let (mut writer, source) = tokio::io::duplex(64);
    let (destination, mut reader) = tokio::io::duplex(64);

    let task = tokio::spawn(bridge(destination, source, CancellationToken::new()));

    writer.write_all(b"hello bridge").await.unwrap();
    drop(writer);

    let copied = task.await.unwrap();
    assert_eq!(copied, 12);

    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"hello bridge");
}

#[tokio::test]
async fn test_bridge_stops_when_cancelled() {
    let (mut writer, source) = tokio::io::duplex(64);
    let (destination, mut reader) = tokio::io::duplex(64);
    let closer = CancellationToken::new();

    let task = tokio::spawn(bridge(destination, source, closer.clone()));

    writer.write_all(b"abc").await.unwrap();
    let mut buf = [0u8; 3];
    reader.read_exact(&mut buf).await.unwrap();

    closer.cancel();
    let copied = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("bridge ignored cancellation")
        .unwrap();
    assert_eq!(copied, 3);

    // destination was shut down
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_session_ends_on_first_eof_and_deregisters() {
    let registry = Arc::new(ConnectionRegistry::new());
    let metrics = Arc::new(Metrics::new());

    let (mut client, proxy_down) = tokio::io::duplex(1024);
    let (proxy_up, mut backend) = tokio::io::duplex(1024);
    let (down_read, down_write) = tokio::io::split(proxy_down);
    let (up_read, up_write) = tokio::io::split(proxy_up);

    let session = Session::new(
        Arc::clone(&registry),
        Arc::clone(&metrics),
        Duration::from_millis(200),
    );
    let run = tokio::spawn(session.run(
        Endpoint::new(addr(1000), down_read, down_write),
        Endpoint::new(addr(2000), up_read, up_write),
        10,
    ));

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    backend.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    backend.write_all(b"pong!").await.unwrap();
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong!");
    assert_eq!(registry.len(), 1);

    // the client leaving ends the whole session
    drop(client);
    let stats = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("session did not end")
        .unwrap();

    assert_eq!(stats.bytes_upstream, 14);
    assert_eq!(stats.bytes_downstream, 5);
    assert!(registry.is_empty());

    let mut rest = Vec::new();
    backend.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.sessions_started, 1);
    assert_eq!(snapshot.sessions_completed, 1);
    assert_eq!(snapshot.active_sessions, 0);
}

#[tokio::test]
async fn test_close_all_ends_running_session() {
    let registry = Arc::new(ConnectionRegistry::new());
    let metrics = Arc::new(Metrics::new());

    let (mut client, proxy_down) = tokio::io::duplex(1024);
    let (proxy_up, mut backend) = tokio::io::duplex(1024);
    let (down_read, down_write) = tokio::io::split(proxy_down);
    let (up_read, up_write) = tokio::io::split(proxy_up);

    let session = Session::new(
        Arc::clone(&registry),
        Arc::clone(&metrics),
        Duration::from_millis(200),
    );
    let run = tokio::spawn(session.run(
        Endpoint::new(addr(1000), down_read, down_write),
        Endpoint::new(addr(2000), up_read, up_write),
        0,
    ));

    for _ in 0..100 {
        if registry.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.close_all(), 1);

    tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("flush did not end the session")
        .unwrap();

    // both ends observe the close
    let mut buf = Vec::new();
    assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    assert_eq!(backend.read_to_end(&mut buf).await.unwrap(), 0);
    assert!(registry.is_empty());
}
