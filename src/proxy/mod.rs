pub mod http;
pub mod tls;

pub use http::handle_http_connection;
pub use tls::handle_tls_connection;

use crate::error::UpstreamError;
use crate::server::ServerResources;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{error, info};

/// Open the upstream connection, bounded by `timeout`
pub async fn dial(addr: &str, timeout: Duration) -> Result<TcpStream, UpstreamError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(UpstreamError::ConnectionFailed {
            upstream: addr.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(UpstreamError::Timeout {
            upstream: addr.to_string(),
            timeout,
        }),
    }
}

/// Host map entries name the plaintext service; TLS goes to port 443 on the
/// same host.
pub fn tls_upstream_addr(addr: &str) -> String {
    match addr.strip_suffix(":80") {
        Some(host) => format!("{}:443", host),
        None => addr.to_string(),
    }
}

/// Write a complete `200 OK` text/html response carrying `content`
pub async fn write_response<W>(writer: &mut W, content: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
        content.len(),
        content
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

/// Close every live session and reload the host map.
///
/// Returns the response body: `ok`, or the reload error when the previous
/// map had to be kept.
pub async fn flush_sockets(resources: &ServerResources) -> String {
    let closed = resources.registry.close_all();
    resources.metrics.record_flush();
    info!("FlushSockets: closed {} session(s)", closed);

    match resources.hosts.reload().await {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            error!("Host map reload failed, keeping previous map: {}", e);
            e.to_string()
        }
    }
}
