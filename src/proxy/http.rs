use super::{dial, flush_sockets, write_response};
use crate::bridge::Endpoint;
use crate::error::{ProxyError, ProxyResult};
use crate::inspect::read_header;
use crate::metrics::Protocol;
use crate::server::ServerResources;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Route one plaintext connection by its `Host` header.
///
/// Diagnostics are written back as small `200 OK` pages; every early return
/// drops both socket halves, closing the client connection.
pub async fn handle_http_connection(
    stream: TcpStream,
    peer: SocketAddr,
    resources: ServerResources,
) -> ProxyResult<()> {
    resources.metrics.record_connection(Protocol::Http);
    let proxy = &resources.config.proxy;

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let header = read_header(&mut reader, proxy.max_header_bytes).await;
    if !header.is_valid() {
        warn!("Bad header from {}", peer);
        for line in header.lines() {
            debug!("  {}", line);
        }
        resources.metrics.record_routing_failure();
        write_response(&mut write_half, "Bad header").await?;
        let reason = if header.is_truncated() {
            format!(
                "header block cut off after {} line(s) (limit {} bytes)",
                header.lines().len(),
                proxy.max_header_bytes
            )
        } else {
            format!("{} line(s) received", header.lines().len())
        };
        return Err(ProxyError::BadHeader(reason));
    }

    if header.path() == Some(proxy.admin_path.as_str()) {
        info!("Admin flush requested by {}", peer);
        let body = flush_sockets(&resources).await;
        write_response(&mut write_half, &body).await?;
        return Ok(());
    }

    let host = header.host().unwrap_or_default();
    info!(
        "{} {} Host: {}",
        peer,
        header.request_line().unwrap_or_default(),
        host
    );

    let addr = match resources.hosts.resolve(host) {
        Ok(addr) => addr,
        Err(e) => {
            resources.metrics.record_routing_failure();
            write_response(&mut write_half, &format!("Can't detect host {}", host)).await?;
            return Err(e);
        }
    };

    let upstream = match dial(&addr, proxy.dial_timeout()).await {
        Ok(stream) => stream,
        Err(e) => {
            resources.metrics.record_upstream_error();
            write_response(&mut write_half, &e.to_string()).await?;
            return Err(e.into());
        }
    };
    let upstream_peer = upstream.peer_addr()?;
    let (upstream_reader, mut upstream_writer) = upstream.into_split();

    // the backend must see the header block before any bridged byte
    upstream_writer.write_all(header.raw()).await?;

    resources
        .session()
        .run(
            Endpoint::new(peer, reader, write_half),
            Endpoint::new(upstream_peer, upstream_reader, upstream_writer),
            header.raw().len() as u64,
        )
        .await;

    Ok(())
}
