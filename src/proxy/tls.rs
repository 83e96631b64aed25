use super::{dial, tls_upstream_addr, write_response};
use crate::bridge::Endpoint;
use crate::error::ProxyResult;
use crate::inspect::TlsRecord;
use crate::metrics::Protocol;
use crate::server::ServerResources;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Route one TLS connection by the SNI in its ClientHello, without
/// terminating TLS.
pub async fn handle_tls_connection(
    stream: TcpStream,
    peer: SocketAddr,
    resources: ServerResources,
) -> ProxyResult<()> {
    resources.metrics.record_connection(Protocol::Tls);
    let proxy = &resources.config.proxy;

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let record = TlsRecord::read_from(&mut reader)
        .await
        .inspect_err(|_| resources.metrics.record_routing_failure())?;

    let server_name = record
        .server_name()
        .inspect_err(|_| resources.metrics.record_routing_failure())?;
    info!("{} ServerName: {}", peer, server_name);

    let addr = match resources.hosts.resolve(&server_name) {
        Ok(addr) => addr,
        Err(e) => {
            resources.metrics.record_routing_failure();
            // not valid TLS; only useful to someone probing with a raw socket
            let diagnostic = format!("Can't detect host {}", server_name);
            if let Err(write_err) = write_response(&mut write_half, &diagnostic).await {
                debug!("Diagnostic to {} not delivered: {}", peer, write_err);
            }
            return Err(e);
        }
    };

    let addr = tls_upstream_addr(&addr);
    info!("Making connection to {}", addr);
    let upstream = dial(&addr, proxy.dial_timeout())
        .await
        .inspect_err(|_| resources.metrics.record_upstream_error())?;
    let upstream_peer = upstream.peer_addr()?;
    let (upstream_reader, mut upstream_writer) = upstream.into_split();

    upstream_writer.write_all(record.as_bytes()).await?;

    resources
        .session()
        .run(
            Endpoint::new(peer, reader, write_half),
            Endpoint::new(upstream_peer, upstream_reader, upstream_writer),
            record.as_bytes().len() as u64,
        )
        .await;

    Ok(())
}
