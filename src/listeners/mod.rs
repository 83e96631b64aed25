pub mod healthcheck;
pub mod http;
pub mod tls;

pub use healthcheck::HealthcheckServer;
pub use http::HttpProxyServer;
pub use tls::TlsProxyServer;

use crate::error::ProxyResult;
use crate::server::ServerResources;
use crate::utils::AcceptBackoff;
use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

/// Accept forever, handing each connection to `handler` on its own task.
///
/// A failing connection only ends its own task; accept errors back off and
/// the loop keeps going.
pub async fn accept_loop<H, Fut>(
    name: &'static str,
    listener: TcpListener,
    resources: ServerResources,
    handler: H,
) -> Result<()>
where
    H: Fn(TcpStream, SocketAddr, ServerResources) -> Fut + Copy + Send + Sync + 'static,
    Fut: Future<Output = ProxyResult<()>> + Send + 'static,
{
    let backoff = AcceptBackoff::default();

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                backoff.reset();
                debug!("New {} connection from {}", name, addr);
                let resources = resources.clone();
                tokio::spawn(async move {
                    match handler(stream, addr, resources).await {
                        Ok(()) => debug!("{} connection from {} completed", name, addr),
                        Err(e) => warn!("{} connection from {} dropped: {}", name, addr, e),
                    }
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!("{} accept error: {} (retrying in {:?})", name, e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
