use super::accept_loop;
use crate::proxy::handle_tls_connection;
use crate::server::ServerResources;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// TLS passthrough listener, routes by SNI
pub struct TlsProxyServer {
    resources: ServerResources,
}

impl TlsProxyServer {
    pub fn new(resources: ServerResources) -> Self {
        Self { resources }
    }

    pub async fn start(&self) -> Result<()> {
        let server_config = &self.resources.config.servers.tls;
        if !server_config.enabled {
            info!("TLS server is disabled");
            return Ok(());
        }

        let bind_addr = server_config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind TLS server to {}", bind_addr))?;

        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("TLS server listening on TCP {}", listener.local_addr()?);
        accept_loop(
            "TLS",
            listener,
            self.resources.clone(),
            handle_tls_connection,
        )
        .await
    }
}
