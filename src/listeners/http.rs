use super::accept_loop;
use crate::proxy::handle_http_connection;
use crate::server::ServerResources;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Plaintext listener, routes by the `Host` header
pub struct HttpProxyServer {
    resources: ServerResources,
}

impl HttpProxyServer {
    pub fn new(resources: ServerResources) -> Self {
        Self { resources }
    }

    pub async fn start(&self) -> Result<()> {
        let server_config = &self.resources.config.servers.http;
        if !server_config.enabled {
            info!("HTTP server is disabled");
            return Ok(());
        }

        let bind_addr = server_config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("HTTP server listening on TCP {}", listener.local_addr()?);
        accept_loop(
            "HTTP",
            listener,
            self.resources.clone(),
            handle_http_connection,
        )
        .await
    }
}
