use crate::config::AppConfig;
use crate::hostmap::HostMap;
use crate::listeners::{HealthcheckServer, HttpProxyServer, TlsProxyServer};
use crate::server::{ServerResources, ServerStarter};
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// The proxy instance: shared resources plus the spawned listener tasks
pub struct App {
    pub resources: ServerResources,
    handles: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(config: AppConfig, hosts: HostMap) -> Self {
        let resources = ServerResources::new(Arc::new(config), Arc::new(hosts));
        Self {
            resources,
            handles: Vec::new(),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        info!("Starting vhost proxy...");

        let servers = &self.resources.config.servers;

        let http = ServerStarter::start_server(
            "HTTP",
            servers.http.enabled,
            servers.http.bind_addr(),
            self.resources.clone(),
            |resources| async move { HttpProxyServer::new(resources).start().await },
        );

        let tls = ServerStarter::start_server(
            "TLS",
            servers.tls.enabled,
            servers.tls.bind_addr(),
            self.resources.clone(),
            |resources| async move { TlsProxyServer::new(resources).start().await },
        );

        let healthcheck = ServerStarter::start_server(
            "Healthcheck",
            servers.healthcheck.enabled,
            servers.healthcheck.bind_addr(),
            self.resources.clone(),
            |resources| async move { HealthcheckServer::new(resources).start().await },
        );

        self.handles.extend([http, tls, healthcheck].into_iter().flatten());

        info!("All enabled servers started ({} running)", self.handles.len());
        Ok(())
    }

    pub fn running_servers(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Stop accepting, then close every live session
    pub async fn wait_for_shutdown(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        let closed = self.resources.registry.close_all();
        info!("Shutdown complete, closed {} session(s)", closed);
    }
}
