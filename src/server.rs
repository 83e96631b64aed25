/// Common server startup utilities
use crate::bridge::Session;
use crate::config::AppConfig;
use crate::hostmap::HostMap;
use crate::metrics::Metrics;
use crate::registry::ConnectionRegistry;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Common server startup helper
pub struct ServerStarter;

impl ServerStarter {
    /// Spawn a server future unless it is disabled
    pub fn start_server<F, Fut>(
        name: &str,
        enabled: bool,
        bind_addr: String,
        resources: ServerResources,
        server_future: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(ServerResources) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        if !enabled {
            info!("{} server is disabled", name);
            return None;
        }

        let name_for_log = name.to_string();
        let name = name.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) = server_future(resources).await {
                error!("{} server error: {:#}", name, e);
            }
        });

        info!("{} server starting on {}", name_for_log, bind_addr);
        Some(handle)
    }
}

/// State shared by every listener and connection task.
///
/// One instance is built at startup and cloned cheaply into each task.
#[derive(Clone)]
pub struct ServerResources {
    pub config: Arc<AppConfig>,
    pub hosts: Arc<HostMap>,
    pub registry: Arc<ConnectionRegistry>,
    pub metrics: Arc<Metrics>,
}

impl ServerResources {
    pub fn new(config: Arc<AppConfig>, hosts: Arc<HostMap>) -> Self {
        Self {
            config,
            hosts,
            registry: Arc::new(ConnectionRegistry::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Session runner wired to the shared registry and metrics
    pub fn session(&self) -> Session {
        Session::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            self.config.proxy.shutdown_grace(),
        )
    }
}
