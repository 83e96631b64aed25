pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod hostmap;
pub mod inspect;
pub mod listeners;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{AppConfig, HostsConfig, ProxyConfig, ServersConfig};
pub use error::{ProxyError, ProxyResult};
pub use hostmap::HostMap;
pub use registry::ConnectionRegistry;
pub use server::ServerResources;
