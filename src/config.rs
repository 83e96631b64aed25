use crate::error::{ProxyError, ProxyResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub servers: ServersConfig,
    pub hosts: HostsConfig,
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServersConfig {
    /// Plaintext listener, routed by the `Host` header
    pub http: ServerPortConfig,
    /// TLS passthrough listener, routed by SNI
    pub tls: ServerPortConfig,
    pub healthcheck: HealthcheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPortConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthcheckConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    #[serde(default = "default_healthcheck_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Line-oriented `address hostname` file
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream connect timeout in seconds
    pub dial_timeout_secs: u64,
    /// Request path that flushes all sessions and reloads the host map
    pub admin_path: String,
    /// Upper bound on the buffered HTTP header block
    pub max_header_bytes: usize,
    /// How long teardown waits for the second bridge direction
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub json: bool,
    pub rotation: bool,
}

fn default_healthcheck_path() -> String {
    "/health".to_string()
}

impl ServerPortConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl HealthcheckConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            http: ServerPortConfig {
                enabled: true,
                bind_address: "0.0.0.0".to_string(),
                port: 80,
            },
            tls: ServerPortConfig {
                enabled: true,
                bind_address: "0.0.0.0".to_string(),
                port: 443,
            },
            healthcheck: HealthcheckConfig {
                enabled: true,
                bind_address: "127.0.0.1".to_string(),
                port: 9080,
                path: default_healthcheck_path(),
            },
        }
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            file: "mapper.txt".to_string(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 3,
            admin_path: "/flushSockets".to_string(),
            max_header_bytes: 64 * 1024,
            shutdown_grace_ms: 1000,
        }
    }
}

impl ProxyConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
            rotation: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config file, using defaults: {:#}", e);
            Self::default()
        })
    }

    /// Reject settings the proxy cannot run with
    pub fn validate(&self) -> ProxyResult<()> {
        let servers = &self.servers;
        let mut bound: Vec<(&str, &str, u16)> = Vec::new();
        if servers.http.enabled {
            bound.push(("http", &servers.http.bind_address, servers.http.port));
        }
        if servers.tls.enabled {
            bound.push(("tls", &servers.tls.bind_address, servers.tls.port));
        }
        if servers.healthcheck.enabled {
            bound.push((
                "healthcheck",
                &servers.healthcheck.bind_address,
                servers.healthcheck.port,
            ));
        }

        for (i, (name, addr, port)) in bound.iter().enumerate() {
            for (other, other_addr, other_port) in &bound[i + 1..] {
                // port 0 asks the OS for an ephemeral port, never a conflict
                if *port != 0 && port == other_port && addr == other_addr {
                    return Err(ProxyError::Config(format!(
                        "{} and {} servers both bind {}:{}",
                        name, other, addr, port
                    )));
                }
            }
        }

        if servers.healthcheck.enabled && !servers.healthcheck.path.starts_with('/') {
            return Err(ProxyError::Config(format!(
                "healthcheck path must start with '/': {}",
                servers.healthcheck.path
            )));
        }

        if self.hosts.file.trim().is_empty() {
            return Err(ProxyError::Config("hosts.file must not be empty".into()));
        }

        if self.proxy.dial_timeout_secs == 0 {
            return Err(ProxyError::Config(
                "proxy.dial_timeout_secs must be greater than zero".into(),
            ));
        }

        if !self.proxy.admin_path.starts_with('/') {
            return Err(ProxyError::Config(format!(
                "proxy.admin_path must start with '/': {}",
                self.proxy.admin_path
            )));
        }

        if self.proxy.max_header_bytes == 0 {
            return Err(ProxyError::Config(
                "proxy.max_header_bytes must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
