//! Virtual host to backend address table.
//!
//! The table is loaded from a line-oriented text file of `address hostname`
//! pairs and published through an [`ArcSwap`], so a reload replaces the whole
//! table at once and concurrent lookups never observe a half-built map.

use crate::error::{ProxyError, ProxyResult};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Port assumed when a mapping omits one
pub const DEFAULT_PORT: u16 = 80;

pub type HostTable = HashMap<String, String>;

pub struct HostMap {
    source: PathBuf,
    table: ArcSwap<HostTable>,
}

impl HostMap {
    /// Read `source` and build the initial table.
    ///
    /// A missing or unreadable file is an error; the binary treats it as fatal.
    pub async fn load<P: AsRef<Path>>(source: P) -> ProxyResult<Self> {
        let source = source.as_ref().to_path_buf();
        let table = read_table(&source).await?;
        Ok(Self {
            source,
            table: ArcSwap::from_pointee(table),
        })
    }

    /// Build a map from an in-memory table, mostly useful in tests.
    pub fn from_table<P: AsRef<Path>>(source: P, table: HostTable) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Re-read the source file and swap in the new table.
    ///
    /// On failure the current table stays in service.
    pub async fn reload(&self) -> ProxyResult<usize> {
        let table = read_table(&self.source).await?;
        let entries = table.len();
        self.table.store(Arc::new(table));
        info!("Host map reloaded from {:?}: {} entries", self.source, entries);
        Ok(entries)
    }

    /// Exact-match lookup of a host name
    pub fn resolve(&self, host: &str) -> ProxyResult<String> {
        self.table
            .load()
            .get(host)
            .cloned()
            .ok_or_else(|| ProxyError::HostNotMapped {
                host: host.to_string(),
            })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }
}

async fn read_table(source: &Path) -> ProxyResult<HostTable> {
    let content =
        tokio::fs::read_to_string(source)
            .await
            .map_err(|source_err| ProxyError::HostMapLoad {
                path: source.display().to_string(),
                source: source_err,
            })?;

    info!("Loading host map from {:?}", source);
    let table = parse_host_table(&content);
    info!("Host map loaded: {} entries", table.len());
    Ok(table)
}

/// Parse `address hostname` lines into a table.
///
/// Comment lines (`#`) and lines that do not hold exactly two tokens are
/// skipped. Later duplicates replace earlier ones.
pub fn parse_host_table(content: &str) -> HostTable {
    let mut table = HostTable::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let (Some(address), Some(host), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            debug!("Skipping unparsable host map line: {}", line);
            continue;
        };

        let address = with_default_port(address);
        debug!("{} -> {}", host, address);
        table.insert(host.to_string(), address);
    }

    table
}

/// Append `:80` to an address that carries no port.
pub fn with_default_port(address: &str) -> String {
    if let Some(rest) = address.strip_prefix('[') {
        // [v6] or [v6]:port
        return match rest.split_once(']') {
            Some((_, "")) => format!("{}:{}", address, DEFAULT_PORT),
            _ => address.to_string(),
        };
    }

    match address.matches(':').count() {
        0 => format!("{}:{}", address, DEFAULT_PORT),
        1 => address.to_string(),
        // bare IPv6 literal
        _ => format!("[{}]:{}", address, DEFAULT_PORT),
    }
}
