/// Error types for the virtual host proxy
use std::time::Duration;
use thiserror::Error;

/// Main error type for proxy operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host map source could not be read
    #[error("Failed to load host map from {path}: {source}")]
    HostMapLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Routing key has no entry in the host map
    #[error("Host not mapped: {host}")]
    HostNotMapped { host: String },

    /// HTTP request header block is unusable
    #[error("Bad header: {0}")]
    BadHeader(String),

    /// TLS handshake inspection errors
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Upstream connection errors
    #[error("Upstream connection error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Network I/O errors
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while reading or decoding the first TLS record
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// First record is not a handshake record
    #[error("Not a handshake record (content type {content_type})")]
    NotHandshake { content_type: u8 },

    /// Handshake message is not a ClientHello
    #[error("Unexpected handshake message type {msg_type}")]
    NotClientHello { msg_type: u8 },

    /// Record or message is truncated or has inconsistent lengths
    #[error("Malformed handshake: {reason}")]
    Malformed { reason: String },

    /// Record length exceeds what TLS allows
    #[error("Record too large: {length} bytes")]
    RecordTooLarge { length: usize },

    /// ClientHello carries no usable server_name extension
    #[error("ClientHello has no server name")]
    MissingServerName,
}

/// Upstream connection errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Connection failed
    #[error("Failed to connect to upstream {upstream}: {reason}")]
    ConnectionFailed { upstream: String, reason: String },

    /// Connect did not finish in time
    #[error("Connection to upstream {upstream} timed out after {timeout:?}")]
    Timeout { upstream: String, timeout: Duration },
}

/// Result type alias for convenience
pub type ProxyResult<T> = Result<T, ProxyError>;

impl HandshakeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
