pub mod http;
pub mod tls;

pub use http::{RequestHeader, read_header};
pub use tls::{ClientHello, Extension, RecordHeader, TlsRecord};
