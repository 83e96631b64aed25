//! First-record inspection for TLS passthrough.
//!
//! Only the plaintext ClientHello is decoded, and only far enough to list its
//! extensions. The record is kept byte-for-byte so it can be replayed to the
//! chosen backend; nothing is ever re-encoded.
//!
//! Record layout:
//! - byte 0: content type (22 = handshake)
//! - bytes 1-2: protocol version
//! - bytes 3-4: body length
//!
//! ClientHello body (after the 4-byte handshake header):
//! - 2 bytes legacy version, 32 bytes random
//! - session id (1-byte length prefix)
//! - cipher suites (2-byte length prefix)
//! - compression methods (1-byte length prefix)
//! - optional extensions block (2-byte length prefix)

use crate::error::{HandshakeError, ProxyResult};
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

pub const CONTENT_TYPE_HANDSHAKE: u8 = 22;
pub const HANDSHAKE_CLIENT_HELLO: u8 = 1;
pub const EXTENSION_SERVER_NAME: u16 = 0;

pub const RECORD_HEADER_LEN: usize = 5;
/// Largest record body TLS permits (2^14 plus expansion allowance)
pub const MAX_RECORD_LEN: usize = (1 << 14) + 2048;

/// Bytes of list length, entry type and name length ahead of the SNI name
const SERVER_NAME_PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: u8,
    pub version: u16,
    pub length: u16,
}

/// One TLS record exactly as it came off the wire
#[derive(Debug, Clone)]
pub struct TlsRecord {
    header: RecordHeader,
    raw: Bytes,
}

#[derive(Debug, Clone)]
pub struct Extension {
    pub extension_type: u16,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ClientHello {
    pub version: u16,
    pub random: Bytes,
    pub session_id: Bytes,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Bytes,
    pub extensions: Vec<Extension>,
}

impl TlsRecord {
    /// Read one full record: the 5-byte header, then exactly `length` bytes.
    pub async fn read_from<R>(reader: &mut R) -> ProxyResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = [0u8; RECORD_HEADER_LEN];
        reader.read_exact(&mut head).await?;

        let header = RecordHeader {
            content_type: head[0],
            version: u16::from_be_bytes([head[1], head[2]]),
            length: u16::from_be_bytes([head[3], head[4]]),
        };

        let length = header.length as usize;
        if length > MAX_RECORD_LEN {
            return Err(HandshakeError::RecordTooLarge { length }.into());
        }

        let mut raw = BytesMut::with_capacity(RECORD_HEADER_LEN + length);
        raw.extend_from_slice(&head);
        raw.resize(RECORD_HEADER_LEN + length, 0);
        reader.read_exact(&mut raw[RECORD_HEADER_LEN..]).await?;

        debug!(
            "TLS record: type {} version {:#06x} length {}",
            header.content_type, header.version, header.length
        );

        Ok(Self {
            header,
            raw: raw.freeze(),
        })
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn is_handshake(&self) -> bool {
        self.header.content_type == CONTENT_TYPE_HANDSHAKE
    }

    /// Header and body, unaltered
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn body(&self) -> Bytes {
        self.raw.slice(RECORD_HEADER_LEN..)
    }

    pub fn client_hello(&self) -> Result<ClientHello, HandshakeError> {
        if !self.is_handshake() {
            return Err(HandshakeError::NotHandshake {
                content_type: self.header.content_type,
            });
        }
        ClientHello::parse(self.body())
    }

    /// SNI host name carried by this record, if it is a ClientHello with one
    pub fn server_name(&self) -> Result<String, HandshakeError> {
        self.client_hello()?
            .server_name()
            .ok_or(HandshakeError::MissingServerName)
    }
}

impl ClientHello {
    /// Decode a handshake message body. The message must fit in the record.
    pub fn parse(body: Bytes) -> Result<Self, HandshakeError> {
        let mut cursor = Cursor::new(body);

        let msg_type = cursor.u8()?;
        if msg_type != HANDSHAKE_CLIENT_HELLO {
            return Err(HandshakeError::NotClientHello { msg_type });
        }
        let length = cursor.u24()? as usize;
        let mut hello = Cursor::new(cursor.take(length)?);

        let version = hello.u16()?;
        let random = hello.take(32)?;

        let session_id_len = hello.u8()? as usize;
        let session_id = hello.take(session_id_len)?;

        let suites_len = hello.u16()? as usize;
        let mut suites = Cursor::new(hello.take(suites_len)?);
        let mut cipher_suites = Vec::with_capacity(suites_len / 2);
        while suites.remaining() >= 2 {
            cipher_suites.push(suites.u16()?);
        }

        let compression_len = hello.u8()? as usize;
        let compression_methods = hello.take(compression_len)?;

        let mut extensions = Vec::new();
        if hello.remaining() > 0 {
            let block_len = hello.u16()? as usize;
            let mut block = Cursor::new(hello.take(block_len)?);
            while block.remaining() > 0 {
                let extension_type = block.u16()?;
                let data_len = block.u16()? as usize;
                let data = block.take(data_len)?;
                extensions.push(Extension {
                    extension_type,
                    data,
                });
            }
        }

        Ok(Self {
            version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    /// Host name from the first server_name extension.
    pub fn server_name(&self) -> Option<String> {
        let ext = self
            .extensions
            .iter()
            .find(|e| e.extension_type == EXTENSION_SERVER_NAME)?;

        let name = ext.data.get(SERVER_NAME_PREFIX_LEN..)?;
        let name = std::str::from_utf8(name).ok()?;
        if name.is_empty() {
            return None;
        }
        Some(name.to_string())
    }
}

/// Bounds-checked reader over a handshake buffer
struct Cursor {
    buf: Bytes,
}

impl Cursor {
    fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<(), HandshakeError> {
        if self.buf.remaining() < n {
            return Err(HandshakeError::malformed(format!(
                "needed {} bytes, {} left",
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, HandshakeError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, HandshakeError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u24(&mut self) -> Result<u32, HandshakeError> {
        self.need(3)?;
        Ok(self.buf.get_uint(3) as u32)
    }

    fn take(&mut self, n: usize) -> Result<Bytes, HandshakeError> {
        self.need(n)?;
        Ok(self.buf.split_to(n))
    }
}
