use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::debug;

/// Header block read off a plaintext connection.
///
/// `lines` holds the request line followed by the header lines, without
/// terminators. `raw` holds the exact bytes those lines arrived as, plus the
/// blank line that ended the block, ready to be replayed upstream.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    lines: Vec<String>,
    raw: Bytes,
    truncated: bool,
}

impl RequestHeader {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Bytes to replay to the upstream before bridging
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// A usable block has a request line and at least one header, and was
    /// not cut off while the client could still send more of it.
    pub fn is_valid(&self) -> bool {
        self.lines.len() >= 2 && !self.truncated
    }

    /// The read stopped at the size cap or on a read error, leaving part of
    /// the block unread or discarded.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn request_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// Second space-separated token of the request line
    pub fn path(&self) -> Option<&str> {
        self.request_line()?.split(' ').nth(1)
    }

    /// Value of the `Host` header, matched case-insensitively.
    ///
    /// When the header repeats, the last occurrence wins.
    pub fn host(&self) -> Option<&str> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .filter(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.trim_matches(' '))
            .last()
    }
}

/// Read header lines until the blank line that ends them.
///
/// Leading blank lines are skipped. Reading stops early on EOF, a read error
/// or once `max_bytes` have been consumed. Stopping at the cap or on an error
/// marks the block truncated: bytes the client sent are missing from `raw`,
/// so the block must not be replayed. At EOF a partial trailing line is
/// dropped and the collected lines are closed off with a blank line, since
/// nothing can follow them. The reader is left positioned right after the
/// consumed bytes.
pub async fn read_header<R>(reader: &mut R, max_bytes: usize) -> RequestHeader
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut raw = BytesMut::new();
    let mut line_buf = Vec::with_capacity(256);
    let mut consumed = 0usize;
    let mut terminated = false;
    let mut truncated = false;

    loop {
        let remaining = max_bytes.saturating_sub(consumed);
        if remaining == 0 {
            debug!("Header block reached {} bytes, stopping", max_bytes);
            truncated = true;
            break;
        }

        line_buf.clear();
        let read = (&mut *reader)
            .take(remaining as u64)
            .read_until(b'\n', &mut line_buf)
            .await;

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Header read error: {}", e);
                truncated = true;
                break;
            }
        };
        consumed += n;

        if line_buf.last() != Some(&b'\n') {
            // without a newline, either the cap cut the line or the peer hit EOF
            if n == remaining {
                debug!("Header line crosses the {} byte cap", max_bytes);
                truncated = true;
            } else {
                debug!("Discarding partial header line of {} bytes at EOF", n);
            }
            break;
        }

        let line = String::from_utf8_lossy(&line_buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();

        if line.is_empty() {
            if lines.is_empty() {
                continue;
            }
            raw.extend_from_slice(&line_buf);
            terminated = true;
            break;
        }

        raw.extend_from_slice(&line_buf);
        lines.push(line);
    }

    if !terminated && !truncated && !lines.is_empty() {
        raw.extend_from_slice(b"\r\n");
    }

    RequestHeader {
        lines,
        raw: raw.freeze(),
        truncated,
    }
}
