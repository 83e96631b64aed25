use crate::metrics::{Metrics, Timer};
use crate::registry::ConnectionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const BRIDGE_BUFFER_SIZE: usize = 16 * 1024;

/// Copy `source` into `destination` until EOF, an error, or `closer` fires.
///
/// Returns the number of bytes delivered. EOF and error are not
/// distinguished; both simply end the direction. The destination's write side
/// is shut down before returning and both halves are dropped, releasing the
/// sockets.
pub async fn bridge<R, W>(mut destination: W, mut source: R, closer: CancellationToken) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BRIDGE_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let step = async {
            let n = source.read(&mut buf).await?;
            if n > 0 {
                destination.write_all(&buf[..n]).await?;
            }
            Ok::<usize, std::io::Error>(n)
        };

        let n = tokio::select! {
            _ = closer.cancelled() => {
                debug!("Bridge closed after {} bytes", copied);
                break;
            }
            result = step => match result {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("Bridge ended with error after {} bytes: {}", copied, e);
                    break;
                }
            },
        };
        copied += n as u64;
    }

    let _ = destination.shutdown().await;
    copied
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Bytes sent to the backend, replayed prefix included
    pub bytes_upstream: u64,
    pub bytes_downstream: u64,
    pub duration: Duration,
}

/// One side of a session: the peer address and its split socket halves
pub struct Endpoint<R, W> {
    pub peer: SocketAddr,
    pub reader: R,
    pub writer: W,
}

impl<R, W> Endpoint<R, W> {
    pub fn new(peer: SocketAddr, reader: R, writer: W) -> Self {
        Self {
            peer,
            reader,
            writer,
        }
    }
}

/// Runs one downstream/upstream pair from registration to teardown
pub struct Session {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<Metrics>,
    grace: Duration,
}

impl Session {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<Metrics>, grace: Duration) -> Self {
        Self {
            registry,
            metrics,
            grace,
        }
    }

    /// Bridge both directions until the first one finishes, then close both.
    ///
    /// `replayed` is the size of the prefix already written to the backend.
    /// The second direction gets `grace` to notice the close before it is
    /// aborted.
    pub async fn run<CR, CW, UR, UW>(
        self,
        downstream: Endpoint<CR, CW>,
        upstream: Endpoint<UR, UW>,
        replayed: u64,
    ) -> SessionStats
    where
        CR: AsyncRead + Unpin + Send + 'static,
        CW: AsyncWrite + Unpin + Send + 'static,
        UR: AsyncRead + Unpin + Send + 'static,
        UW: AsyncWrite + Unpin + Send + 'static,
    {
        let guard = self.registry.register(downstream.peer, upstream.peer);
        self.metrics.record_session_start();
        let timer = Timer::start();

        let mut to_upstream = tokio::spawn(bridge(
            upstream.writer,
            downstream.reader,
            guard.closer().clone(),
        ));
        let mut to_downstream = tokio::spawn(bridge(
            downstream.writer,
            upstream.reader,
            guard.closer().clone(),
        ));

        let mut bytes_upstream = 0;
        let mut bytes_downstream = 0;
        let upstream_finished_first = tokio::select! {
            result = &mut to_upstream => {
                bytes_upstream = result.unwrap_or(0);
                true
            }
            result = &mut to_downstream => {
                bytes_downstream = result.unwrap_or(0);
                false
            }
        };

        guard.close();

        let remaining = if upstream_finished_first {
            &mut to_downstream
        } else {
            &mut to_upstream
        };
        let rest = drain(remaining, self.grace, guard.id()).await;
        if upstream_finished_first {
            bytes_downstream = rest;
        } else {
            bytes_upstream = rest;
        }

        let session_id = guard.id();
        drop(guard);

        let stats = SessionStats {
            bytes_upstream: bytes_upstream + replayed,
            bytes_downstream,
            duration: timer.elapsed(),
        };
        self.metrics
            .record_session_end(stats.bytes_upstream, stats.bytes_downstream, stats.duration);
        debug!(
            "Session {} ended: {} bytes up, {} bytes down, {:?}",
            session_id, stats.bytes_upstream, stats.bytes_downstream, stats.duration
        );
        stats
    }
}

async fn drain(handle: &mut JoinHandle<u64>, grace: Duration, session_id: u64) -> u64 {
    match tokio::time::timeout(grace, &mut *handle).await {
        Ok(result) => result.unwrap_or(0),
        Err(_) => {
            warn!(
                "Session {}: bridge direction still running after {:?}, aborting",
                session_id, grace
            );
            handle.abort();
            0
        }
    }
}
