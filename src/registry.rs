//! Registry of live bridged sessions.
//!
//! Every session registers its downstream and upstream peers together with a
//! cancellation token. Cancelling the token makes both bridge directions drop
//! their socket halves, which closes both connections. The admin flush uses
//! [`ConnectionRegistry::close_all`] to do that for every session at once.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type SessionId = u64;

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub downstream: SocketAddr,
    pub upstream: SocketAddr,
    closer: CancellationToken,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live session. The returned guard deregisters it on drop.
    pub fn register(
        self: &Arc<Self>,
        downstream: SocketAddr,
        upstream: SocketAddr,
    ) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closer = CancellationToken::new();
        self.sessions.insert(
            id,
            SessionEntry {
                downstream,
                upstream,
                closer: closer.clone(),
            },
        );
        debug!("Session {} registered: {} <-> {}", id, downstream, upstream);

        SessionGuard {
            registry: Arc::clone(self),
            id,
            closer,
        }
    }

    /// Remove a session. Returns false if it was already gone.
    pub fn deregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            debug!("Session {} deregistered", id);
        }
        removed
    }

    /// Close every registered session and clear the registry.
    ///
    /// Returns the number of sessions closed. Sessions registering while this
    /// runs are either closed or left untouched, never half-removed.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.sessions.retain(|_, entry| {
            entry.closer.cancel();
            closed += 1;
            false
        });
        closed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn downstream_peers(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|e| e.downstream).collect()
    }

    pub fn upstream_peers(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|e| e.upstream).collect()
    }
}

/// Registration handle held by a running session
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<ConnectionRegistry>,
    id: SessionId,
    closer: CancellationToken,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Token cancelled when the session must close
    pub fn closer(&self) -> &CancellationToken {
        &self.closer
    }

    /// Close this session. Closing twice is a no-op.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
