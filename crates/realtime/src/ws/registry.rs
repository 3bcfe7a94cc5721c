// The connection registry: the single piece of mutable shared state in the
// realtime core. One entry per live socket, keyed by a random per-socket
// session id (distinct from the HTTP auth session).

use squadlink_common::protocol::ws::ServerMessage;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Commands consumed by a socket's owning task. The registry and everything
/// behind it reach the transport only through this channel, so a send to a
/// closed channel is the "socket already gone" signal.
#[derive(Debug, Clone)]
pub enum SocketCommand {
    /// Serialize and send a JSON frame.
    Frame(ServerMessage),
    /// Send a transport-level ping frame.
    Ping,
    /// Send a close frame and terminate the socket task.
    Close,
}

#[derive(Debug, Clone)]
struct ConnectionSession {
    user_id: Option<String>,
    last_ack: Instant,
    outbound: mpsc::UnboundedSender<SocketCommand>,
}

/// A point-in-time copy of one registry entry, handed out by
/// [`ConnectionRegistry::snapshot`]. Holding it keeps nothing locked.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub outbound: mpsc::UnboundedSender<SocketCommand>,
    pub last_ack: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, ConnectionSession>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry for a freshly upgraded socket. The entry is visible
    /// to broadcast and heartbeat as soon as this returns.
    pub async fn register(
        &self,
        outbound: mpsc::UnboundedSender<SocketCommand>,
        user_id: Option<String>,
    ) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut guard = self.sessions.write().await;
        guard.insert(
            session_id,
            ConnectionSession { user_id: user_id.clone(), last_ack: Instant::now(), outbound },
        );
        debug!(
            session_id = %session_id,
            user_id = user_id.as_deref().unwrap_or("<anonymous>"),
            live_sessions = guard.len(),
            "session registered"
        );
        session_id
    }

    /// Record a liveness acknowledgment (transport pong) for a session.
    /// Unknown ids are ignored: the session may already have been evicted.
    pub async fn touch(&self, session_id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.last_ack = Instant::now();
        }
    }

    /// Drop a session. Idempotent: removing an unknown id is a no-op.
    pub async fn remove(&self, session_id: Uuid) {
        let mut guard = self.sessions.write().await;
        if guard.remove(&session_id).is_some() {
            debug!(
                session_id = %session_id,
                live_sessions = guard.len(),
                "session removed"
            );
        }
    }

    /// A snapshot of all current entries. Callers iterate the copy with the
    /// lock released, so removals triggered mid-iteration cannot skip or
    /// duplicate other entries.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(session_id, session)| SessionSnapshot {
                session_id: *session_id,
                user_id: session.user_id.clone(),
                outbound: session.outbound.clone(),
                last_ack: session.last_ack,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }
}
