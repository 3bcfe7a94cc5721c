// Periodic liveness sweep over the connection registry.
//
// Half-closed sockets (network partition, client crash without a close
// frame) would otherwise accumulate in the registry forever. Every sweep
// pings each live session and evicts any that has gone silent past the
// stale threshold — eviction is fatal and not retried.

use std::time::Duration;

use tracing::warn;

use super::registry::{ConnectionRegistry, SocketCommand};

pub(crate) const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub(crate) const STALE_THRESHOLD_SECS: u64 = 40;

pub struct HeartbeatMonitor {
    registry: ConnectionRegistry,
}

impl HeartbeatMonitor {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Run sweeps forever at the heartbeat interval. Spawned once at server
    /// start.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        interval.reset(); // skip immediate first tick
        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// One pass over the registry: evict stale sessions, ping the rest.
    pub async fn sweep(&self) {
        let stale_after = Duration::from_secs(STALE_THRESHOLD_SECS);

        for session in self.registry.snapshot().await {
            if session.last_ack.elapsed() > stale_after {
                warn!(
                    session_id = %session.session_id,
                    user_id = session.user_id.as_deref().unwrap_or("<anonymous>"),
                    "liveness window missed; evicting session"
                );
                // Best-effort close: the socket task may already be gone.
                let _ = session.outbound.send(SocketCommand::Close);
                self.registry.remove(session.session_id).await;
            } else {
                let _ = session.outbound.send(SocketCommand::Ping);
            }
        }
    }
}
