pub mod dispatch;
pub mod handler;
pub mod heartbeat;
pub mod registry;

use axum::{routing::get, Router};

use crate::auth::session::SessionStore;
use crate::signaling::SignalingAuthorizer;
use crate::storage::MatchConnectionStore;
use dispatch::BroadcastDispatcher;
use registry::ConnectionRegistry;

/// Everything the upgrade endpoint and socket tasks share. Built once at
/// server start and passed by handle — no ambient globals.
#[derive(Clone)]
pub struct RealtimeState {
    pub registry: ConnectionRegistry,
    pub dispatcher: BroadcastDispatcher,
    pub sessions: SessionStore,
    pub signaling: SignalingAuthorizer,
}

impl RealtimeState {
    pub fn new(sessions: SessionStore, connections: MatchConnectionStore) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            dispatcher: BroadcastDispatcher::new(registry.clone()),
            signaling: SignalingAuthorizer::new(connections),
            registry,
            sessions,
        }
    }
}

pub fn router(state: RealtimeState) -> Router {
    Router::new().route("/ws", get(handler::ws_upgrade)).with_state(state)
}
