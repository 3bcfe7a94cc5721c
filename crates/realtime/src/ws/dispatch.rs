// Fan-out of typed events to live sessions.
//
// Delivery is best-effort and at-most-once: a session whose socket task has
// gone away is silently skipped, and there is no replay log — a reconnecting
// client resynchronizes through a REST fetch. Each socket sees events in
// dispatch order; nothing is guaranteed across sockets or relative to
// concurrent HTTP responses.

use serde_json::Value;
use squadlink_common::protocol::ws::ServerMessage;

use super::registry::{ConnectionRegistry, SocketCommand};

#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Deliver to every session with a bound user id. Anonymous sessions
    /// are excluded — they only ever see handshake frames.
    pub async fn to_all(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;
        for session in self.registry.snapshot().await {
            if session.user_id.is_none() {
                continue;
            }
            if session.outbound.send(SocketCommand::Frame(message.clone())).is_ok() {
                sent_count += 1;
            }
        }
        sent_count
    }

    /// Deliver only to sessions bound to one of `user_ids`. A user with
    /// several devices has several sessions; all of them receive the event.
    pub async fn to_users(&self, user_ids: &[String], message: ServerMessage) -> usize {
        let mut sent_count = 0;
        for session in self.registry.snapshot().await {
            let Some(user_id) = session.user_id.as_deref() else {
                continue;
            };
            if !user_ids.iter().any(|candidate| candidate == user_id) {
                continue;
            }
            if session.outbound.send(SocketCommand::Frame(message.clone())).is_ok() {
                sent_count += 1;
            }
        }
        sent_count
    }

    // Typed entry points for the REST mutations that feed the feed. The
    // route handlers live in the HTTP app; they call these after a
    // successful storage write.

    pub async fn match_request_created(&self, data: Value) -> usize {
        self.to_all(ServerMessage::MatchRequestCreated {
            data,
            message: "a new match request is available".to_string(),
        })
        .await
    }

    pub async fn match_request_updated(&self, data: Value) -> usize {
        self.to_all(ServerMessage::MatchRequestUpdated {
            data,
            message: "a match request was updated".to_string(),
        })
        .await
    }

    pub async fn match_request_deleted(&self, data: Value) -> usize {
        self.to_all(ServerMessage::MatchRequestDeleted {
            data,
            message: "a match request was removed".to_string(),
        })
        .await
    }

    pub async fn match_connection_created(&self, participants: &[String], data: Value) -> usize {
        self.to_users(
            participants,
            ServerMessage::MatchConnectionCreated {
                data,
                message: "someone answered a match request".to_string(),
            },
        )
        .await
    }

    pub async fn match_connection_updated(&self, participants: &[String], data: Value) -> usize {
        self.to_users(
            participants,
            ServerMessage::MatchConnectionUpdated {
                data,
                message: "a match connection changed".to_string(),
            },
        )
        .await
    }

    pub async fn new_message(&self, recipients: &[String], data: Value) -> usize {
        self.to_users(
            recipients,
            ServerMessage::NewMessage { data, message: "you have a new message".to_string() },
        )
        .await
    }
}
