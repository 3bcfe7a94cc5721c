// WebSocket message types for the squadlink realtime protocol.
//
// Frames are JSON objects discriminated by a snake_case `type` tag; field
// names inside a frame are camelCase to match what the web client sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Client -> Server frames.
///
/// The signaling variants carry their routing fields as `Option` on purpose:
/// a frame with a missing target or connection id must parse so the server
/// can answer with a protocol-level error instead of dropping it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application-level liveness probe; answered with [`ServerMessage::Pong`].
    Ping,

    #[serde(rename_all = "camelCase")]
    WebrtcOffer {
        #[serde(default)]
        target_user_id: Option<String>,
        #[serde(default)]
        connection_id: Option<Uuid>,
        #[serde(default)]
        offer: Value,
    },

    #[serde(rename_all = "camelCase")]
    WebrtcAnswer {
        #[serde(default)]
        target_user_id: Option<String>,
        #[serde(default)]
        connection_id: Option<Uuid>,
        #[serde(default)]
        answer: Value,
    },

    #[serde(rename_all = "camelCase")]
    WebrtcIceCandidate {
        #[serde(default)]
        target_user_id: Option<String>,
        #[serde(default)]
        connection_id: Option<Uuid>,
        #[serde(default)]
        candidate: Value,
    },
}

/// Payload of a relayed signaling frame. Exactly one of `offer`, `answer`,
/// `candidate` is present, matching the frame's `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    pub connection_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Value>,
    pub from_user_id: String,
}

/// Server -> Client frames. All fire-and-forget: no acknowledgment expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per new socket immediately after the upgrade.
    Welcome { message: String },

    /// Handshake result: the session cookie resolved to a user.
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: String },

    /// Handshake result: no or invalid session cookie. The socket stays open.
    AuthFailed { message: String },

    /// Reply to an application-level [`ClientMessage::Ping`].
    Pong,

    MatchRequestCreated { data: Value, message: String },
    MatchRequestUpdated { data: Value, message: String },
    MatchRequestDeleted { data: Value, message: String },
    MatchConnectionCreated { data: Value, message: String },
    MatchConnectionUpdated { data: Value, message: String },
    NewMessage { data: Value, message: String },

    WebrtcOffer { data: SignalPayload },
    WebrtcAnswer { data: SignalPayload },
    WebrtcIceCandidate { data: SignalPayload },

    /// Per-message protocol rejection, sent only to the offending sender.
    Error { message: String },
}
