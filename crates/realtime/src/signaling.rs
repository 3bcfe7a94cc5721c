// Authorization for relayed WebRTC signaling.
//
// The server never inspects SDP or ICE contents; it only decides whether the
// sender may reach the target at all. A relay is permitted exactly when both
// users are the two participants of an *accepted* match connection named by
// the frame. Every rejection is a normal protocol response to the sender,
// not a transport failure.

use serde_json::Value;
use squadlink_common::protocol::ws::{ServerMessage, SignalPayload};
use squadlink_common::types::ConnectionStatus;
use tracing::error;
use uuid::Uuid;

use crate::storage::MatchConnectionStore;

/// The three relayed message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Build the outbound frame delivered to the target's sessions.
    pub fn relayed(self, grant: &SignalGrant, payload: Value) -> ServerMessage {
        let mut data = SignalPayload {
            connection_id: grant.connection_id,
            offer: None,
            answer: None,
            candidate: None,
            from_user_id: grant.sender_user_id.clone(),
        };

        match self {
            Self::Offer => {
                data.offer = Some(payload);
                ServerMessage::WebrtcOffer { data }
            }
            Self::Answer => {
                data.answer = Some(payload);
                ServerMessage::WebrtcAnswer { data }
            }
            Self::IceCandidate => {
                data.candidate = Some(payload);
                ServerMessage::WebrtcIceCandidate { data }
            }
        }
    }
}

/// A successful authorization: who may be reached, and on which connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalGrant {
    pub connection_id: Uuid,
    pub sender_user_id: String,
    pub target_user_id: String,
}

/// Why a relay attempt was refused. Sent back to the sender as a protocol
/// `error` frame and never propagated further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingReject {
    AuthenticationRequired,
    MissingRouting,
    NotFoundOrUnauthorized,
    TargetNotParticipant,
    ConnectionNotAccepted,
}

impl SignalingReject {
    pub const fn message(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication required for signaling",
            Self::MissingRouting => "signaling requires targetUserId and connectionId",
            Self::NotFoundOrUnauthorized => "connection not found or not authorized",
            Self::TargetNotParticipant => "target user is not part of this connection",
            Self::ConnectionNotAccepted => "signaling is only allowed on accepted connections",
        }
    }
}

#[derive(Clone)]
pub struct SignalingAuthorizer {
    connections: MatchConnectionStore,
}

impl SignalingAuthorizer {
    pub fn new(connections: MatchConnectionStore) -> Self {
        Self { connections }
    }

    /// Validate one relay attempt. Checks run in fixed order: sender bound,
    /// routing fields present, connection owned by sender, target is the
    /// other participant, status accepted.
    pub async fn authorize(
        &self,
        sender_user_id: Option<&str>,
        target_user_id: Option<&str>,
        connection_id: Option<Uuid>,
    ) -> Result<SignalGrant, SignalingReject> {
        let sender = sender_user_id.ok_or(SignalingReject::AuthenticationRequired)?;

        let (target, connection_id) = match (target_user_id, connection_id) {
            (Some(target), Some(connection_id)) if !target.is_empty() => (target, connection_id),
            _ => return Err(SignalingReject::MissingRouting),
        };

        let connections =
            self.connections.connections_for_user(sender).await.map_err(|lookup_error| {
                error!(error = ?lookup_error, sender_user_id = %sender, "match connection lookup failed");
                SignalingReject::NotFoundOrUnauthorized
            })?;

        let connection = connections
            .into_iter()
            .find(|connection| connection.id == connection_id)
            .ok_or(SignalingReject::NotFoundOrUnauthorized)?;

        // The store only returns connections the sender participates in, so
        // other_participant is always Some here.
        let other = connection
            .other_participant(sender)
            .ok_or(SignalingReject::NotFoundOrUnauthorized)?;
        if other != target {
            return Err(SignalingReject::TargetNotParticipant);
        }

        if connection.status != ConnectionStatus::Accepted {
            return Err(SignalingReject::ConnectionNotAccepted);
        }

        Ok(SignalGrant {
            connection_id,
            sender_user_id: sender.to_string(),
            target_user_id: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SignalGrant, SignalKind, SignalingAuthorizer, SignalingReject};
    use crate::storage::MatchConnectionStore;
    use serde_json::json;
    use squadlink_common::protocol::ws::ServerMessage;
    use squadlink_common::types::{ConnectionStatus, MatchConnection};
    use uuid::Uuid;

    async fn store_with(status: ConnectionStatus) -> (MatchConnectionStore, Uuid) {
        let store = MatchConnectionStore::in_memory();
        let id = Uuid::new_v4();
        store
            .insert(MatchConnection {
                id,
                request_id: Uuid::new_v4(),
                requester_id: "u1".to_string(),
                accepter_id: "u2".to_string(),
                status,
                created_at: chrono::Utc::now(),
            })
            .await;
        (store, id)
    }

    #[tokio::test]
    async fn accepted_connection_grants_relay_both_ways() {
        let (store, connection_id) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        let grant = authorizer
            .authorize(Some("u1"), Some("u2"), Some(connection_id))
            .await
            .expect("requester should be granted");
        assert_eq!(
            grant,
            SignalGrant {
                connection_id,
                sender_user_id: "u1".to_string(),
                target_user_id: "u2".to_string(),
            }
        );

        authorizer
            .authorize(Some("u2"), Some("u1"), Some(connection_id))
            .await
            .expect("accepter should be granted symmetrically");
    }

    #[tokio::test]
    async fn unauthenticated_sender_is_rejected() {
        let (store, connection_id) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        let reject = authorizer
            .authorize(None, Some("u2"), Some(connection_id))
            .await
            .expect_err("anonymous sender must be rejected");
        assert_eq!(reject, SignalingReject::AuthenticationRequired);
    }

    #[tokio::test]
    async fn missing_routing_fields_are_rejected() {
        let (store, connection_id) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        assert_eq!(
            authorizer.authorize(Some("u1"), None, Some(connection_id)).await,
            Err(SignalingReject::MissingRouting),
        );
        assert_eq!(
            authorizer.authorize(Some("u1"), Some("u2"), None).await,
            Err(SignalingReject::MissingRouting),
        );
    }

    #[tokio::test]
    async fn unknown_connection_is_rejected() {
        let (store, _) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        let reject = authorizer
            .authorize(Some("u1"), Some("u2"), Some(Uuid::new_v4()))
            .await
            .expect_err("unknown connection id must be rejected");
        assert_eq!(reject, SignalingReject::NotFoundOrUnauthorized);
    }

    #[tokio::test]
    async fn non_participant_sender_cannot_use_someone_elses_connection() {
        let (store, connection_id) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        // u3 is not on the connection, so from u3's perspective it does not exist.
        let reject = authorizer
            .authorize(Some("u3"), Some("u2"), Some(connection_id))
            .await
            .expect_err("outsider must be rejected");
        assert_eq!(reject, SignalingReject::NotFoundOrUnauthorized);
    }

    #[tokio::test]
    async fn wrong_target_is_rejected() {
        let (store, connection_id) = store_with(ConnectionStatus::Accepted).await;
        let authorizer = SignalingAuthorizer::new(store);

        let reject = authorizer
            .authorize(Some("u1"), Some("u3"), Some(connection_id))
            .await
            .expect_err("target outside the pairing must be rejected");
        assert_eq!(reject, SignalingReject::TargetNotParticipant);
    }

    #[tokio::test]
    async fn pending_connection_is_rejected() {
        let (store, connection_id) = store_with(ConnectionStatus::Pending).await;
        let authorizer = SignalingAuthorizer::new(store);

        let reject = authorizer
            .authorize(Some("u1"), Some("u2"), Some(connection_id))
            .await
            .expect_err("pending connection must not allow signaling");
        assert_eq!(reject, SignalingReject::ConnectionNotAccepted);
    }

    #[test]
    fn relayed_frame_carries_sender_and_payload() {
        let grant = SignalGrant {
            connection_id: Uuid::new_v4(),
            sender_user_id: "u1".to_string(),
            target_user_id: "u2".to_string(),
        };

        let frame = SignalKind::Offer.relayed(&grant, json!({ "sdp": "v=0" }));
        match frame {
            ServerMessage::WebrtcOffer { data } => {
                assert_eq!(data.connection_id, grant.connection_id);
                assert_eq!(data.from_user_id, "u1");
                assert_eq!(data.offer, Some(json!({ "sdp": "v=0" })));
                assert!(data.answer.is_none());
                assert!(data.candidate.is_none());
            }
            other => panic!("expected webrtc_offer, got {other:?}"),
        }
    }
}
