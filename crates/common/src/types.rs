// Core domain types shared across all Squadlink crates.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a match connection. Voice signaling is only permitted once
/// the request owner has accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid connection status '{0}'")]
pub struct InvalidConnectionStatus(pub String);

impl ConnectionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = InvalidConnectionStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(InvalidConnectionStatus(other.to_string())),
        }
    }
}

/// The pairing between a match request's owner and the user who answered it.
///
/// Owned by the persistence layer; the realtime core only ever reads these
/// to authorize signaling relays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchConnection {
    pub id: Uuid,
    pub request_id: Uuid,
    /// The user who created the match request.
    pub requester_id: String,
    /// The user who accepted (or is pending on) the request.
    pub accepter_id: String,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl MatchConnection {
    pub fn involves(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.accepter_id == user_id
    }

    /// The other participant of this connection, from `user_id`'s point of
    /// view. `None` when `user_id` is not a participant at all.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if self.requester_id == user_id {
            Some(&self.accepter_id)
        } else if self.accepter_id == user_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionStatus, MatchConnection};
    use uuid::Uuid;

    fn connection(requester: &str, accepter: &str) -> MatchConnection {
        MatchConnection {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            requester_id: requester.to_string(),
            accepter_id: accepter.to_string(),
            status: ConnectionStatus::Accepted,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn other_participant_is_symmetric() {
        let conn = connection("u1", "u2");
        assert_eq!(conn.other_participant("u1"), Some("u2"));
        assert_eq!(conn.other_participant("u2"), Some("u1"));
        assert_eq!(conn.other_participant("u3"), None);
    }

    #[test]
    fn involves_checks_both_sides() {
        let conn = connection("u1", "u2");
        assert!(conn.involves("u1"));
        assert!(conn.involves("u2"));
        assert!(!conn.involves("u3"));
    }

    #[test]
    fn status_round_trips_through_db_values() {
        for status in
            [ConnectionStatus::Pending, ConnectionStatus::Accepted, ConnectionStatus::Declined]
        {
            assert_eq!(status.as_str().parse(), Ok(status));
        }
        assert_eq!(
            "archived".parse::<ConnectionStatus>(),
            Err(super::InvalidConnectionStatus("archived".to_string())),
        );
    }

    #[test]
    fn connection_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(connection("u1", "u2"))
            .expect("connection should serialize");
        assert!(value.get("requesterId").is_some());
        assert!(value.get("accepterId").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["status"], "accepted");
    }
}
