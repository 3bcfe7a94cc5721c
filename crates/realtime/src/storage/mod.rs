// Read-only access to match connections, the one persistent entity the
// realtime core consults. The full CRUD surface lives in the HTTP app; this
// store only answers "which connections involve this user".

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use squadlink_common::types::{ConnectionStatus, MatchConnection};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub enum MatchConnectionStore {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<Uuid, MatchConnection>>>),
}

impl MatchConnectionStore {
    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Insert a connection into the memory backend (no-op on Postgres, where
    /// the HTTP app owns writes).
    pub async fn insert(&self, connection: MatchConnection) {
        if let Self::Memory(store) = self {
            store.write().await.insert(connection.id, connection);
        }
    }

    /// All connections in which `user_id` is either requester or accepter.
    pub async fn connections_for_user(&self, user_id: &str) -> Result<Vec<MatchConnection>> {
        match self {
            Self::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, request_id, requester_id, accepter_id, status, created_at
                    FROM match_connections
                    WHERE requester_id = $1
                       OR accepter_id = $1
                    "#,
                )
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("failed to query match connections for user")?;

                rows.into_iter()
                    .map(|row| {
                        let status: String = row.try_get("status")?;
                        let status: ConnectionStatus =
                            status.parse().context("invalid connection status in database")?;

                        Ok(MatchConnection {
                            id: row.try_get("id")?,
                            request_id: row.try_get("request_id")?,
                            requester_id: row.try_get("requester_id")?,
                            accepter_id: row.try_get("accepter_id")?,
                            status,
                            created_at: row.try_get("created_at")?,
                        })
                    })
                    .collect()
            }
            Self::Memory(store) => Ok(store
                .read()
                .await
                .values()
                .filter(|connection| connection.involves(user_id))
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MatchConnectionStore;
    use squadlink_common::types::{ConnectionStatus, MatchConnection};
    use uuid::Uuid;

    fn connection(requester: &str, accepter: &str, status: ConnectionStatus) -> MatchConnection {
        MatchConnection {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            requester_id: requester.to_string(),
            accepter_id: accepter.to_string(),
            status,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn returns_connections_from_either_side() {
        let store = MatchConnectionStore::in_memory();
        let as_requester = connection("u1", "u2", ConnectionStatus::Accepted);
        let as_accepter = connection("u3", "u1", ConnectionStatus::Pending);
        let unrelated = connection("u4", "u5", ConnectionStatus::Accepted);
        store.insert(as_requester.clone()).await;
        store.insert(as_accepter.clone()).await;
        store.insert(unrelated).await;

        let mut found = store
            .connections_for_user("u1")
            .await
            .expect("memory lookup should succeed");
        found.sort_by_key(|connection| connection.id);

        let mut expected = vec![as_requester, as_accepter];
        expected.sort_by_key(|connection| connection.id);
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn unknown_user_has_no_connections() {
        let store = MatchConnectionStore::in_memory();
        store.insert(connection("u1", "u2", ConnectionStatus::Accepted)).await;

        let found = store
            .connections_for_user("u9")
            .await
            .expect("memory lookup should succeed");
        assert!(found.is_empty());
    }
}
