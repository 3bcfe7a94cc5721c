// Session resolution for the WebSocket handshake.
//
// The web app authenticates over HTTP with an OIDC login flow that ends in a
// session cookie. The WebSocket upgrade request carries the same cookie, so
// the handshake resolves identity straight from the raw `Cookie` header plus
// the shared session table — no live HTTP request/response pair involved.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::warn;

/// Name of the session cookie issued by the HTTP layer.
pub const SESSION_COOKIE: &str = "sid";

/// Outcome of resolving a raw cookie header. Malformed or missing input is
/// never an error — it degrades to `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Authenticated { user_id: String },
    Anonymous,
}

impl AuthResult {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated { user_id } => Some(user_id),
            Self::Anonymous => None,
        }
    }
}

/// Lookup from session id to user id, shared with the HTTP app.
///
/// The Postgres backend reads the express-session-compatible `sessions`
/// table the login flow writes to. The memory backend exists for tests.
#[derive(Clone)]
pub enum SessionStore {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<String, String>>>),
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Bind a session id to a user id in the memory backend (no-op on
    /// Postgres, where the HTTP app owns writes).
    pub async fn bind(&self, session_id: impl Into<String>, user_id: impl Into<String>) {
        if let Self::Memory(store) = self {
            store.write().await.insert(session_id.into(), user_id.into());
        }
    }

    /// Resolve a raw `Cookie` header into an authentication result.
    pub async fn resolve(&self, cookie_header: Option<&str>) -> AuthResult {
        let Some(header) = cookie_header else {
            return AuthResult::Anonymous;
        };
        let Some(session_id) = session_id_from_cookie_header(header) else {
            return AuthResult::Anonymous;
        };

        match self.user_for_session(&session_id).await {
            Ok(Some(user_id)) => AuthResult::Authenticated { user_id },
            Ok(None) => AuthResult::Anonymous,
            Err(error) => {
                warn!(error = ?error, "session lookup failed; treating connection as anonymous");
                AuthResult::Anonymous
            }
        }
    }

    async fn user_for_session(&self, session_id: &str) -> Result<Option<String>> {
        match self {
            Self::Postgres(pool) => {
                let sess = sqlx::query_scalar::<_, serde_json::Value>(
                    "SELECT sess FROM sessions WHERE sid = $1 AND expire > now()",
                )
                .bind(session_id)
                .fetch_optional(pool)
                .await
                .context("failed to query session record")?;

                Ok(sess.as_ref().and_then(user_id_from_session_record).map(ToOwned::to_owned))
            }
            Self::Memory(store) => Ok(store.read().await.get(session_id).cloned()),
        }
    }
}

/// Extract the OIDC subject from a stored session record:
/// `sess -> passport -> user -> claims -> sub`.
fn user_id_from_session_record(sess: &serde_json::Value) -> Option<&str> {
    sess.get("passport")?.get("user")?.get("claims")?.get("sub")?.as_str()
}

/// Pull the bare session id out of a raw `Cookie` header.
///
/// Pure function over the header text; it must never panic or error on
/// arbitrary input. Handles the express-session `s:<sid>.<signature>`
/// envelope in both raw and percent-encoded (`s%3A`) forms.
pub fn session_id_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| unwrap_signed_cookie(value))
}

fn unwrap_signed_cookie(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let unsigned =
        value.strip_prefix("s%3A").or_else(|| value.strip_prefix("s:")).unwrap_or(value);
    // Signature suffix (".<hmac>") is dropped; verification belongs to the
    // HTTP layer that issued the cookie. The DB lookup is the authority here.
    let session_id = unsigned.split('.').next().unwrap_or(unsigned);

    if session_id.is_empty() {
        None
    } else {
        Some(session_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{session_id_from_cookie_header, AuthResult, SessionStore};

    #[test]
    fn extracts_plain_session_cookie() {
        assert_eq!(
            session_id_from_cookie_header("sid=abc123").as_deref(),
            Some("abc123"),
        );
    }

    #[test]
    fn extracts_session_cookie_among_others() {
        assert_eq!(
            session_id_from_cookie_header("theme=dark; sid=abc123; lang=en").as_deref(),
            Some("abc123"),
        );
    }

    #[test]
    fn unwraps_express_signed_envelope() {
        assert_eq!(
            session_id_from_cookie_header("sid=s:abc123.mYs1gNaTuRe").as_deref(),
            Some("abc123"),
        );
        assert_eq!(
            session_id_from_cookie_header("sid=s%3Aabc123.mYs1gNaTuRe").as_deref(),
            Some("abc123"),
        );
    }

    #[test]
    fn malformed_headers_yield_none_without_panicking() {
        for header in ["", ";;;", "sid=", "sid=s:", "=", "sid", "a=b; ;c"] {
            assert_eq!(session_id_from_cookie_header(header), None, "header: {header:?}");
        }
    }

    #[tokio::test]
    async fn resolve_returns_authenticated_for_known_session() {
        let store = SessionStore::in_memory();
        store.bind("abc123", "u1").await;

        let result = store.resolve(Some("sid=s%3Aabc123.sig")).await;
        assert_eq!(result, AuthResult::Authenticated { user_id: "u1".to_string() });
        assert_eq!(result.user_id(), Some("u1"));
    }

    #[tokio::test]
    async fn resolve_degrades_to_anonymous() {
        let store = SessionStore::in_memory();
        store.bind("abc123", "u1").await;

        assert_eq!(store.resolve(None).await, AuthResult::Anonymous);
        assert_eq!(store.resolve(Some("garbage")).await, AuthResult::Anonymous);
        assert_eq!(store.resolve(Some("sid=unknown")).await, AuthResult::Anonymous);
    }

    #[test]
    fn extracts_subject_from_session_record() {
        let sess = serde_json::json!({
            "cookie": { "originalMaxAge": 604800000 },
            "passport": { "user": { "claims": { "sub": "u42" } } },
        });
        assert_eq!(super::user_id_from_session_record(&sess), Some("u42"));

        let without_passport = serde_json::json!({ "cookie": {} });
        assert_eq!(super::user_id_from_session_record(&without_passport), None);
    }
}
