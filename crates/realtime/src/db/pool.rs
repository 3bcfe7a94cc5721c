// Shared PostgreSQL pool for the session and match-connection stores.
//
// The database is the HTTP app's; the realtime server is a second, read-only
// client of it. Connections must be TLS: the URL is refused up front when its
// sslmode would allow plaintext, instead of leaving that to server policy.

use anyhow::{bail, Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;

use crate::config::DbSettings;

/// Open the pool and verify it with one round trip before serving traffic,
/// so a bad URL or unreachable database fails at startup rather than on the
/// first websocket handshake.
pub async fn connect(database_url: &str, settings: &DbSettings) -> Result<PgPool> {
    let options: PgConnectOptions =
        database_url.parse().context("invalid SQUADLINK_DATABASE_URL")?;

    if !tls_enforced(options.get_ssl_mode()) {
        bail!(
            "database connections must use TLS; \
             set sslmode=require (or stricter) in SQUADLINK_DATABASE_URL"
        );
    }

    let pool = PgPoolOptions::new()
        .min_connections(settings.min_connections)
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
        .context("could not open database pool")?;

    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("database pool failed its first round trip")?;

    Ok(pool)
}

fn tls_enforced(mode: PgSslMode) -> bool {
    matches!(mode, PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull)
}
