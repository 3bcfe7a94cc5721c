// Realtime server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. Individual modules (DB pool, CORS) may still read their own
// env vars — this module covers the core server settings.

use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DB_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Core realtime server configuration.
///
/// Constructed via [`RealtimeConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// PostgreSQL connection string shared with the HTTP app (sessions and
    /// match connections live there). Unset means in-memory stores.
    pub database_url: Option<String>,
    /// Pool sizing for the shared database, when one is configured.
    pub db: DbSettings,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `squadlink_realtime=debug`).
    pub log_filter: String,
}

/// Connection-pool sizing. The realtime server holds far fewer connections
/// than the HTTP app: it only reads sessions and match connections.
#[derive(Debug, Clone)]
pub struct DbSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl RealtimeConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SQUADLINK_HOST` | `0.0.0.0` |
    /// | `SQUADLINK_PORT` | `8080` |
    /// | `SQUADLINK_DATABASE_URL` | *(none — in-memory stores)* |
    /// | `SQUADLINK_DB_MIN_CONNECTIONS` | `2` |
    /// | `SQUADLINK_DB_MAX_CONNECTIONS` | `20` |
    /// | `SQUADLINK_DB_ACQUIRE_TIMEOUT_SECS` | `10` |
    /// | `SQUADLINK_CORS_ORIGINS` | *(none — cors.rs uses dev defaults)* |
    /// | `SQUADLINK_LOG_FILTER` | `info` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("SQUADLINK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("SQUADLINK_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let defaults = DbSettings::default();
        let db = DbSettings {
            min_connections: parse_or(&env, "SQUADLINK_DB_MIN_CONNECTIONS", defaults.min_connections),
            max_connections: parse_or(&env, "SQUADLINK_DB_MAX_CONNECTIONS", defaults.max_connections),
            acquire_timeout: Duration::from_secs(parse_or(
                &env,
                "SQUADLINK_DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )),
        };

        let database_url = env("SQUADLINK_DATABASE_URL").ok();
        let cors_origins = env("SQUADLINK_CORS_ORIGINS").ok();
        let log_filter = env("SQUADLINK_LOG_FILTER").unwrap_or_else(|_| "info".into());

        Self { listen_addr, database_url, db, cors_origins, log_filter }
    }
}

fn parse_or<F, T>(env: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
{
    env(key).ok().and_then(|value| value.parse().ok()).unwrap_or(default)
}
