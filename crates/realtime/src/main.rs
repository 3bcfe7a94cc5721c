use anyhow::Context;
use squadlink_realtime::auth::session::SessionStore;
use squadlink_realtime::config::RealtimeConfig;
use squadlink_realtime::db;
use squadlink_realtime::storage::MatchConnectionStore;
use squadlink_realtime::ws::heartbeat::HeartbeatMonitor;
use squadlink_realtime::ws::RealtimeState;
use squadlink_realtime::{build_router, shutdown_signal};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RealtimeConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let (sessions, connections) = match &config.database_url {
        Some(database_url) => {
            let pool = db::pool::connect(database_url, &config.db)
                .await
                .context("failed to initialize realtime PostgreSQL pool")?;
            (SessionStore::Postgres(pool.clone()), MatchConnectionStore::Postgres(pool))
        }
        None => {
            warn!("SQUADLINK_DATABASE_URL is not set; using in-memory stores");
            (SessionStore::in_memory(), MatchConnectionStore::in_memory())
        }
    };

    let state = RealtimeState::new(sessions, connections);
    tokio::spawn(HeartbeatMonitor::new(state.registry.clone()).run());

    let app = build_router(state, config.cors_origins.clone());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind realtime listener on {}", config.listen_addr))?;

    info!(listen_addr = %config.listen_addr, "starting realtime server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("realtime server exited unexpectedly")
}
