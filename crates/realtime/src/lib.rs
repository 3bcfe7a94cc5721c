pub mod auth;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod signaling;
pub mod storage;
pub mod ws;

use axum::{
    body::Body,
    http::{header::HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::time::Instant;
use tracing::{error, info};

use crate::error::{
    request_id_from_headers_or_generate, with_request_id_scope, ErrorCode, RealtimeError,
    REQUEST_ID_HEADER,
};

/// Assemble the full application router: health check, the WebSocket upgrade
/// endpoint, CORS, and the request-context/panic middleware stack.
pub fn build_router(state: ws::RealtimeState, cors_origins: Option<String>) -> Router {
    apply_middleware(
        Router::new()
            .route("/healthz", get(healthz))
            .merge(ws::router(state))
            .layer(cors::cors_layer(cors_origins)),
    )
}

fn apply_middleware(router: Router) -> Router {
    router
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Resolve when the process is asked to stop, so axum stops accepting
/// upgrades while already-open socket tasks drain.
pub async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c().await.expect("ctrl-c handler should install");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("sigterm handler should install")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("interrupt received; draining live sessions"),
        _ = terminate => info!("terminate received; draining live sessions"),
    }
}

// A panicking handler must not take the connection down silently; the spawn
// turns the panic into a JoinError and the client gets the standard error
// envelope.
async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            RealtimeError::new(ErrorCode::InternalError, "request handling failed")
                .into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response =
        with_request_id_scope(request_id.clone(), async move { next.run(request).await }).await;

    if let Ok(request_id_header) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, request_id_header);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use super::{apply_middleware, build_router};
    use crate::auth::session::SessionStore;
    use crate::storage::MatchConnectionStore;
    use crate::ws::RealtimeState;

    fn test_router() -> Router {
        let state = RealtimeState::new(SessionStore::in_memory(), MatchConnectionStore::in_memory());
        build_router(state, None)
    }

    #[tokio::test]
    async fn health_check_has_request_id_header() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("healthz request should build"),
            )
            .await
            .expect("healthz request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn panic_handler_returns_the_error_envelope() {
        async fn panic_route() -> &'static str {
            panic!("test panic");
        }

        let app = apply_middleware(Router::new().route("/panic", get(panic_route)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/panic")
                    .body(Body::empty())
                    .expect("panic request should build"),
            )
            .await
            .expect("panic request should return a response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("panic response body should be readable");
        let parsed: serde_json::Value =
            serde_json::from_slice(&body).expect("panic response should be the json envelope");
        assert_eq!(parsed["error"]["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn websocket_route_rejects_plain_get() {
        // Without upgrade headers the /ws route must not succeed.
        let response = test_router()
            .oneshot(
                Request::builder().uri("/ws").body(Body::empty()).expect("request should build"),
            )
            .await
            .expect("request should return a response");

        assert_ne!(response.status(), StatusCode::OK);
    }
}
