// CORS middleware configuration for the realtime server.
//
// Takes the allowed-origin list from configuration (comma-separated) and
// falls back to permissive localhost defaults in development.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Default origins allowed when `SQUADLINK_CORS_ORIGINS` is unset.
const DEFAULT_DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Build a [`CorsLayer`] from the configured origin list.
///
/// - `"*"` allows any origin (and drops credentials, which browsers require).
/// - A comma-separated list allows exactly those origins.
/// - `None` allows the default development origins.
pub fn cors_layer(origins: Option<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    match origins.as_deref() {
        Some("*") => base.allow_origin(AllowOrigin::any()).allow_credentials(false),
        Some(origins) => base.allow_origin(parse_origins(origins)),
        None => base.allow_origin(parse_origins(&DEFAULT_DEV_ORIGINS.join(","))),
    }
}

fn parse_origins(comma_separated: &str) -> Vec<HeaderValue> {
    comma_separated
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, response::IntoResponse, routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> impl IntoResponse {
        "ok"
    }

    fn test_app(origins: Option<String>) -> Router {
        Router::new().route("/test", get(ok_handler)).layer(cors_layer(origins))
    }

    #[tokio::test]
    async fn preflight_returns_cors_headers_for_allowed_origin() {
        let app = test_app(None); // default dev origins

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/test")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .expect("preflight request should build"),
            )
            .await
            .expect("preflight request should succeed");

        let allow_origin = response
            .headers()
            .get("access-control-allow-origin")
            .expect("allowed origin should be echoed");
        assert_eq!(allow_origin, "http://localhost:3000");
    }

    #[tokio::test]
    async fn preflight_omits_cors_headers_for_unknown_origin() {
        let app = test_app(Some("https://app.squadlink.gg".to_string()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/test")
                    .header("origin", "https://evil.example")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .expect("preflight request should build"),
            )
            .await
            .expect("preflight request should succeed");

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn wildcard_allows_any_origin_without_credentials() {
        let app = test_app(Some("*".to_string()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/test")
                    .header("origin", "https://anything.example")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        let allow_origin = response
            .headers()
            .get("access-control-allow-origin")
            .expect("wildcard should be present");
        assert_eq!(allow_origin, "*");
        assert!(response.headers().get("access-control-allow-credentials").is_none());
    }
}
