//! HTTP surface for the decision engine.
//!
//! # Responsibilities
//! - Create the Axum router with the forward-auth handler
//! - Wire up middleware (timeout, tracing)
//! - Read the forwarded-request headers the gateway supplies
//! - Answer with the decision status and the resolved username
//!
//! Every request path maps to the same handler; the decision is made from
//! `X-Forwarded-Host` / `X-Forwarded-Method` / `X-Forwarded-Uri`, not from
//! the path this endpoint was called on (the gateway `auth_request`
//! convention).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header::HeaderValue, HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::settings::ListenerSettings;
use crate::lifecycle::shutdown_signal;
use crate::rules::DecisionCoordinator;

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_METHOD: &str = "x-forwarded-method";
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";
pub const X_AUTH_USER: &str = "x-auth-user";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<DecisionCoordinator>,
}

/// HTTP server answering forward-auth checks.
pub struct AuthServer {
    router: Router,
}

impl AuthServer {
    pub fn new(coordinator: Arc<DecisionCoordinator>, listener: &ListenerSettings) -> Self {
        let state = AppState { coordinator };
        Self {
            router: build_router(state, listener),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "decision endpoint starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("decision endpoint stopped");
        Ok(())
    }
}

fn build_router(state: AppState, listener: &ListenerSettings) -> Router {
    Router::new()
        .route("/{*path}", any(decide_handler))
        .route("/", any(decide_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            listener.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
}

/// Forward-auth handler: derive (host, method, uri) from the forwarded
/// headers and convert the decision into a plain HTTP answer.
async fn decide_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let headers = request.headers();
    let request_id = request_id(headers);

    let host = forwarded(headers, X_FORWARDED_HOST)
        .or_else(|| forwarded(headers, "host"))
        .unwrap_or_default();
    let method = forwarded(headers, X_FORWARDED_METHOD)
        .and_then(|name| Method::from_str(&name).ok())
        .unwrap_or_else(|| request.method().clone());
    let uri = forwarded(headers, X_FORWARDED_URI)
        .unwrap_or_else(|| request.uri().path().to_string());

    tracing::debug!(
        request_id = %request_id,
        host = %host,
        method = %method,
        uri = %uri,
        "forward-auth check"
    );

    let decision = state.coordinator.decide(&host, &method, &uri, headers);

    let mut response = (decision.status, decision.message).into_response();
    if let Some(username) = decision.username.as_deref() {
        if let Ok(value) = HeaderValue::from_str(username) {
            response.headers_mut().insert(X_AUTH_USER, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn forwarded(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// Echo the gateway's request ID, or mint one for correlation.
fn request_id(headers: &HeaderMap) -> String {
    forwarded(headers, "x-request-id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::{AccessSystem, Check, HostGroup, PathRules, Rule, TokenEntry};
    use crate::expr::Registry;
    use crate::rules::EngineSnapshot;
    use axum::http::StatusCode;
    use tower::util::ServiceExt;

    fn test_router() -> Router {
        let mut rules = std::collections::HashMap::new();
        rules.insert(
            "GET".to_string(),
            Rule {
                description: "x".to_string(),
                expression: "bearer('T')".to_string(),
                must_auth: false,
            },
        );
        let mut tokens = std::collections::HashMap::new();
        tokens.insert("abc".to_string(), TokenEntry::Name("T".to_string()));
        let doc = AccessSystem {
            host_groups: vec![HostGroup {
                name: "api".to_string(),
                hosts: vec!["api.test".to_string()],
                checks: vec![Check {
                    name: "main".to_string(),
                    base: "/prefix".to_string(),
                    paths: vec![PathRules {
                        path: "/x".to_string(),
                        rules,
                    }],
                }],
                ..Default::default()
            }],
            tokens,
            ..Default::default()
        };
        let snapshot = EngineSnapshot::build(&doc, None, Arc::new(Registry::standard())).unwrap();
        let state = AppState {
            coordinator: Arc::new(DecisionCoordinator::new(snapshot)),
        };
        build_router(state, &ListenerSettings::default())
    }

    fn auth_request(bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(X_FORWARDED_HOST, "api.test")
            .header(X_FORWARDED_METHOD, "GET")
            .header(X_FORWARDED_URI, "/prefix/x");
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_carries_username() {
        let response = test_router().oneshot(auth_request(Some("abc"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(X_AUTH_USER).unwrap().to_str().unwrap(),
            "T"
        );
    }

    #[tokio::test]
    async fn test_denied_request() {
        let response = test_router().oneshot(auth_request(Some("wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(X_AUTH_USER).is_none());
    }

    #[tokio::test]
    async fn test_unknown_forwarded_host_denied() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(X_FORWARDED_HOST, "unknown.test")
            .header(X_FORWARDED_METHOD, "GET")
            .header(X_FORWARDED_URI, "/prefix/x")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("no prefix muxer"));
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let mut request = auth_request(Some("abc"));
        request
            .headers_mut()
            .insert("x-request-id", "req-42".parse().unwrap());
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get("x-request-id")
                .unwrap()
                .to_str()
                .unwrap(),
            "req-42"
        );
    }
}
