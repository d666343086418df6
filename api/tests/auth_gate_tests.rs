//! Integration test: the auth gate short-circuits before the wrapped handler

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::{middleware, routing::get, Extension, Router};
use modelgate_api::auth::require_bearer;
use modelgate_api::{AuthContext, AuthError, AuthGate, StaticTokenVerifier, TokenVerifier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Verifier that forbids one identity
struct ScopedVerifier;

#[async_trait::async_trait]
impl TokenVerifier for ScopedVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        match token {
            "reader" => Err(AuthError::Forbidden("read-only token".to_string())),
            "writer" => Ok("writer".to_string()),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

fn counting_app(gate: AuthGate, calls: Arc<AtomicUsize>) -> Router {
    let handler = move |context: Option<Extension<AuthContext>>| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            context
                .map(|Extension(ctx)| ctx.identity)
                .unwrap_or_else(|| "anonymous".to_string())
        }
    };

    Router::new()
        .route("/predict", get(handler.clone()))
        .route("/update-model", get(handler.clone()))
        .route("/public/info", get(handler.clone()))
        .route("/login/form", get(handler))
        .layer(middleware::from_fn_with_state(gate, require_bearer))
}

fn default_gate() -> AuthGate {
    AuthGate::new(
        Arc::new(StaticTokenVerifier::new().with_token("valid", "alice")),
        vec!["/login".to_string(), "/public".to_string()],
    )
}

fn request(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_handler_never_invoked_without_valid_token() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = counting_app(default_gate(), calls.clone());

    let cases = [
        ("/predict", None),
        ("/predict", Some("Bearer")),
        ("/predict", Some("Bearer ")),
        ("/predict", Some("Basic YWxpY2U6cHc=")),
        ("/predict", Some("Bearer wrong")),
        ("/update-model", None),
        ("/update-model", Some("valid")),
    ];

    for (uri, authorization) in cases {
        let response = app
            .clone()
            .oneshot(request(uri, authorization))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} with {:?}",
            uri,
            authorization
        );
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_public_prefixes_skip_auth() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = counting_app(default_gate(), calls.clone());

    for uri in ["/public/info", "/login/form"] {
        let response = app.clone().oneshot(request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(body_text(response).await, "anonymous");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_valid_token_carries_identity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = counting_app(default_gate(), calls.clone());

    let response = app
        .oneshot(request("/predict", Some("Bearer valid")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verifier_forbidden_maps_to_403() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = AuthGate::new(Arc::new(ScopedVerifier), vec!["/public".to_string()]);
    let app = counting_app(gate, calls.clone());

    let response = app
        .clone()
        .oneshot(request("/predict", Some("Bearer reader")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(request("/predict", Some("Bearer writer")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = AuthGate::new(
        Arc::new(
            StaticTokenVerifier::new()
                .with_token("stale", "bob")
                .revoke("stale"),
        ),
        vec![],
    );
    let app = counting_app(gate, calls.clone());

    let response = app
        .oneshot(request("/predict", Some("Bearer stale")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
