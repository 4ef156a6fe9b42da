//! End-to-end tests for the HTTP surface
//!
//! Drives the assembled router with `tower::ServiceExt::oneshot` and a fake
//! completion backend that counts how often it is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use chat_auth_gateway::auth::unix_now;
use chat_auth_gateway::completion::{CompletionBackend, CompletionError};
use chat_auth_gateway::config::{AuthConfig, Config};
use chat_auth_gateway::gateway::Gateway;

const SECRET: &str = "test-signing-secret";

/// What the fake backend does when called
#[derive(Clone, Copy)]
enum Behaviour {
    Echo,
    RateLimited(Option<u64>),
    BadKey,
    Fail,
}

struct FakeBackend {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeBackend {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Echo => Ok(format!("You said: {prompt}")),
            Behaviour::RateLimited(retry_after) => Err(CompletionError::RateLimited { retry_after }),
            Behaviour::BadKey => Err(CompletionError::Authentication),
            Behaviour::Fail => Err(CompletionError::Api {
                status: 503,
                message: "upstream overloaded, internal id 42".to_string(),
            }),
        }
    }
}

fn router(backend: Arc<FakeBackend>) -> Router {
    let config = Config {
        auth: AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..AuthConfig::default()
        },
        ..Config::default()
    };
    Gateway::with_backend(config, backend).unwrap().router()
}

fn token(secret: &str, aud: &str, exp: u64) -> String {
    let claims = json!({
        "sub": "user-123",
        "aud": aud,
        "exp": exp,
        "email": "alice@example.com",
        "role": "authenticated"
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn valid_token() -> String {
    token(SECRET, "authenticated", unix_now() + 3600)
}

fn chat_request(auth: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_chat_without_authorization_is_401() {
    // GIVEN: a gateway with a counting backend
    let backend = FakeBackend::new(Behaviour::Echo);
    let app = router(Arc::clone(&backend));

    // WHEN: POST /chat without Authorization
    let response = app
        .oneshot(chat_request(None, r#"{"message":"hi"}"#))
        .await
        .unwrap();

    // THEN: 401 with a Bearer challenge, backend untouched
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(
        json_body(response).await,
        json!({"detail": "Missing authorization header"})
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_chat_rejects_bad_tokens() {
    let backend = FakeBackend::new(Behaviour::Echo);
    let now = unix_now();

    let cases = [
        ("Basic dXNlcjpwYXNz".to_string(), "Invalid authentication scheme"),
        ("Bearer".to_string(), "Invalid authorization header format"),
        ("Bearer not-a-jwt".to_string(), "Invalid token"),
        (
            format!("Bearer {}", token("other-secret", "authenticated", now + 3600)),
            "Invalid token",
        ),
        (
            format!("Bearer {}", token(SECRET, "authenticated", now - 10)),
            "Token has expired",
        ),
        (
            format!("Bearer {}", token(SECRET, "anon", now + 3600)),
            "Invalid token",
        ),
    ];

    for (auth, detail) in cases {
        let response = router(Arc::clone(&backend))
            .oneshot(chat_request(Some(&auth), r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "auth: {auth}");
        assert_eq!(json_body(response).await["detail"], detail, "auth: {auth}");
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_chat_success_returns_reply() {
    let backend = FakeBackend::new(Behaviour::Echo);
    let auth = format!("Bearer {}", valid_token());

    let response = router(Arc::clone(&backend))
        .oneshot(chat_request(Some(&auth), r#"{"message":"Hello there"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"reply": "You said: Hello there"})
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_scheme_is_case_insensitive() {
    let backend = FakeBackend::new(Behaviour::Echo);
    let auth = format!("bearer {}", valid_token());

    let response = router(Arc::clone(&backend))
        .oneshot(chat_request(Some(&auth), r#"{"message":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_message_is_400_without_upstream_call() {
    let backend = FakeBackend::new(Behaviour::Echo);
    let auth = format!("Bearer {}", valid_token());

    for body in [r#"{"message":""}"#, r#"{"message":"   \n\t"}"#] {
        let response = router(Arc::clone(&backend))
            .oneshot(chat_request(Some(&auth), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"detail": "Message cannot be empty"})
        );
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let backend = FakeBackend::new(Behaviour::Echo);
    let auth = format!("Bearer {}", valid_token());

    for body in ["not json", r#"{"msg":"hi"}"#, r#"{"message":42}"#, "[]"] {
        let response = router(Arc::clone(&backend))
            .oneshot(chat_request(Some(&auth), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_invalid_token_wins_over_bad_body() {
    // Authentication is checked before the body is read
    let backend = FakeBackend::new(Behaviour::Echo);

    let response = router(Arc::clone(&backend))
        .oneshot(chat_request(Some("Bearer garbage"), "not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upstream_rate_limit_is_429() {
    let backend = FakeBackend::new(Behaviour::RateLimited(Some(20)));
    let auth = format!("Bearer {}", valid_token());

    let response = router(Arc::clone(&backend))
        .oneshot(chat_request(Some(&auth), r#"{"message":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "20");
    assert_eq!(
        json_body(response).await["detail"],
        "Completion API rate limit exceeded. Please try again later."
    );
    // No retries
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_upstream_rate_limit_without_retry_after() {
    let backend = FakeBackend::new(Behaviour::RateLimited(None));
    let auth = format!("Bearer {}", valid_token());

    let response = router(backend)
        .oneshot(chat_request(Some(&auth), r#"{"message":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
}

#[tokio::test]
async fn test_upstream_failures_are_500_without_leaking_details() {
    let auth = format!("Bearer {}", valid_token());

    for (behaviour, detail) in [
        (
            Behaviour::BadKey,
            "Completion API authentication failed. Check the API key.",
        ),
        (
            Behaviour::Fail,
            "Error communicating with the completion service",
        ),
    ] {
        let backend = FakeBackend::new(behaviour);
        let response = router(Arc::clone(&backend))
            .oneshot(chat_request(Some(&auth), r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body, json!({"detail": detail}));
        assert!(!body.to_string().contains("internal id 42"));
        assert_eq!(backend.calls(), 1);
    }
}

#[tokio::test]
async fn test_health_and_root_need_no_auth() {
    let backend = FakeBackend::new(Behaviour::Fail);

    let response = router(Arc::clone(&backend))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"status": "healthy", "service": "authentication-api"})
    );

    let response = router(Arc::clone(&backend))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "message": "Authentication API is running",
            "endpoints": {"chat": "POST /chat"}
        })
    );

    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_get_chat_is_method_not_allowed() {
    // GIVEN: no credentials at all
    let backend = FakeBackend::new(Behaviour::Echo);

    // WHEN: the wrong method is used
    let response = router(Arc::clone(&backend))
        .oneshot(Request::get("/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // THEN: routing answers 405 before authentication runs
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

    let auth = format!("Bearer {}", valid_token());
    let response = router(Arc::clone(&backend))
        .oneshot(
            Request::put("/chat")
                .header(header::AUTHORIZATION, auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    // POST is still gated
    let response = router(Arc::clone(&backend))
        .oneshot(chat_request(None, r#"{"message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origin() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();

    let response = router(FakeBackend::new(Behaviour::Echo))
        .oneshot(request)
        .await
        .unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST"
    );
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let request = Request::get("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let response = router(FakeBackend::new(Behaviour::Echo))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_request_id_generated_and_propagated() {
    let app = router(FakeBackend::new(Behaviour::Echo));

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert!(!generated.is_empty());

    let response = app
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-abc-123");

    // Error responses carry it too
    let response = router(FakeBackend::new(Behaviour::Echo))
        .oneshot(chat_request(None, "{}"))
        .await
        .unwrap();
    assert!(response.headers().get("x-request-id").is_some());
}
