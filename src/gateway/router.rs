//! HTTP router and handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    handler::Handler,
    http::HeaderValue,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use super::auth::auth_middleware;
use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::completion::CompletionBackend;
use crate::config::CorsConfig;
use crate::{Error, Result};

/// Value of `service` in the health response
pub const SERVICE_NAME: &str = "authentication-api";

/// Shared application state.
///
/// Read-only after construction; cloned into every request as an `Arc`.
pub struct AppState {
    /// Bearer token verifier
    pub verifier: Arc<TokenVerifier>,
    /// Completion API the chat endpoint forwards to
    pub completion: Arc<dyn CompletionBackend>,
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message forwarded to the completion API
    pub message: String,
}

/// Successful response of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion text
    pub reply: String,
}

/// Create the router
pub fn create_router(state: Arc<AppState>, cors: CorsLayer, max_body_size: usize) -> Router {
    let verifier = Arc::clone(&state.verifier);

    // Layered on the POST handler only, so other methods still get 405
    let chat = chat_handler.layer(middleware::from_fn_with_state(verifier, auth_middleware));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Build the CORS layer from configuration.
///
/// Credentials are allowed, so origins must be listed explicitly and request
/// methods/headers are mirrored rather than wildcarded.
///
/// # Errors
///
/// Returns [`Error::Config`] for a wildcard or unparsable origin.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                return Err(Error::Config(
                    "cors.allowed_origins cannot contain '*' when credentials are allowed"
                        .to_string(),
                ));
            }
            HeaderValue::from_str(origin)
                .map_err(|_| Error::Config(format!("Invalid CORS origin: {origin}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// GET / - service banner
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Authentication API is running",
        "endpoints": {
            "chat": "POST /chat"
        }
    }))
}

/// GET /health - liveness only; never touches downstream services
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME
    }))
}

/// POST /chat - forward an authenticated user's message to the completion API
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected chat body");
        Error::BadInput(
            "Request body must be a JSON object with a string 'message' field".to_string(),
        )
    })?;

    if request.message.trim().is_empty() {
        return Err(Error::BadInput("Message cannot be empty".to_string()));
    }

    let started = Instant::now();
    let reply = state.completion.complete(&request.message).await?;

    info!(
        user_id = %user.user_id,
        prompt_chars = request.message.chars().count(),
        reply_chars = reply.chars().count(),
        elapsed_ms = started.elapsed().as_millis(),
        "Chat completed"
    );

    Ok(Json(ChatResponse { reply }))
}
