//! Authentication middleware for protected routes
//!
//! Runs before the handler's extractors, so a request without a valid bearer
//! token is rejected without its body being read.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::Error;
use crate::auth::{AuditEvent, TokenVerifier, audit, extract_bearer};

/// Verify the bearer token and inject the [`AuthenticatedUser`] into request
/// extensions for downstream handlers.
///
/// [`AuthenticatedUser`]: crate::auth::AuthenticatedUser
pub async fn auth_middleware(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let client_ip = audit::client_ip(request.headers());

    let verified = extract_bearer(request.headers()).and_then(|token| verifier.verify(token));

    match verified {
        Ok(user) => {
            audit::emit(&AuditEvent::accepted(&user, &path, client_ip));
            debug!(user_id = %user.user_id, path = %path, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            audit::emit(&AuditEvent::rejected(&e, &path, client_ip));
            Error::Unauthorized(e).into_response()
        }
    }
}
