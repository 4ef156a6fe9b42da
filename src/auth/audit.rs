//! Audit logging for authorization decisions on protected routes.
//!
//! Every decision is emitted via `tracing` with the event serialized as JSON
//! in the `audit` field:
//!
//! | Event | When |
//! |-------|------|
//! | `auth.accepted` | A bearer token verified and the request proceeds |
//! | `auth.rejected` | The token was missing or failed verification |
//!
//! Tokens themselves are never included.

use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Serialize;

use super::{AuthenticatedUser, TokenError};

/// Structured audit event for one authorization decision.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (`"auth.accepted"` or `"auth.rejected"`).
    pub event: &'static str,
    /// Request path.
    pub path: String,
    /// Authenticated subject (accepted events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Rejection reason code (rejected events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    /// Client IP address (when forwarded by a proxy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl AuditEvent {
    /// Construct an `auth.accepted` event.
    #[must_use]
    pub fn accepted(user: &AuthenticatedUser, path: &str, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "auth.accepted",
            path: path.to_string(),
            user_id: Some(user.user_id.clone()),
            reason: None,
            client_ip,
        }
    }

    /// Construct an `auth.rejected` event.
    #[must_use]
    pub fn rejected(error: &TokenError, path: &str, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "auth.rejected",
            path: path.to_string(),
            user_id: None,
            reason: Some(error.reason()),
            client_ip,
        }
    }

    fn is_rejection(&self) -> bool {
        self.reason.is_some()
    }
}

/// Emit an audit event with structured fields.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) if event.is_rejection() => tracing::warn!(audit = %json, "auth audit"),
        Ok(ref json) => tracing::info!(audit = %json, "auth audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

/// Extract client IP from `X-Forwarded-For` or `X-Real-IP` headers.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        })
}
