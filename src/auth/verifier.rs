//! Bearer token verification (HS256 signature, expiry and audience checks)
//!
//! # Verification flow
//!
//! 1. Decode the JWT and verify its HS256 signature against the shared secret.
//!    Tokens naming any other algorithm are rejected before key use.
//! 2. Check `exp` against the supplied clock reading (plus configured leeway).
//! 3. Check that `aud` (string or array form) contains the expected audience.
//! 4. Check `iss` when an expected issuer is configured.
//! 5. Return an [`AuthenticatedUser`] carrying the `sub` claim.
//!
//! Expiry and audience are checked here rather than inside `jsonwebtoken` so
//! that [`TokenVerifier::verify_at`] depends only on its inputs and an explicit
//! `now`. Nothing is cached between calls.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, errors::ErrorKind};
use serde::Deserialize;

use crate::config::Config;
use crate::{Error, Result};

/// Reasons a bearer token is rejected.
///
/// Every variant surfaces to HTTP clients as `401 Unauthorized`; the variants
/// exist so callers and audit logs can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No `Authorization` header on the request.
    #[error("missing authorization header")]
    Missing,

    /// The header is not of the form `<scheme> <token>`.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// The scheme is something other than `Bearer`.
    #[error("unsupported authentication scheme")]
    InvalidScheme,

    /// The token could not be decoded (structure, encoding, claims, algorithm).
    #[error("malformed token")]
    Malformed,

    /// The signature does not verify against the shared secret.
    #[error("signature mismatch")]
    BadSignature,

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `aud` does not contain the expected audience.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// `iss` does not equal the configured issuer.
    #[error("issuer mismatch")]
    IssuerMismatch,

    /// `sub` is absent or empty.
    #[error("token has no subject")]
    MissingSubject,
}

impl TokenError {
    /// Short machine-readable reason, used in audit events.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::MalformedHeader => "malformed_header",
            Self::InvalidScheme => "invalid_scheme",
            Self::Malformed => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::MissingSubject => "missing_subject",
        }
    }

    /// Message returned to the client in the `detail` field.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Missing => "Missing authorization header",
            Self::MalformedHeader => "Invalid authorization header format",
            Self::InvalidScheme => "Invalid authentication scheme",
            Self::Expired => "Token has expired",
            Self::MissingSubject => "Invalid token payload",
            Self::Malformed | Self::BadSignature | Self::AudienceMismatch | Self::IssuerMismatch => {
                "Invalid token"
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            _ => Self::Malformed,
        }
    }
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// `sub` claim (opaque user ID from the identity provider).
    pub user_id: String,
    /// `email` claim, when present.
    pub email: Option<String>,
    /// `role` claim, when present.
    pub role: Option<String>,
    /// `exp` claim (Unix seconds).
    pub expires_at: u64,
}

/// Raw claims decoded from the token payload.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    /// Audience (may be a single string or an array)
    #[serde(default)]
    aud: serde_json::Value,
    exp: u64,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Stateless HS256 token verifier.
///
/// Built once at startup from [`Config`] and shared read-only between
/// requests.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    audience: String,
    issuer: Option<String>,
    leeway: u64,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the secret or audience is empty.
    pub fn from_config(config: &Config) -> Result<Self> {
        let secret = config
            .auth
            .resolve_jwt_secret()
            .ok_or_else(|| Error::Config("auth.jwt_secret is required".to_string()))?;
        let issuer = config.expected_issuer();
        Self::new(
            secret.as_bytes(),
            &config.auth.audience,
            issuer.as_deref(),
            config.auth.leeway_secs,
        )
    }

    /// Create a verifier from raw parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `secret` or `audience` is empty.
    pub fn new(secret: &[u8], audience: &str, issuer: Option<&str>, leeway: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("JWT secret must not be empty".to_string()));
        }
        if audience.is_empty() {
            return Err(Error::Config("expected audience must not be empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Checked manually against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Ok(Self {
            key: DecodingKey::from_secret(secret),
            validation,
            audience: audience.to_string(),
            issuer: issuer.filter(|i| !i.is_empty()).map(str::to_string),
            leeway,
        })
    }

    /// Expected audience value.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify a token against the system clock.
    pub fn verify(&self, token: &str) -> std::result::Result<AuthenticatedUser, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as of `now` (Unix seconds).
    ///
    /// Pure function of the token, the verifier's configuration and `now`.
    pub fn verify_at(
        &self,
        token: &str,
        now: u64,
    ) -> std::result::Result<AuthenticatedUser, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data: TokenData<Claims> = jsonwebtoken::decode(token, &self.key, &self.validation)?;
        let claims = data.claims;

        if now > claims.exp.saturating_add(self.leeway) {
            return Err(TokenError::Expired);
        }

        if !audience_matches(&claims.aud, &self.audience) {
            return Err(TokenError::AudienceMismatch);
        }

        if let Some(expected) = &self.issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                return Err(TokenError::IssuerMismatch);
            }
        }

        let user_id = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)?;

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        })
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Whether the `aud` claim (string or array) contains `expected`.
fn audience_matches(aud_claim: &serde_json::Value, expected: &str) -> bool {
    match aud_claim {
        serde_json::Value::String(s) => s == expected,
        serde_json::Value::Array(arr) => arr.iter().any(|v| v.as_str() == Some(expected)),
        _ => false,
    }
}
