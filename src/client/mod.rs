//! Client library for the gateway
//!
//! Signs a user in with the identity provider, caches the resulting session
//! locally, and calls `POST /chat` with the cached bearer token.

mod chat;
mod identity;
mod session;

use thiserror::Error;

pub use chat::ChatClient;
pub use identity::{IdentityClient, SignUpOutcome};
pub use session::{Session, SessionCache};

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable session is cached
    #[error("not signed in")]
    NotSignedIn,

    /// The gateway rejected the cached token; the session has been cleared
    #[error("session rejected by gateway: {0}")]
    Unauthorized(String),

    /// The identity provider refused the request (bad credentials, weak
    /// password, already registered, ...)
    #[error("identity provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Rate limited by the provider or the gateway
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success response
    #[error("request failed ({status}): {detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `detail` from the response body, or the raw body
        detail: String,
    },

    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Client result type
pub type ClientResult<T> = std::result::Result<T, ClientError>;
