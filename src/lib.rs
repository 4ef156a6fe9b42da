//! Chat Auth Gateway Library
//!
//! Authentication gateway in front of an LLM completion API.
//!
//! # Features
//!
//! - **Token Verification**: HS256 bearer tokens issued by a GoTrue-compatible
//!   identity provider (signature, expiry, audience, optional issuer)
//! - **Chat Proxy**: `POST /chat` forwards one message per request to an
//!   OpenAI-compatible completion API, mapping upstream failures to client
//!   status codes
//! - **Client Library**: password sign-in/sign-up, a local session cache and
//!   a chat client that attaches the cached token
//! - **Production Ready**: CORS, request IDs, structured audit logging,
//!   graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod gateway;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging.
///
/// `RUST_LOG` takes precedence over `level`. `format` is `json` or text.
///
/// # Errors
///
/// Returns [`Error::Config`] if `level` is not a valid filter directive or a
/// global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?,
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
