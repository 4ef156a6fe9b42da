//! Client-local session cache

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::auth::unix_now;

/// A signed-in session as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token presented to the gateway
    pub access_token: String,
    /// Refresh token, if the provider issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Provider user ID (the token's `sub`)
    pub user_id: String,
    /// Email the user signed in with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token expiry (Unix seconds), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Session {
    /// Whether the access token is past its expiry as of `now`.
    ///
    /// Sessions without a known expiry are never considered expired locally;
    /// the gateway remains the authority.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

/// Holds at most one session. Explicit set/clear, nothing else.
#[derive(Debug, Default)]
pub struct SessionCache {
    inner: RwLock<Option<Session>>,
}

impl SessionCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached session
    pub fn set(&self, session: Session) {
        *self.inner.write() = Some(session);
    }

    /// Current session, if any
    #[must_use]
    pub fn get(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    /// Drop the cached session (logout). Returns the session that was removed.
    pub fn clear(&self) -> Option<Session> {
        self.inner.write().take()
    }

    /// Access token of a session that has not expired locally
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        let now = unix_now();
        self.inner
            .read()
            .as_ref()
            .filter(|s| !s.is_expired_at(now))
            .map(|s| s.access_token.clone())
    }

    /// Whether a usable session is cached
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.access_token().is_some()
    }
}
