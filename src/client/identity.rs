//! Password sign-in and sign-up against a GoTrue-compatible identity provider

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{ClientError, ClientResult, Session};
use crate::config::IdentityConfig;
use crate::{Error, Result};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Token grant as returned by `/token` and by `/signup` when no
/// confirmation is required.
#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<u64>,
    user: ProviderUser,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The provider issued a session straight away
    SignedIn(Session),
    /// The account was created but must be confirmed (e.g. by email) before
    /// sign-in succeeds
    ConfirmationRequired {
        /// Provider user ID
        user_id: String,
    },
}

/// Identity provider client.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    public_key: String,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    /// Create a client for `base_url`, authenticating with `public_key`.
    #[must_use]
    pub fn new(base_url: &str, public_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: public_key.into(),
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL or public key is missing.
    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        let url = config
            .base_url()
            .ok_or_else(|| Error::Config("identity.url is required".to_string()))?;
        url::Url::parse(url).map_err(|e| Error::Config(format!("Invalid identity.url: {e}")))?;
        let key = config
            .resolve_public_key()
            .ok_or_else(|| Error::Config("identity.public_key is required".to_string()))?;
        Ok(Self::new(url, key))
    }

    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] for bad credentials,
    /// [`ClientError::RateLimited`] on HTTP 429.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ClientResult<Session> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.public_key)
            .bearer_auth(&self.public_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = read_success(response).await?;
        let grant: TokenGrant = serde_json::from_value(body)
            .map_err(|e| ClientError::InvalidResponse(format!("token grant: {e}")))?;

        info!(user_id = %grant.user.id, "Signed in");
        Ok(grant.into_session())
    }

    /// Register a new account.
    ///
    /// Whatever the provider decides about duplicate or unconfirmed accounts
    /// is passed through unchanged: an error status becomes
    /// [`ClientError::Rejected`], a bare user object becomes
    /// [`SignUpOutcome::ConfirmationRequired`].
    ///
    /// # Errors
    ///
    /// See [`IdentityClient::sign_in_with_password`].
    pub async fn sign_up(&self, email: &str, password: &str) -> ClientResult<SignUpOutcome> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.public_key)
            .bearer_auth(&self.public_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = read_success(response).await?;

        if body.get("access_token").is_some() {
            let grant: TokenGrant = serde_json::from_value(body)
                .map_err(|e| ClientError::InvalidResponse(format!("token grant: {e}")))?;
            info!(user_id = %grant.user.id, "Signed up and signed in");
            return Ok(SignUpOutcome::SignedIn(grant.into_session()));
        }

        // Without a session the provider returns the user object itself,
        // sometimes nested under `user`.
        let user = body.get("user").cloned().unwrap_or(body);
        let user: ProviderUser = serde_json::from_value(user)
            .map_err(|e| ClientError::InvalidResponse(format!("signup user: {e}")))?;
        info!(user_id = %user.id, "Signed up, confirmation required");
        Ok(SignUpOutcome::ConfirmationRequired { user_id: user.id })
    }
}

impl TokenGrant {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email,
            expires_at: self.expires_at,
        }
    }
}

/// Return the JSON body of a 2xx response, or map the failure.
async fn read_success(response: reqwest::Response) -> ClientResult<Value> {
    let status = response.status();
    let text = response.text().await?;
    debug!(%status, "Identity provider responded");

    if status.is_success() {
        return serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()));
    }

    let message = provider_message(&text);
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ClientError::RateLimited(message));
    }
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of a provider error body.
fn provider_message(text: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return text.trim().to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map_or_else(|| text.trim().to_string(), ToString::to_string)
}
