//! Gateway chat client

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ClientError, ClientResult, SessionCache};
use crate::gateway::{ChatRequest, ChatResponse};

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Calls the gateway with the bearer token held in a [`SessionCache`].
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionCache>,
}

impl ChatClient {
    /// Create a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, session: Arc<SessionCache>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// The session cache this client reads from
    #[must_use]
    pub fn session(&self) -> &Arc<SessionCache> {
        &self.session
    }

    /// `GET /health`
    ///
    /// # Errors
    ///
    /// [`ClientError::Status`] if the gateway is not healthy.
    pub async fn health(&self) -> ClientResult<Value> {
        let response = self.http.get(format!("{}/health", self.base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// `POST /chat` with the cached session's token.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotSignedIn`] without a usable session (no request is sent)
    /// - [`ClientError::Unauthorized`] if the gateway rejects the token; the
    ///   session is cleared
    /// - [`ClientError::RateLimited`] on HTTP 429
    /// - [`ClientError::Status`] for any other failure
    pub async fn chat(&self, message: &str) -> ClientResult<String> {
        let token = self.session.access_token().ok_or(ClientError::NotSignedIn)?;

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .bearer_auth(token)
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "Gateway responded");

        match status {
            StatusCode::OK => {
                let body: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
                Ok(body.reply)
            }
            StatusCode::UNAUTHORIZED => {
                let detail = detail_of(response).await;
                warn!(%detail, "Gateway rejected session, signing out");
                self.session.clear();
                Err(ClientError::Unauthorized(detail))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::RateLimited(detail_of(response).await)),
            _ => Err(status_error(status, response).await),
        }
    }
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> ClientError {
    ClientError::Status {
        status: status.as_u16(),
        detail: detail_of(response).await,
    }
}

/// `detail` of a gateway error body, falling back to the raw text.
async fn detail_of(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text).map_or(text, |b| b.detail)
}
