//! REST client for the pull interface and ticket mutations.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::persistence::SettingsStore;

/// JSON request/response access to the backend.
///
/// Futures are `'static` so a subscription can spawn them and abort them
/// on unmount.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Authenticated `GET`.
    fn get(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>>;

    /// Unauthenticated `GET`.
    fn get_public(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>>;

    /// Authenticated `PUT` with a JSON body.
    fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value, SyncError>>;
}

/// `reqwest`-backed [`Backend`].
///
/// The bearer token is read from the settings store on every request, so a
/// login or logout takes effect without rebuilding the client.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    settings: Arc<dyn SettingsStore>,
    timeout: Option<Duration>,
}

impl RestClient {
    /// Creates a client for `base_url` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        settings: Arc<dyn SettingsStore>,
        timeout: Option<Duration>,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            settings,
            timeout,
        })
    }

    /// Absolute URL for a backend path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer_token(&self) -> Option<String> {
        match self.settings.load() {
            Ok(settings) => settings.token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read token; sending request unauthenticated");
                None
            }
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        authenticated: bool,
    ) -> BoxFuture<'static, Result<Value, SyncError>> {
        let url = self.url(path);
        let mut builder = self
            .client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json");
        if authenticated && let Some(token) = self.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let timeout = self.timeout;

        Box::pin(async move {
            let response = match timeout {
                Some(limit) => tokio::time::timeout(limit, send_json(builder))
                    .await
                    .map_err(|_| SyncError::Timeout(limit))?,
                None => send_json(builder).await,
            };
            if let Err(e) = &response {
                tracing::warn!(%url, error = %e, "backend request failed");
            }
            response
        })
    }
}

impl Backend for RestClient {
    fn get(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
        self.request(Method::GET, path, None, true)
    }

    fn get_public(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
        self.request(Method::GET, path, None, false)
    }

    fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value, SyncError>> {
        self.request(Method::PUT, path, Some(body), true)
    }
}

async fn send_json(builder: reqwest::RequestBuilder) -> Result<Value, SyncError> {
    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        });
    }
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<ErrorMessage>,
    error: Option<String>,
}

/// Extracts a human-readable message from an error response body.
fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        let message = match payload.message {
            Some(ErrorMessage::One(message)) => Some(message),
            Some(ErrorMessage::Many(messages)) if !messages.is_empty() => {
                Some(messages.join("; "))
            }
            _ => payload.error,
        };
        if let Some(message) = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed.to_string()
    }
}
