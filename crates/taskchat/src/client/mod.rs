//! HTTP client for the taskchat backend.
//!
//! `ApiClient` performs every call against the configured base URL. Resource
//! operations live in the `chat`, `tasks` and `sessions` submodules; they all
//! go through [`ApiClient::authed`], which attaches the bearer token, checks
//! the HTTP status, then decodes the response envelope.

mod chat;
mod error;
mod sessions;
mod tasks;

pub use error::{ClientError, Result};

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::api::Envelope;
use crate::auth::AuthContext;
use crate::config::ApiConfig;

// ============================================================================
// Call Options
// ============================================================================

/// Deadline and cancellation applied to each call made by a client.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Upper bound for the whole round trip, including the body read.
    pub timeout: Option<Duration>,
    /// Aborts in-flight calls when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// ============================================================================
// Request Description
// ============================================================================

/// A single backend call: method, path, query and optional JSON body.
#[derive(Debug, Clone)]
pub struct ApiCall {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl ApiCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn query_pairs(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the taskchat backend.
///
/// Cheap to clone; clones share the connection pool and auth context.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    auth: AuthContext,
    options: CallOptions,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// Example: `ApiClient::new(&config.api, auth)`
    #[must_use]
    pub fn new(config: &ApiConfig, auth: AuthContext) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            auth,
            options: CallOptions {
                timeout: config.timeout(),
                cancel: None,
            },
        }
    }

    /// A clone of this client whose calls use the given options.
    #[must_use]
    pub fn with_options(&self, options: CallOptions) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    /// A clone of this client whose calls are aborted by `token`.
    #[must_use]
    pub fn with_cancel(&self, token: CancellationToken) -> Self {
        self.with_options(self.options.clone().with_cancel(token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Perform a call without authentication or envelope decoding.
    ///
    /// Fails with [`ClientError::Api`] on a non-success status, using the
    /// server's `error` text when the body carries one.
    pub async fn request<T: DeserializeOwned>(&self, call: ApiCall) -> Result<T> {
        let value = self.send(call, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Perform an authenticated call and decode its envelope.
    pub(crate) async fn authed<T: DeserializeOwned>(&self, call: ApiCall) -> Result<T> {
        let token = self.auth.bearer_token()?;
        let value = self.send(call, Some(token)).await?;
        Envelope::from_value(value)?.into_result()
    }

    /// Authenticated call returning the raw JSON body.
    pub(crate) async fn authed_value(&self, call: ApiCall) -> Result<Value> {
        let token = self.auth.bearer_token()?;
        self.send(call, Some(token)).await
    }

    async fn send(&self, call: ApiCall, token: Option<String>) -> Result<Value> {
        let url = self.url_for(&call)?;
        debug!(method = %call.method, path = %call.path, "api request");

        let mut builder = self
            .http
            .request(call.method.clone(), url)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = call.body {
            builder = builder.body(body);
        }

        let path = call.path;
        let result = self
            .guarded(async move {
                let response = builder.send().await?;
                let status = response.status();
                let bytes = response.bytes().await?;
                Ok::<_, ClientError>((status, bytes))
            })
            .await;

        let (status, bytes) = match result {
            Ok(parts) => parts,
            Err(e) => {
                warn!(path = %path, error = %e, "api request failed");
                return Err(e);
            }
        };

        if !status.is_success() {
            let message = error_text(&bytes)
                .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
            warn!(path = %path, status = status.as_u16(), error = %message, "api request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %path, error = %e, "api response was not json");
            ClientError::Decode(e)
        })
    }

    fn url_for(&self, call: &ApiCall) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, call.path))?;
        if !call.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(call.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Apply the deadline and cancellation token to a future.
    async fn guarded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.options.timeout;
        let timed = async move {
            match timeout {
                Some(after) => match tokio::time::timeout(after, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout { after }),
                },
                None => fut.await,
            }
        };

        match &self.options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ClientError::Cancelled),
                result = timed => result,
            },
            None => timed.await,
        }
    }
}

/// Extract a non-empty `error` string from a JSON error body.
fn error_text(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::StaticIdentity;

    fn client(base_url: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            timeout_seconds: 5,
        };
        ApiClient::new(&config, AuthContext::new(Arc::new(StaticIdentity::signed_out())))
    }

    #[test]
    fn client_new_trims_trailing_slash() {
        let client = client("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn client_new_takes_timeout_from_config() {
        let client = client("http://localhost:8080");
        assert_eq!(client.options().timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn url_appends_encoded_query_in_order() {
        let client = client("http://localhost:8080/api");
        let call = ApiCall::get("/tasks")
            .query("session_id", "s 1")
            .query("status", "open");
        let url = client.url_for(&call).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/tasks?session_id=s+1&status=open"
        );
    }

    #[test]
    fn url_without_query_has_no_question_mark() {
        let client = client("http://localhost:8080");
        let url = client.url_for(&ApiCall::get("/sessions")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/sessions");
    }

    #[test]
    fn error_text_ignores_non_json_and_empty() {
        assert_eq!(error_text(br#"{"error":"boom"}"#), Some("boom".to_string()));
        assert_eq!(error_text(br#"{"error":""}"#), None);
        assert_eq!(error_text(b"<html>"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_times_out() {
        let client = client("http://localhost:8080")
            .with_options(CallOptions::default().with_timeout(Duration::from_millis(50)));
        let result: Result<()> = client
            .guarded(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));
    }

    #[tokio::test]
    async fn guarded_honors_cancellation() {
        let token = CancellationToken::new();
        let client = client("http://localhost:8080").with_cancel(token.clone());
        token.cancel();
        let result: Result<()> = client
            .guarded(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }
}
