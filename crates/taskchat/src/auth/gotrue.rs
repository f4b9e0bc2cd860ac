//! GoTrue-compatible identity provider.
//!
//! Speaks the `/auth/v1` protocol: password grant, refresh grant, user
//! update and logout. The signed-in session is persisted to a
//! [`CredentialsFile`] so separate CLI invocations share it.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use super::credentials::CredentialsFile;
use super::provider::{
    AuthChange, AuthEvent, AuthSession, CHANGE_CHANNEL_CAPACITY, IdentityError, IdentityProvider,
    User,
};
use crate::config::AuthConfig;

/// Token lifetime assumed when the server omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self.expires_at.unwrap_or_else(|| {
            chrono::Utc::now().timestamp() + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)
        });
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Some(expires_at),
            user: self.user,
        }
    }
}

/// Identity provider talking to a GoTrue server.
pub struct GoTrueProvider {
    http: Client,
    url: String,
    anon_key: Option<String>,
    credentials: CredentialsFile,
    current: RwLock<Option<AuthSession>>,
    changes: broadcast::Sender<AuthChange>,
}

impl GoTrueProvider {
    pub fn new(url: &str, anon_key: Option<String>, credentials: CredentialsFile) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            http: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            credentials,
            current: RwLock::new(None),
            changes,
        }
    }

    /// Build a provider from the `auth` config section.
    pub fn from_config(config: &AuthConfig) -> Result<Self, IdentityError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(IdentityError::NotConfigured("auth.url"))?;
        Ok(Self::new(
            url,
            config.anon_key.clone().filter(|k| !k.is_empty()),
            CredentialsFile::new(config.credentials_path()),
        ))
    }

    /// Sign in with email and password, storing the new session.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError> {
        let response = self
            .keyed(self.http.post(self.endpoint("/token")))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session = token_session(response).await?;
        self.set_current(Some(session.clone()), AuthEvent::SignedIn)
            .await?;
        Ok(session)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, IdentityError> {
        debug!("refreshing access token");
        let response = self
            .keyed(self.http.post(self.endpoint("/token")))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        token_session(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn keyed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.anon_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    /// Replace the in-memory session, persist it, and notify subscribers.
    async fn set_current(
        &self,
        session: Option<AuthSession>,
        event: AuthEvent,
    ) -> Result<(), IdentityError> {
        *self.current.write().await = session.clone();
        let persisted = match &session {
            Some(s) => self.credentials.save(s),
            None => self.credentials.clear(),
        };
        let _ = self.changes.send(AuthChange { event, session });
        persisted
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        let cached = self.current.read().await.clone();
        let session = match cached {
            Some(session) => session,
            None => match self.credentials.load()? {
                Some(stored) => {
                    *self.current.write().await = Some(stored.clone());
                    stored
                }
                None => return Ok(None),
            },
        };

        if !session.is_expired(chrono::Utc::now().timestamp()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Ok(None);
        };
        let fresh = self.refresh(refresh_token).await?;
        self.set_current(Some(fresh.clone()), AuthEvent::TokenRefreshed)
            .await?;
        Ok(Some(fresh))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn update_user_metadata(
        &self,
        data: Map<String, Value>,
    ) -> Result<User, IdentityError> {
        let mut session = self
            .get_session()
            .await?
            .ok_or(IdentityError::NotSignedIn)?;

        let response = self
            .keyed(self.http.put(self.endpoint("/user")))
            .bearer_auth(&session.access_token)
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = check(response).await?;
        let user: User = response.json().await?;

        session.user = user.clone();
        self.set_current(Some(session), AuthEvent::UserUpdated)
            .await?;
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let session = self.current.read().await.clone();
        let session = match session {
            Some(s) => Some(s),
            None => self.credentials.load()?,
        };

        let remote = match session {
            Some(session) => {
                let result = self
                    .keyed(self.http.post(self.endpoint("/logout")))
                    .bearer_auth(&session.access_token)
                    .send()
                    .await;
                match result {
                    Ok(response) => check(response).await.map(|_| ()),
                    Err(e) => Err(IdentityError::Http(e)),
                }
            }
            None => Ok(()),
        };

        self.set_current(None, AuthEvent::SignedOut).await?;
        remote
    }
}

/// Return the response when its status is successful, else a rejection.
async fn check(response: Response) -> Result<Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    warn!(status = status.as_u16(), error = %message, "identity request rejected");
    Err(IdentityError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn token_session(response: Response) -> Result<AuthSession, IdentityError> {
    let response = check(response).await?;
    let token: TokenResponse = response.json().await?;
    Ok(token.into_session())
}
