//! Identity provider interface and the records it exchanges.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

/// Capacity of provider change channels.
pub const CHANGE_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// Records
// ============================================================================

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    /// Metadata written at sign-up by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_user_meta_data: Option<Map<String, Value>>,
}

impl User {
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(Value::as_str)
    }

    /// Username recorded only in the legacy metadata location.
    pub fn legacy_username(&self) -> Option<&str> {
        self.raw_user_meta_data
            .as_ref()?
            .get("username")?
            .as_str()
    }
}

/// Access token plus the user it was issued for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp in seconds when the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl AuthSession {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Kind of auth change pushed by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A change notification: the event and the session after it.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<AuthSession>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by identity providers and the auth context.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("no signed-in user")]
    NotSignedIn,

    #[error("auth context is already initialized")]
    AlreadyInitialized,

    #[error("credentials file {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid identity data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("identity provider is not configured: missing {0}")]
    NotConfigured(&'static str),
}

// ============================================================================
// Provider Trait
// ============================================================================

/// The external service that issues and tracks auth sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError>;

    /// Receive a notification for every sign-in, sign-out, refresh or user update.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    /// Merge `data` into the signed-in user's metadata.
    async fn update_user_metadata(&self, data: Map<String, Value>)
    -> Result<User, IdentityError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

// ============================================================================
// StaticIdentity
// ============================================================================

/// Provider backed by a fixed, in-memory session.
///
/// Used for programmatic callers that already hold a token.
pub struct StaticIdentity {
    session: RwLock<Option<AuthSession>>,
    changes: broadcast::Sender<AuthChange>,
}

impl StaticIdentity {
    pub fn new(session: Option<AuthSession>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            session: RwLock::new(session),
            changes,
        }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    /// A session carrying only a bearer token, with no expiry.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(Some(AuthSession {
            access_token: token.into(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: String::new(),
                email: None,
                user_metadata: Map::new(),
                raw_user_meta_data: None,
            },
        }))
    }

    /// Replace the session and notify subscribers.
    pub async fn set_session(&self, session: Option<AuthSession>) {
        let event = if session.is_some() {
            AuthEvent::SignedIn
        } else {
            AuthEvent::SignedOut
        };
        *self.session.write().await = session.clone();
        let _ = self.changes.send(AuthChange { event, session });
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn update_user_metadata(
        &self,
        data: Map<String, Value>,
    ) -> Result<User, IdentityError> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(IdentityError::NotSignedIn)?;
        session.user.user_metadata.extend(data);
        let user = session.user.clone();
        let _ = self.changes.send(AuthChange {
            event: AuthEvent::UserUpdated,
            session: Some(session.clone()),
        });
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.set_session(None).await;
        Ok(())
    }
}
