//! Authentication state shared by every API call.
//!
//! [`AuthContext`] mirrors the identity provider's session into a
//! `watch` channel. It is initialized once; afterwards a background task
//! applies every provider change notification to the observable state.

mod credentials;
mod gotrue;
mod provider;

pub use credentials::CredentialsFile;
pub use gotrue::GoTrueProvider;
pub use provider::{
    AuthChange, AuthEvent, AuthSession, CHANGE_CHANNEL_CAPACITY, IdentityError, IdentityProvider,
    StaticIdentity, User,
};

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::client::ClientError;

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

// ============================================================================
// AuthState
// ============================================================================

/// Observable auth state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<AuthSession>,
    /// True until the first session lookup completes.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }
}

impl AuthState {
    /// Settled state for the given session.
    pub fn ready(session: Option<AuthSession>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::ready(None)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }
}

// ============================================================================
// AuthContext
// ============================================================================

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<AuthState>,
    phase: AtomicU8,
}

/// Handle to the process auth state. Clones share the same state.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("phase", &self.inner.phase.load(Ordering::Acquire))
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                provider,
                state,
                phase: AtomicU8::new(UNINITIALIZED),
            }),
        }
    }

    /// Fetch the current session and start tracking provider changes.
    ///
    /// May be called once. A failed session lookup is logged and leaves the
    /// context signed out. When the user's username exists only in the legacy
    /// metadata location it is copied to the canonical one; a failure there
    /// is logged and otherwise ignored.
    pub async fn initialize(&self) -> Result<(), IdentityError> {
        self.inner
            .phase
            .compare_exchange(UNINITIALIZED, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IdentityError::AlreadyInitialized)?;

        // Subscribe before the lookup so no change between the two is lost.
        let changes = self.inner.provider.subscribe();

        let session = match self.inner.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "failed to load auth session");
                None
            }
        };
        let session = match session {
            Some(session) => Some(self.reconcile_username(session).await),
            None => None,
        };

        info!(
            signed_in = session.is_some(),
            "auth context initialized"
        );
        self.inner.state.send_replace(AuthState::ready(session));
        self.inner.phase.store(READY, Ordering::Release);

        tokio::spawn(track_changes(Arc::downgrade(&self.inner), changes));
        Ok(())
    }

    async fn reconcile_username(&self, mut session: AuthSession) -> AuthSession {
        if session.user.username().is_some() {
            return session;
        }
        let Some(legacy) = session.user.legacy_username().map(str::to_string) else {
            return session;
        };

        debug!(user_id = %session.user.id, "copying legacy username into user metadata");
        let mut data = Map::new();
        data.insert("username".to_string(), Value::String(legacy));
        match self.inner.provider.update_user_metadata(data).await {
            Ok(user) => session.user = user,
            Err(e) => warn!(user_id = %session.user.id, error = %e, "username reconciliation failed"),
        }
        session
    }

    /// End the session. Failures are logged, never returned.
    pub async fn sign_out(&self) {
        match self.inner.provider.sign_out().await {
            Ok(()) => {
                self.inner.state.send_replace(AuthState::signed_out());
            }
            Err(e) => error!(error = %e, "sign out failed"),
        }
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == READY
    }

    /// Current access token for an outgoing call.
    ///
    /// Never waits or refreshes: fails with [`ClientError::AuthNotInitialized`]
    /// before initialization completes and [`ClientError::NoAuthToken`] when
    /// there is no unexpired token.
    pub fn bearer_token(&self) -> Result<String, ClientError> {
        if !self.is_initialized() {
            return Err(ClientError::AuthNotInitialized);
        }
        let state = self.inner.state.borrow();
        let Some(session) = state.session.as_ref() else {
            return Err(ClientError::NoAuthToken);
        };
        if session.access_token.is_empty()
            || session.is_expired(chrono::Utc::now().timestamp())
        {
            return Err(ClientError::NoAuthToken);
        }
        Ok(session.access_token.clone())
    }
}

/// Apply provider change notifications until the provider or context goes away.
async fn track_changes(inner: Weak<Inner>, mut changes: broadcast::Receiver<AuthChange>) {
    loop {
        let received = changes.recv().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match received {
            Ok(change) => {
                debug!(event = ?change.event, "auth change");
                inner.state.send_replace(AuthState::ready(change.session));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth change listener lagged, reloading session");
                match inner.provider.get_session().await {
                    Ok(session) => {
                        inner.state.send_replace(AuthState::ready(session));
                    }
                    Err(e) => error!(error = %e, "failed to reload auth session"),
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
