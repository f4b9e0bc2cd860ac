use tokio::sync::watch;
use tracing::{debug, error};

use super::{Snapshot, Store};
use crate::api::Session;
use crate::client::ApiClient;

/// Container for the current (not deleted) chat sessions.
#[derive(Debug)]
pub struct SessionList {
    client: ApiClient,
    store: Store<Session>,
}

impl SessionList {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(),
        }
    }

    /// Reload sessions. Never fails; see [`Snapshot::last_error`].
    pub async fn load_sessions(&self) {
        match self.client.list_sessions().await {
            Ok(listing) => match listing.sessions {
                Some(sessions) => {
                    debug!(count = sessions.len(), "sessions loaded");
                    self.store.replace(sessions);
                }
                None => self.store.clear_error(),
            },
            Err(e) => {
                error!(error = %e, "failed to load sessions");
                self.store.fail(&e);
            }
        }
    }

    pub fn find(&self, session_id: &str) -> Option<Session> {
        self.store
            .tx
            .borrow()
            .items
            .iter()
            .find(|s| s.id.as_deref() == Some(session_id))
            .cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Session>> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<Session> {
        self.store.snapshot()
    }
}
