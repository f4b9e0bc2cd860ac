//! View-state containers.
//!
//! Each container holds the last successfully loaded list of a resource in a
//! `watch` channel. Loaders replace the list on success; on failure they log,
//! keep the previous list and record the error in [`Snapshot::last_error`].
//! Concurrent loads are not fenced: the last response to arrive wins.

mod sessions;
mod tasks;

pub use sessions::SessionList;
pub use tasks::TaskBoard;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::client::ClientError;

/// The latest contents of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    /// Message of the most recent failed load, cleared by the next success.
    pub last_error: Option<String>,
    /// When `items` was last replaced.
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            last_error: None,
            loaded_at: None,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }
}

/// Shared `watch` plumbing for the concrete containers.
#[derive(Debug)]
struct Store<T> {
    tx: watch::Sender<Snapshot<T>>,
}

impl<T: Clone> Store<T> {
    fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self { tx }
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    fn snapshot(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    fn replace(&self, items: Vec<T>) {
        self.tx.send_modify(|snap| {
            snap.items = items;
            snap.last_error = None;
            snap.loaded_at = Some(Utc::now());
        });
    }

    /// A successful response that carried no list.
    fn clear_error(&self) {
        self.tx.send_if_modified(|snap| snap.last_error.take().is_some());
    }

    fn fail(&self, error: &ClientError) {
        let message = error.to_string();
        self.tx.send_modify(|snap| snap.last_error = Some(message));
    }
}
