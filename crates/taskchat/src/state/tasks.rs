use tokio::sync::watch;
use tracing::{debug, error};

use super::{Snapshot, Store};
use crate::api::{Task, TaskQuery};
use crate::client::ApiClient;

/// Container for the current task list.
#[derive(Debug)]
pub struct TaskBoard {
    client: ApiClient,
    store: Store<Task>,
}

impl TaskBoard {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(),
        }
    }

    /// Reload tasks, optionally only those of one session. An empty id
    /// loads everything.
    ///
    /// Never fails; see [`Snapshot::last_error`].
    pub async fn load_tasks(&self, session_id: Option<&str>) {
        let session_id = session_id.filter(|id| !id.is_empty());
        let query = match session_id {
            Some(id) => TaskQuery::for_session(id),
            None => TaskQuery::default(),
        };
        match self.client.list_tasks(&query).await {
            Ok(page) => match page.tasks {
                Some(tasks) => {
                    debug!(count = tasks.len(), session_id, "tasks loaded");
                    self.store.replace(tasks);
                }
                None => self.store.clear_error(),
            },
            Err(e) => {
                error!(session_id, error = %e, "failed to load tasks");
                self.store.fail(&e);
            }
        }
    }

    /// Loaded tasks belonging to `session_id`, or all of them for `None` or
    /// an empty id.
    pub fn tasks_by_session(&self, session_id: Option<&str>) -> Vec<Task> {
        let snapshot = self.store.tx.borrow();
        match session_id.filter(|id| !id.is_empty()) {
            None => snapshot.items.clone(),
            Some(id) => snapshot
                .items
                .iter()
                .filter(|t| t.session_id.as_deref() == Some(id))
                .cloned()
                .collect(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Task>> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<Task> {
        self.store.snapshot()
    }
}
