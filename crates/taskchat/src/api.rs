//! Wire types exchanged with the taskchat backend.
//!
//! Records mirror the backend's JSON verbatim. Optional fields are omitted
//! when serialized so that request bodies match what the server expects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::client::{ClientError, Result};

/// Message used when a failed envelope carries no `error` text.
pub const DEFAULT_REJECTION: &str = "API request failed";

// ============================================================================
// Entities
// ============================================================================

/// A chat message owned by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub sender: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message_id: Option<String>,
}

/// A task, either created by the user or suggested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub title: String,
    pub description: String,
    /// Free-form status; interpretation is left to the caller.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub ai_suggested: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_due_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed_up: Option<bool>,
}

/// A chat session (conversation), not to be confused with an auth session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Set when the session is soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

// ============================================================================
// Sparse Patches
// ============================================================================

/// Partial task update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_suggested: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_due_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed_up: Option<bool>,
}

impl TaskPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Partial session update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SessionPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Start a new session even when `session_id` is set.
    #[serde(default)]
    pub force_new: bool,
}

/// Body of `POST /tasks/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Body of `DELETE /sessions/permanent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PermanentDeleteRequest {
    pub confirm: bool,
}

impl PermanentDeleteRequest {
    pub const CONFIRMED: Self = Self { confirm: true };
}

/// Body of the bulk session endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSessionsRequest {
    pub session_ids: Vec<String>,
}

/// Sort direction for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("invalid sort order '{}': expected asc or desc", other)),
        }
    }
}

/// Filters, sorting and paging for `GET /tasks`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub session_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl TaskQuery {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Query pairs in the order the backend has always received them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = &self.session_id {
            pairs.push(("session_id", v.clone()));
        }
        if let Some(v) = &self.status {
            pairs.push(("status", v.clone()));
        }
        if let Some(v) = self.limit {
            pairs.push(("limit", v.to_string()));
        }
        if let Some(v) = self.offset {
            pairs.push(("offset", v.to_string()));
        }
        if let Some(v) = &self.search {
            pairs.push(("search", v.clone()));
        }
        if let Some(v) = &self.sort_by {
            pairs.push(("sort_by", v.clone()));
        }
        if let Some(v) = self.sort_order {
            pairs.push(("sort_order", v.as_str().to_string()));
        }
        pairs
    }
}

// ============================================================================
// Response Payloads
// ============================================================================

/// Payload of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
    /// Tasks the assistant extracted from the exchange.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<Task>,
    pub session_id: String,
}

/// Payload of `GET /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
}

/// Payload of `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Payload of `GET /task`.
///
/// The backend has been seen to send `task` as a list of one; both that and a
/// plain object are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SingleTask {
    #[serde(default, deserialize_with = "task_or_list")]
    pub task: Option<Task>,
}

/// Payload of task create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
}

/// Payload of `GET /sessions` and `GET /sessions/deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionListing {
    /// `None` when the backend omitted the list or sent `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
}

impl SessionListing {
    pub fn sessions(&self) -> &[Session] {
        self.sessions.as_deref().unwrap_or_default()
    }

    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions.unwrap_or_default()
    }
}

/// Payload of `PATCH /sessions/update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReply {
    pub session: Session,
}

/// Payload of operations that only report success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-id result of a bulk session operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    #[serde(default)]
    pub processed_ids: Vec<String>,
    #[serde(default)]
    pub failed_ids: Vec<String>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
}

impl BulkOutcome {
    /// True when the body carries per-id results.
    fn is_outcome_body(value: &Value) -> bool {
        value.get("processed_ids").is_some() || value.get("failed_ids").is_some()
    }

    /// Decode a bulk response.
    ///
    /// Per-id results are returned as-is even next to `success: false`; only
    /// a body without them is treated as a plain envelope.
    pub fn decode(value: Value) -> Result<Self> {
        if Self::is_outcome_body(&value) {
            return Ok(serde_json::from_value(value)?);
        }
        Envelope::from_value(value)?.into_result()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_ids.is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn task_or_list<'de, D>(deserializer: D) -> std::result::Result<Option<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrList {
        One(Box<Task>),
        List(Vec<Task>),
    }

    Ok(match Option::<OneOrList>::deserialize(deserializer)? {
        None => None,
        Some(OneOrList::One(task)) => Some(*task),
        Some(OneOrList::List(list)) => {
            if list.len() > 1 {
                warn!(count = list.len(), "single-task response carried several tasks");
            }
            list.into_iter().next()
        }
    })
}

// ============================================================================
// Envelope
// ============================================================================

/// A decoded response envelope.
///
/// The backend wraps every payload in an object with a `success` flag and an
/// optional `error`. Only an explicit `success: false` is a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Failure { error: Option<String> },
}

impl<T: DeserializeOwned> Envelope<T> {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .map(str::to_string);
            return Ok(Envelope::Failure { error });
        }
        serde_json::from_value(value).map(Envelope::Success)
    }
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Envelope::Success(payload) => Ok(payload),
            Envelope::Failure { error } => Err(ClientError::Rejected {
                message: error.unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            }),
        }
    }
}
