//! Common test utilities: an in-memory backend and client helpers.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use taskchat::api::{CreateTaskRequest, Message, Session, SessionPatch, Task, TaskPatch};
use taskchat::auth::{AuthContext, IdentityProvider, StaticIdentity};
use taskchat::client::ApiClient;
use taskchat::config::ApiConfig;

pub const TEST_TOKEN: &str = "test-token";
pub const CREATED_AT: &str = "2025-01-01T00:00:00Z";

type Params = Query<HashMap<String, String>>;

// ============================================================================
// Backend Double
// ============================================================================

#[derive(Default)]
pub struct BackendState {
    pub tasks: Vec<Task>,
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    /// Session ids that bulk operations report as failed.
    pub failing_ids: HashSet<String>,
    /// Makes the task and session listings answer `success: false`.
    pub fail_listings: bool,
    pub last_authorization: Option<String>,
    next_id: usize,
}

impl BackendState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    pub fn add_session(&mut self, id: &str, title: &str) {
        self.sessions.push(Session {
            id: Some(id.to_string()),
            user_id: "u1".to_string(),
            title: title.to_string(),
            created_at: Some(CREATED_AT.to_string()),
            deleted_at: None,
        });
    }

    pub fn add_task(&mut self, id: &str, title: &str, session_id: Option<&str>) {
        self.tasks.push(task(id, title, session_id));
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(id))
    }
}

/// Handle to a running backend double.
#[derive(Clone, Default)]
pub struct Backend {
    pub state: Arc<Mutex<BackendState>>,
    requests: Arc<AtomicUsize>,
}

impl Backend {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn last_authorization(&self) -> Option<String> {
        self.state.lock().await.last_authorization.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/chat", post(send_message).get(list_messages))
            .route("/tasks", get(list_tasks))
            .route("/task", get(get_task))
            .route("/tasks/create", post(create_task))
            .route("/tasks/update", patch(update_task))
            .route("/tasks/delete", delete(delete_task))
            .route("/sessions", get(list_sessions).delete(soft_delete_session))
            .route("/sessions/deleted", get(list_deleted_sessions))
            .route("/sessions/update", patch(update_session))
            .route("/sessions/restore", post(restore_session))
            .route("/sessions/permanent", delete(purge_session))
            .route("/sessions/bulk-delete", post(bulk_delete))
            .route("/sessions/bulk-restore", post(bulk_restore))
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }

    /// Serve the double and return its base URL.
    pub async fn spawn(&self) -> String {
        serve(self.router()).await
    }
}

async fn record(State(backend): State<Backend>, req: Request, next: Next) -> Response {
    backend.requests.fetch_add(1, Ordering::SeqCst);
    let auth = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    backend.state.lock().await.last_authorization = auth;
    next.run(req).await
}

fn ok(mut body: Value) -> Json<Value> {
    body["success"] = json!(true);
    Json(body)
}

fn rejected(message: &str) -> Json<Value> {
    Json(json!({"success": false, "error": message}))
}

pub fn task(id: &str, title: &str, session_id: Option<&str>) -> Task {
    Task {
        id: Some(id.to_string()),
        user_id: "u1".to_string(),
        goal_id: None,
        message_id: None,
        title: title.to_string(),
        description: String::new(),
        status: "open".to_string(),
        due_date: None,
        ai_suggested: false,
        created_at: CREATED_AT.to_string(),
        session_id: session_id.map(str::to_string),
        decision: None,
        follow_up_due_at: None,
        followed_up: None,
    }
}

// ----------------------------------------------------------------------------
// Chat
// ----------------------------------------------------------------------------

async fn send_message(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let text = body["message"].as_str().unwrap_or_default().to_string();
    let force_new = body["force_new"].as_bool().unwrap_or(false);

    let session_id = match body["session_id"].as_str() {
        Some(id) if !force_new => id.to_string(),
        _ => {
            let id = state.next_id("s");
            state.add_session(&id, &text);
            id
        }
    };

    for (sender, content) in [("user", text.clone()), ("assistant", format!("ok: {}", text))] {
        state.messages.push(Message {
            id: None,
            user_id: "u1".to_string(),
            sender: sender.to_string(),
            content,
            created_at: Some(CREATED_AT.to_string()),
            session_id: session_id.clone(),
            user_message_id: None,
        });
    }

    let mut action_items = Vec::new();
    if let Some(title) = text.strip_prefix("todo ") {
        let id = state.next_id("t");
        let mut item = task(&id, title, Some(&session_id));
        item.ai_suggested = true;
        state.tasks.push(item.clone());
        action_items.push(item);
    }

    ok(json!({
        "user_message": text,
        "ai_response": format!("ok: {}", text),
        "action_items": action_items,
        "session_id": session_id,
    }))
}

async fn list_messages(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let Some(session_id) = q.get("session_id") else {
        return rejected("session_id is required");
    };
    let state = backend.state.lock().await;
    let messages: Vec<_> = state
        .messages
        .iter()
        .filter(|m| &m.session_id == session_id)
        .collect();
    ok(json!({ "messages": messages }))
}

// ----------------------------------------------------------------------------
// Tasks
// ----------------------------------------------------------------------------

async fn list_tasks(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let state = backend.state.lock().await;
    if state.fail_listings {
        return rejected("database unavailable");
    }
    let mut tasks: Vec<Task> = state
        .tasks
        .iter()
        .filter(|t| {
            q.get("session_id")
                .is_none_or(|s| t.session_id.as_deref() == Some(s.as_str()))
        })
        .filter(|t| q.get("status").is_none_or(|s| &t.status == s))
        .filter(|t| q.get("search").is_none_or(|s| t.title.contains(s.as_str())))
        .cloned()
        .collect();
    let total = tasks.len();

    let offset: usize = q.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    tasks = tasks.into_iter().skip(offset).collect();
    if let Some(limit) = q.get("limit").and_then(|v| v.parse::<usize>().ok()) {
        tasks.truncate(limit);
    }

    ok(json!({ "tasks": tasks, "total": total }))
}

/// Answers with `task` as a list of one, as the real backend does.
async fn get_task(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    match state.tasks.iter().find(|t| t.id.as_deref() == Some(id.as_str())) {
        Some(task) => ok(json!({ "task": [task] })),
        None => rejected("Task not found"),
    }
}

async fn create_task(
    State(backend): State<Backend>,
    Json(req): Json<CreateTaskRequest>,
) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = state.next_id("t");
    let mut created = task(&id, &req.title, req.session_id.as_deref());
    created.description = req.description;
    state.tasks.push(created.clone());
    ok(json!({ "task": created }))
}

async fn update_task(
    State(backend): State<Backend>,
    Query(q): Params,
    Json(patch): Json<TaskPatch>,
) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    let Some(task) = state
        .tasks
        .iter_mut()
        .find(|t| t.id.as_deref() == Some(id.as_str()))
    else {
        return rejected("Task not found");
    };

    if let Some(v) = patch.title {
        task.title = v;
    }
    if let Some(v) = patch.description {
        task.description = v;
    }
    if let Some(v) = patch.status {
        task.status = v;
    }
    if let Some(v) = patch.due_date {
        task.due_date = Some(v);
    }
    if let Some(v) = patch.decision {
        task.decision = Some(v);
    }
    if let Some(v) = patch.session_id {
        task.session_id = Some(v);
    }
    ok(json!({ "task": task.clone() }))
}

async fn delete_task(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    let before = state.tasks.len();
    state.tasks.retain(|t| t.id.as_deref() != Some(id.as_str()));
    if state.tasks.len() == before {
        return rejected("Task not found");
    }
    ok(json!({ "message": "Task deleted" }))
}

// ----------------------------------------------------------------------------
// Sessions
// ----------------------------------------------------------------------------

async fn list_sessions(State(backend): State<Backend>) -> Json<Value> {
    let state = backend.state.lock().await;
    if state.fail_listings {
        return rejected("database unavailable");
    }
    let sessions: Vec<_> = state
        .sessions
        .iter()
        .filter(|s| s.deleted_at.is_none())
        .collect();
    ok(json!({ "sessions": sessions }))
}

async fn list_deleted_sessions(State(backend): State<Backend>) -> Json<Value> {
    let state = backend.state.lock().await;
    let sessions: Vec<_> = state
        .sessions
        .iter()
        .filter(|s| s.deleted_at.is_some())
        .collect();
    ok(json!({ "sessions": sessions }))
}

async fn update_session(
    State(backend): State<Backend>,
    Query(q): Params,
    Json(patch): Json<SessionPatch>,
) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    let Some(session) = state.session_mut(&id) else {
        return rejected("Session not found");
    };
    if let Some(title) = patch.title {
        session.title = title;
    }
    ok(json!({ "session": session.clone() }))
}

async fn soft_delete_session(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    match state.session_mut(&id) {
        Some(session) if session.deleted_at.is_none() => {
            session.deleted_at = Some(CREATED_AT.to_string());
            ok(json!({ "message": "Session deleted" }))
        }
        _ => rejected("Session not found"),
    }
}

async fn restore_session(State(backend): State<Backend>, Query(q): Params) -> Json<Value> {
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    match state.session_mut(&id) {
        Some(session) if session.deleted_at.is_some() => {
            session.deleted_at = None;
            ok(json!({ "message": "Session restored" }))
        }
        _ => rejected("Deleted session not found"),
    }
}

async fn purge_session(
    State(backend): State<Backend>,
    Query(q): Params,
    Json(body): Json<Value>,
) -> Json<Value> {
    if body["confirm"] != json!(true) {
        return rejected("Confirmation required");
    }
    let mut state = backend.state.lock().await;
    let id = q.get("id").cloned().unwrap_or_default();
    let before = state.sessions.len();
    state.sessions.retain(|s| s.id.as_deref() != Some(id.as_str()));
    if state.sessions.len() == before {
        return rejected("Session not found");
    }
    ok(json!({ "message": "Session permanently deleted" }))
}

async fn bulk_delete(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    bulk(backend, body, true).await
}

async fn bulk_restore(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    bulk(backend, body, false).await
}

async fn bulk(backend: Backend, body: Value, delete: bool) -> Json<Value> {
    let ids: Vec<String> = body["session_ids"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut state = backend.state.lock().await;
    let mut processed = Vec::new();
    let mut failed = Vec::new();
    for id in &ids {
        if state.failing_ids.contains(id) {
            failed.push(id.clone());
            continue;
        }
        match state.session_mut(id) {
            Some(session) => {
                session.deleted_at = delete.then(|| CREATED_AT.to_string());
                processed.push(id.clone());
            }
            None => failed.push(id.clone()),
        }
    }

    Json(json!({
        "success": failed.is_empty(),
        "processed_ids": processed,
        "failed_ids": failed,
        "total_count": ids.len(),
        "success_count": processed.len(),
        "failure_count": failed.len(),
    }))
}

// ============================================================================
// Fixed Responses
// ============================================================================

/// Router that answers every request with the same status and JSON body,
/// counting requests in `backend`.
pub fn fixed(backend: &Backend, status: StatusCode, body: Value) -> Router {
    Router::new()
        .fallback(move || {
            let body = body.clone();
            async move { (status, Json(body)).into_response() }
        })
        .layer(middleware::from_fn_with_state(backend.clone(), record))
}

/// Router that answers every request with a non-JSON body.
pub fn plain(backend: &Backend, status: StatusCode, body: &'static str) -> Router {
    Router::new()
        .fallback(move || async move { (status, body).into_response() })
        .layer(middleware::from_fn_with_state(backend.clone(), record))
}

// ============================================================================
// Server and Client Helpers
// ============================================================================

/// Bind a router to an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
    }
}

/// An initialized client using `provider` for its bearer token.
pub async fn client_with(base_url: &str, provider: Arc<dyn IdentityProvider>) -> ApiClient {
    let auth = AuthContext::new(provider);
    auth.initialize().await.unwrap();
    ApiClient::new(&api_config(base_url), auth)
}

/// An initialized client signed in with [`TEST_TOKEN`].
pub async fn signed_in_client(base_url: &str) -> ApiClient {
    client_with(base_url, Arc::new(StaticIdentity::bearer(TEST_TOKEN))).await
}

/// An initialized client with no session.
pub async fn signed_out_client(base_url: &str) -> ApiClient {
    client_with(base_url, Arc::new(StaticIdentity::signed_out())).await
}

/// Backend double plus a signed-in client pointed at it.
pub async fn backend_and_client() -> (Backend, ApiClient) {
    let backend = Backend::default();
    let url = backend.spawn().await;
    (backend, signed_in_client(&url).await)
}

/// Header value the double should have seen for [`TEST_TOKEN`].
pub fn bearer_header() -> String {
    format!("Bearer {}", TEST_TOKEN)
}
