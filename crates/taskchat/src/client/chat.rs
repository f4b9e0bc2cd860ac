//! Chat endpoints.

use super::{ApiCall, ApiClient, Result};
use crate::api::{ChatReply, ChatRequest, MessageList};

impl ApiClient {
    /// Send a chat message. The reply carries the session it landed in.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.authed(ApiCall::post("/chat").json(request)?).await
    }

    /// All messages of a chat session.
    pub async fn list_messages(&self, session_id: &str) -> Result<MessageList> {
        self.authed(ApiCall::get("/chat").query("session_id", session_id))
            .await
    }
}
