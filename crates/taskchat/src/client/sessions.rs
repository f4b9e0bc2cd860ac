//! Chat session endpoints.
//!
//! Per-session failures are wrapped in [`super::ClientError::Session`] so callers
//! can tell which session and operation failed.

use super::{ApiCall, ApiClient, Result};
use crate::api::{
    Ack, BulkOutcome, BulkSessionsRequest, PermanentDeleteRequest, SessionListing, SessionPatch,
    SessionReply,
};

impl ApiClient {
    /// Sessions that are not soft-deleted.
    pub async fn list_sessions(&self) -> Result<SessionListing> {
        self.authed(ApiCall::get("/sessions")).await
    }

    /// Soft-deleted sessions only.
    pub async fn list_deleted_sessions(&self) -> Result<SessionListing> {
        self.authed(ApiCall::get("/sessions/deleted")).await
    }

    pub async fn update_session(
        &self,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<SessionReply> {
        let call = ApiCall::patch("/sessions/update")
            .query("id", session_id)
            .json(patch)?;
        self.authed(call)
            .await
            .map_err(|e| e.for_session(session_id, "update"))
    }

    /// Soft delete. The session can be brought back with [`Self::restore_session`].
    pub async fn delete_session(&self, session_id: &str) -> Result<Ack> {
        self.authed(ApiCall::delete("/sessions").query("id", session_id))
            .await
            .map_err(|e| e.for_session(session_id, "delete"))
    }

    pub async fn restore_session(&self, session_id: &str) -> Result<Ack> {
        self.authed(ApiCall::post("/sessions/restore").query("id", session_id))
            .await
            .map_err(|e| e.for_session(session_id, "restore"))
    }

    /// Irreversibly delete a session.
    ///
    /// Sends no prompt of its own; interactive callers go through
    /// [`crate::confirm::purge_session`].
    pub async fn purge_session(&self, session_id: &str) -> Result<Ack> {
        let call = ApiCall::delete("/sessions/permanent")
            .query("id", session_id)
            .json(&PermanentDeleteRequest::CONFIRMED)?;
        self.authed(call)
            .await
            .map_err(|e| e.for_session(session_id, "purge"))
    }

    /// Soft delete several sessions. Per-id failures are reported in the
    /// outcome, not as an error.
    pub async fn bulk_delete_sessions(&self, session_ids: &[String]) -> Result<BulkOutcome> {
        self.bulk("/sessions/bulk-delete", session_ids).await
    }

    pub async fn bulk_restore_sessions(&self, session_ids: &[String]) -> Result<BulkOutcome> {
        self.bulk("/sessions/bulk-restore", session_ids).await
    }

    async fn bulk(&self, path: &str, session_ids: &[String]) -> Result<BulkOutcome> {
        let body = BulkSessionsRequest {
            session_ids: session_ids.to_vec(),
        };
        let value = self.authed_value(ApiCall::post(path).json(&body)?).await?;
        BulkOutcome::decode(value)
    }
}
