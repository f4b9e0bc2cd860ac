//! Confirmation gate for destructive session operations.
//!
//! The client methods never ask for confirmation. Interactive callers use the
//! functions here, which consult a [`Confirm`] implementation first and only
//! call the backend when it agrees.

use async_trait::async_trait;
use tracing::info;

use crate::api::{Ack, BulkOutcome};
use crate::client::{ApiClient, Result};

/// Asks whether a destructive operation should go ahead.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything. Backs `--yes` style flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

#[async_trait]
impl Confirm for AssumeYes {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Result of a gated operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Gated<T> {
    Done(T),
    /// The confirmer said no; nothing was sent.
    Declined,
}

impl<T> Gated<T> {
    pub fn is_declined(&self) -> bool {
        matches!(self, Gated::Declined)
    }
}

/// Hard-delete a session after confirmation.
pub async fn purge_session(
    client: &ApiClient,
    session_id: &str,
    confirm: &dyn Confirm,
) -> Result<Gated<Ack>> {
    let prompt = format!(
        "Permanently delete session {}? This cannot be undone.",
        session_id
    );
    if !confirm.confirm(&prompt).await {
        info!(session_id, "purge declined");
        return Ok(Gated::Declined);
    }
    client.purge_session(session_id).await.map(Gated::Done)
}

/// Soft-delete several sessions after confirmation.
pub async fn bulk_delete_sessions(
    client: &ApiClient,
    session_ids: &[String],
    confirm: &dyn Confirm,
) -> Result<Gated<BulkOutcome>> {
    let prompt = format!("Delete {} session(s)?", session_ids.len());
    if !confirm.confirm(&prompt).await {
        info!(count = session_ids.len(), "bulk delete declined");
        return Ok(Gated::Declined);
    }
    client.bulk_delete_sessions(session_ids).await.map(Gated::Done)
}

/// Restore several sessions after confirmation.
pub async fn bulk_restore_sessions(
    client: &ApiClient,
    session_ids: &[String],
    confirm: &dyn Confirm,
) -> Result<Gated<BulkOutcome>> {
    let prompt = format!("Restore {} session(s)?", session_ids.len());
    if !confirm.confirm(&prompt).await {
        info!(count = session_ids.len(), "bulk restore declined");
        return Ok(Gated::Declined);
    }
    client.bulk_restore_sessions(session_ids).await.map(Gated::Done)
}
