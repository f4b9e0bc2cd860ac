//! Chat session commands.

use anyhow::{Context, Result};

use taskchat::api::{BulkOutcome, SessionPatch};
use taskchat::confirm::{self, AssumeYes, Confirm, Gated};

use super::StdinConfirm;

fn confirmer(yes: bool) -> &'static dyn Confirm {
    if yes { &AssumeYes } else { &StdinConfirm }
}

pub async fn list(config_path: &str, deleted: bool) -> Result<()> {
    let client = super::connect(config_path).await?;
    let result = if deleted {
        client.list_deleted_sessions().await
    } else {
        client.list_sessions().await
    };
    let listing = result.context("Failed to list sessions")?;

    if listing.sessions().is_empty() {
        println!("No sessions.");
    }
    for session in listing.sessions() {
        let when = if deleted {
            session.deleted_at.as_deref()
        } else {
            session.created_at.as_deref()
        };
        println!(
            "{:<12} {:<25} {}",
            session.id.as_deref().unwrap_or("-"),
            when.unwrap_or("-"),
            session.title
        );
    }
    Ok(())
}

pub async fn rename(config_path: &str, id: &str, title: String) -> Result<()> {
    let client = super::connect(config_path).await?;
    let reply = client.update_session(id, &SessionPatch::title(title)).await?;
    println!("Renamed to '{}'", reply.session.title);
    Ok(())
}

pub async fn delete(config_path: &str, id: &str) -> Result<()> {
    let client = super::connect(config_path).await?;
    client.delete_session(id).await?;
    println!("Session {} moved to trash. Restore with: taskchat sessions restore {}", id, id);
    Ok(())
}

pub async fn restore(config_path: &str, id: &str) -> Result<()> {
    let client = super::connect(config_path).await?;
    client.restore_session(id).await?;
    println!("Session {} restored.", id);
    Ok(())
}

pub async fn purge(config_path: &str, id: &str, yes: bool) -> Result<()> {
    let client = super::connect(config_path).await?;
    match confirm::purge_session(&client, id, confirmer(yes)).await? {
        Gated::Done(_) => println!("Session {} permanently deleted.", id),
        Gated::Declined => println!("Aborted."),
    }
    Ok(())
}

pub async fn bulk_delete(config_path: &str, ids: &[String], yes: bool) -> Result<()> {
    let client = super::connect(config_path).await?;
    let gated = confirm::bulk_delete_sessions(&client, ids, confirmer(yes))
        .await
        .context("Bulk delete failed")?;
    print_outcome(gated);
    Ok(())
}

pub async fn bulk_restore(config_path: &str, ids: &[String], yes: bool) -> Result<()> {
    let client = super::connect(config_path).await?;
    let gated = confirm::bulk_restore_sessions(&client, ids, confirmer(yes))
        .await
        .context("Bulk restore failed")?;
    print_outcome(gated);
    Ok(())
}

fn print_outcome(gated: Gated<BulkOutcome>) {
    let outcome = match gated {
        Gated::Done(outcome) => outcome,
        Gated::Declined => {
            println!("Aborted.");
            return;
        }
    };
    println!(
        "{} of {} succeeded, {} failed",
        outcome.success_count, outcome.total_count, outcome.failure_count
    );
    if !outcome.processed_ids.is_empty() {
        println!("processed: {}", outcome.processed_ids.join(", "));
    }
    if !outcome.failed_ids.is_empty() {
        println!("failed:    {}", outcome.failed_ids.join(", "));
    }
}
