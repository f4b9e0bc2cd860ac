//! CLI command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use taskchat::auth::{AuthContext, GoTrueProvider, IdentityProvider, StaticIdentity};
use taskchat::client::ApiClient;
use taskchat::config::Config;
use taskchat::confirm::Confirm;

pub mod auth;
pub mod chat;
pub mod sessions;
pub mod tasks;

/// Pick the identity provider the config asks for.
///
/// A fixed `auth.access_token` wins over the identity service. With neither
/// configured every authenticated call fails locally.
fn identity_provider(config: &Config) -> Result<Arc<dyn IdentityProvider>> {
    if let Some(token) = config.auth.access_token.as_deref()
        && !token.is_empty()
    {
        debug!("using fixed access token");
        return Ok(Arc::new(StaticIdentity::bearer(token)));
    }
    if config.auth.url.as_deref().is_some_and(|u| !u.is_empty()) {
        let provider =
            GoTrueProvider::from_config(&config.auth).context("Invalid auth configuration")?;
        return Ok(Arc::new(provider));
    }
    warn!("no auth.url or auth.access_token configured; requests will be unauthenticated");
    Ok(Arc::new(StaticIdentity::signed_out()))
}

/// Load config, initialize auth and build a client whose calls are
/// cancelled by Ctrl+C.
pub async fn connect(config_path: &str) -> Result<ApiClient> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("Failed to load config '{}'", config_path))?;

    let auth = AuthContext::new(identity_provider(&config)?);
    auth.initialize()
        .await
        .context("Failed to initialize authentication")?;

    Ok(ApiClient::new(&config.api, auth).with_cancel(interrupt_token()))
}

/// Token cancelled on the first Ctrl+C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

/// Asks on the terminal and accepts only `y` or `yes`.
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let mut out = tokio::io::stdout();
        let line = format!("{} [y/N] ", prompt);
        if out.write_all(line.as_bytes()).await.is_err() || out.flush().await.is_err() {
            return false;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}
