//! Sign-in, sign-out and identity commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use taskchat::auth::{AuthContext, GoTrueProvider};
use taskchat::config::Config;

pub async fn login(config_path: &str, email: &str, password: &str) -> Result<()> {
    let config = Config::load(config_path).await?;
    let provider =
        GoTrueProvider::from_config(&config.auth).context("Invalid auth configuration")?;

    let session = provider
        .sign_in_with_password(email, password)
        .await
        .context("Sign in failed")?;

    println!(
        "Signed in as {}. Session saved to {}",
        session.user.email.as_deref().unwrap_or(&session.user.id),
        config.auth.credentials_path().display()
    );
    Ok(())
}

pub async fn logout(config_path: &str) -> Result<()> {
    let config = Config::load(config_path).await?;
    let provider =
        GoTrueProvider::from_config(&config.auth).context("Invalid auth configuration")?;

    let auth = AuthContext::new(Arc::new(provider));
    auth.initialize().await?;
    auth.sign_out().await;

    println!("Signed out.");
    Ok(())
}

pub async fn whoami(config_path: &str) -> Result<()> {
    let client = super::connect(config_path).await?;

    match client.auth().user() {
        Some(user) => {
            println!("id:       {}", user.id);
            println!("email:    {}", user.email.as_deref().unwrap_or("-"));
            println!("username: {}", user.username().unwrap_or("-"));
        }
        None => println!("Not signed in. Run `taskchat login` first."),
    }
    Ok(())
}
