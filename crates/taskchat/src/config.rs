use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "taskchat.yaml";
/// Directory under `$HOME` holding local client state.
pub const DEFAULT_STATE_DIR: &str = ".taskchat";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults. A relative `auth.credentials_path`
    /// is resolved against the file's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        let mut config: Self = serde_saphyr::from_str(&expanded)?;
        if let Some(creds) = config.auth.credentials_path.take() {
            config.auth.credentials_path = Some(resolve_path(path, &creds));
        }
        Ok(config)
    }
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned as-is.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// ApiConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-call deadline. Zero disables it.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

// ============================================================================
// AuthConfig
// ============================================================================

/// Identity provider settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the GoTrue-compatible identity service.
    #[serde(default)]
    pub url: Option<String>,
    /// Public key sent as the `apikey` header.
    #[serde(default)]
    pub anon_key: Option<String>,
    /// Fixed bearer token; bypasses the identity service when set.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Where the signed-in session is persisted.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl AuthConfig {
    /// Credentials file location, defaulting to `~/.taskchat/session.json`.
    pub fn credentials_path(&self) -> PathBuf {
        if let Some(path) = &self.credentials_path {
            return path.clone();
        }
        let home = match std::env::var("HOME") {
            Ok(h) => h,
            Err(_) => {
                tracing::warn!("HOME not set, using /tmp for stored credentials");
                "/tmp".to_string()
            }
        };
        PathBuf::from(home)
            .join(DEFAULT_STATE_DIR)
            .join("session.json")
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}`, `${VAR:-default}` and `$$` in config text.
///
/// `${VAR}` errors when unset; `${VAR:-default}` falls back to `default`.
/// A `$` not followed by `{` or `$` is kept literally. Nested references
/// are not supported.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            out.push_str(&lookup(&body[..end])?);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Resolve the inside of a `${...}` reference.
fn lookup(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
