//! Stored auth session for the command-line client.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::provider::{AuthSession, IdentityError};

/// JSON file holding the signed-in session.
///
/// Written with owner-only permissions on unix.
#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session. A missing file means signed out.
    pub fn load(&self) -> Result<Option<AuthSession>, IdentityError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save(&self, session: &AuthSession) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(session)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .map_err(|e| self.io_error(e))?;
            file.write_all(contents.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| self.io_error(e))?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, &contents).map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    /// Remove the stored session. Removing a missing file is not an error.
    pub fn clear(&self) -> Result<(), IdentityError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> IdentityError {
        IdentityError::Credentials {
            path: self.path.clone(),
            source,
        }
    }
}
