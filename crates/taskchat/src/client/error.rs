//! Client error types.

use std::time::Duration;

use thiserror::Error;

use crate::auth::IdentityError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the taskchat backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response was received.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Server answered with `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    /// No usable bearer token; raised before any request is sent.
    #[error("No authentication token available")]
    NoAuthToken,

    /// The auth context has not finished initializing.
    #[error("authentication is not initialized")]
    AuthNotInitialized,

    /// A session operation failed.
    #[error("{operation} session {session_id} failed: {source}")]
    Session {
        session_id: String,
        operation: &'static str,
        #[source]
        source: Box<ClientError>,
    },

    /// The call did not complete within its deadline.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The call was cancelled by its caller.
    #[error("request cancelled")]
    Cancelled,

    /// Base URL or path could not form a valid URL.
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Identity provider failure surfaced through the client.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ClientError {
    /// Wrap an error with the session id and operation it belongs to.
    pub fn for_session(self, session_id: &str, operation: &'static str) -> Self {
        ClientError::Session {
            session_id: session_id.to_string(),
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through session wrappers.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Session { source, .. } => source.root(),
            other => other,
        }
    }

    /// Message supplied by the server, if the failure came from one.
    pub fn server_message(&self) -> Option<&str> {
        match self.root() {
            ClientError::Api { message, .. } | ClientError::Rejected { message } => {
                Some(message)
            }
            _ => None,
        }
    }

    /// HTTP status for non-success responses.
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures that happened before reaching the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self.root(),
            ClientError::NoAuthToken | ClientError::AuthNotInitialized | ClientError::InvalidUrl(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_wrapper_keeps_root_cause() {
        let err = ClientError::Rejected {
            message: "session not found".to_string(),
        }
        .for_session("s1", "restore");

        assert_eq!(
            err.to_string(),
            "restore session s1 failed: session not found"
        );
        assert_eq!(err.server_message(), Some("session not found"));
        assert!(matches!(err.root(), ClientError::Rejected { .. }));
    }

    #[test]
    fn api_error_displays_server_message() {
        let err = ClientError::Api {
            status: 503,
            message: "API error: 503".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn missing_token_is_local() {
        assert!(ClientError::NoAuthToken.is_local());
        assert_eq!(
            ClientError::NoAuthToken.to_string(),
            "No authentication token available"
        );
        assert!(!ClientError::Cancelled.is_local());
    }
}
