//! Error types for restsync core.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Message recorded when an INDEX response is not a list.
pub const LIST_FORMAT_MESSAGE: &str = "Bad data received from server. INDEX calls expect an array.";

/// Message recorded when a member response is not an object.
pub const MEMBER_FORMAT_MESSAGE: &str = "Bad data received from server. Expected an object.";

/// Errors that can occur while building or querying configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration JSON could not be parsed.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No resource with this name is configured.
    #[error("unknown resource: {name}")]
    UnknownResource {
        /// Name of the resource.
        name: String,
    },

    /// A resource entry is unusable.
    #[error("invalid resource '{resource}': {message}")]
    InvalidResource {
        /// Name of the resource.
        resource: String,
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown resource error.
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource { name: name.into() }
    }

    /// Creates an invalid resource error.
    pub fn invalid_resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResource {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Error recorded on a slot or collection when a request fails.
///
/// Stored in state, so it is cloneable and serializable.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LoadingError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response without an error payload; holds the status text.
    #[error("{0}")]
    Status(String),

    /// Non-2xx response carrying an `error` field.
    #[error("server error: {0}")]
    Server(Value),

    /// The response body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response body had the wrong shape.
    #[error("{0}")]
    Format(String),
}

impl LoadingError {
    /// The error recorded for a malformed INDEX response.
    #[must_use]
    pub fn list_format() -> Self {
        Self::Format(LIST_FORMAT_MESSAGE.to_string())
    }

    /// The error recorded for a malformed member response.
    #[must_use]
    pub fn member_format() -> Self {
        Self::Format(MEMBER_FORMAT_MESSAGE.to_string())
    }

    /// Returns true if the failure happened before a response arrived.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_display() {
        let err = CoreError::unknown_resource("Posts");
        assert_eq!(err.to_string(), "unknown resource: Posts");

        let err = CoreError::invalid_resource("Posts", "empty controller");
        assert!(err.to_string().contains("Posts"));
    }

    #[test]
    fn loading_error_display() {
        assert_eq!(
            LoadingError::list_format().to_string(),
            "Bad data received from server. INDEX calls expect an array."
        );
        assert_eq!(LoadingError::Status("Not Found".into()).to_string(), "Not Found");
    }

    #[test]
    fn loading_error_serializes_tagged() {
        let value = serde_json::to_value(LoadingError::Server(json!({"code": 1}))).unwrap();
        assert_eq!(value, json!({"kind": "server", "detail": {"code": 1}}));

        let back: LoadingError = serde_json::from_value(value).unwrap();
        assert_eq!(back, LoadingError::Server(json!({"code": 1})));
    }

    #[test]
    fn transport_classification() {
        assert!(LoadingError::Transport("refused".into()).is_transport());
        assert!(!LoadingError::Parse("eof".into()).is_transport());
    }
}
