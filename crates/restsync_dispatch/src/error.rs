//! Error types for the dispatcher.

use restsync_core::{ClientId, CoreError, LoadingError, ResourceId, Verb};
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while dispatching a request.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] CoreError),

    /// The verb needs a record ID and the intent has none.
    #[error("{resource}.{verb} requires an id")]
    MissingId {
        /// Name of the resource.
        resource: String,
        /// Verb of the intent.
        verb: Verb,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// A request body could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The request completed with a failure event.
    #[error("{resource}.{verb} rejected: {error}")]
    Rejected {
        /// Name of the resource.
        resource: String,
        /// Verb of the request.
        verb: Verb,
        /// Server ID of the record.
        id: Option<ResourceId>,
        /// Client ID of the record.
        client_id: Option<ClientId>,
        /// What went wrong.
        error: LoadingError,
    },

    /// The request task ended without reporting an outcome.
    #[error("request abandoned before completion")]
    Abandoned,

    /// Dispatch was called outside a tokio runtime.
    #[error("no tokio runtime available to issue requests")]
    NoRuntime,
}

impl DispatchError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns the error recorded in state, for rejected requests.
    pub fn loading_error(&self) -> Option<&LoadingError> {
        match self {
            DispatchError::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DispatchError::MissingId {
            resource: "Posts".into(),
            verb: Verb::Show,
        };
        assert_eq!(err.to_string(), "Posts.SHOW requires an id");

        let err = DispatchError::transport("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn rejected_exposes_loading_error() {
        let err = DispatchError::Rejected {
            resource: "Posts".into(),
            verb: Verb::Update,
            id: Some(ResourceId::Int(1)),
            client_id: None,
            error: LoadingError::Status("Not Found".into()),
        };
        assert!(err.to_string().contains("Not Found"));
        assert_eq!(
            err.loading_error(),
            Some(&LoadingError::Status("Not Found".into()))
        );
        assert!(DispatchError::Abandoned.loading_error().is_none());
    }
}
