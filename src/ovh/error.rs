//! Error types for the OVH client.

use thiserror::Error;

/// Errors raised while constructing an [`super::OvhClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OvhClientError {
    /// Raised when a credential is blank.
    #[error("missing {field}")]
    MissingCredential {
        /// Name of the blank credential.
        field: String,
    },
    /// Raised when the endpoint is neither a known alias nor a URL.
    #[error("unknown OVH endpoint '{endpoint}'")]
    UnknownEndpoint {
        /// Endpoint value supplied by the caller.
        endpoint: String,
    },
    /// Raised when the HTTP client cannot be built.
    #[error("failed to build HTTP client: {message}")]
    Http {
        /// Message reported by `reqwest`.
        message: String,
    },
}

impl From<reqwest::Error> for OvhClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http {
            message: value.to_string(),
        }
    }
}
