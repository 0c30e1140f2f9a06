//! Error taxonomy for release resolution.

use rollgate_core::ArtifactKind;
use rollgate_state::StateError;
use rollgate_storage::StorageError;
use thiserror::Error;

/// Result type for release engine operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Boxed upstream cause carried by [`ReleaseError::Upstream`].
pub type UpstreamCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A required parameter is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No matching version, SKU or artifact.
    #[error("not found: {0}")]
    NotFound(String),

    /// Artifact bytes do not hash to the published digest. Never retried.
    #[error("integrity check failed: {reason} (expected {expected}, got {actual})")]
    IntegrityFailure {
        reason: String,
        expected: String,
        actual: String,
    },

    /// Object store, release store or task failure not otherwise classified.
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: UpstreamCause,
    },

    /// No release of a kind has reached 100%; the server is misconfigured.
    #[error("no fully rolled out {0} release is configured")]
    NoDefaultRelease(ArtifactKind),
}

impl ReleaseError {
    pub fn upstream(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ReleaseError::Upstream {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Classify an object store failure; missing objects stay `NotFound`.
    pub fn storage(context: impl Into<String>, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ReleaseError::NotFound(format!("object {key} not found")),
            StorageError::InvalidKey(key) => ReleaseError::InvalidInput(format!("invalid object key {key}")),
            other => Self::upstream(context, other),
        }
    }

    /// Classify a release store failure.
    pub fn state(context: impl Into<String>, err: StateError) -> Self {
        match err {
            StateError::NotFound(key) => ReleaseError::NotFound(format!("release {key} not found")),
            StateError::Invalid(msg) => ReleaseError::InvalidInput(msg),
            other => Self::upstream(context, other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReleaseError::NotFound(_))
    }
}
