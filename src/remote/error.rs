/// Failures of a single portal operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The portal rejected the payload (4xx). Deterministic, never retried.
    #[error("portal rejected the request (HTTP {status}): {detail}")]
    Validation { status: u16, detail: String },

    /// The portal record no longer exists; local state is stale.
    #[error("portal record {remote_id} no longer exists")]
    NotFound { remote_id: String },

    /// Transport failure, timeout or 5xx after retries were exhausted.
    #[error("portal unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected or a token could not be obtained. Run-fatal.
    #[error("portal authentication failed: {0}")]
    Authentication(String),
}

impl RemoteError {
    /// Whether a retry of the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, RemoteError::Authentication(_))
    }
}
