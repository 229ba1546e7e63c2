//! Listing portal integration.
//!
//! Everything HTTP-shaped about the portal lives in this module. The rest of
//! the engine talks to the portal only through the [`RemotePortal`] trait:
//!
//! - [`PortalClient`] is the production implementation (ureq over
//!   `spawn_blocking`, bearer token cache, retry with backoff).
//! - Tests substitute their own implementation to script portal behaviour.
//!
//! # Failure model
//!
//! | Portal answer                     | Result                              |
//! |-----------------------------------|-------------------------------------|
//! | 2xx                               | `Ok`                                |
//! | 401                               | re-authenticate once, then retry    |
//! | 404/410 on update                 | [`RemoteError::NotFound`]           |
//! | other 4xx                         | [`RemoteError::Validation`]         |
//! | 5xx, 408, 429, timeout, transport | retried, then `Unavailable`         |
//! | token endpoint failure            | [`RemoteError::Authentication`]     |

mod auth;
mod client;
mod error;
mod retry;

pub use auth::{AccessToken, AuthContext};
pub use client::PortalClient;
pub use error::RemoteError;
pub use retry::RetryPolicy;

use async_trait::async_trait;

use crate::domain::{RemoteId, VerificationStatus};
use crate::mapper::{AgentPayload, ListingPayload};

/// What the portal reported back after a create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAck {
    pub remote_id: RemoteId,
    /// Review status, when the portal included one
    pub verification: Option<VerificationStatus>,
}

/// Operations the reconciler needs from the listing portal
#[async_trait]
pub trait RemotePortal: Send + Sync {
    /// Obtain (or reuse) a bearer token
    async fn authenticate(&self) -> Result<AccessToken, RemoteError>;

    async fn create_listing(&self, payload: &ListingPayload) -> Result<RemoteAck, RemoteError>;

    async fn update_listing(
        &self,
        remote_id: &str,
        payload: &ListingPayload,
    ) -> Result<RemoteAck, RemoteError>;

    /// Idempotent: an already inactive listing is not an error
    async fn deactivate_listing(&self, remote_id: &str) -> Result<(), RemoteError>;

    async fn create_agent(&self, payload: &AgentPayload) -> Result<RemoteAck, RemoteError>;

    async fn update_agent(
        &self,
        remote_id: &str,
        payload: &AgentPayload,
    ) -> Result<RemoteAck, RemoteError>;

    /// Idempotent: an already inactive user is not an error
    async fn deactivate_agent(&self, remote_id: &str) -> Result<(), RemoteError>;
}
