//! Portal credentials and the cached bearer token

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::RemoteError;
use crate::config::PortalCredentials;

/// Tokens are refreshed this long before the portal says they expire
const EXPIRY_SKEW_SECS: i64 = 30;

/// Bearer token issued by the portal
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Token valid for `ttl_secs` from now
    pub fn expiring_in(value: impl Into<String>, ttl_secs: i64) -> Self {
        Self::new(value, Utc::now() + Duration::seconds(ttl_secs))
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credentials plus the token cache shared by every request of a client.
///
/// The cache lock is held while a refresh is in flight, so concurrent callers
/// wait for that refresh and reuse its token instead of authenticating again.
pub struct AuthContext {
    credentials: PortalCredentials,
    cached: Mutex<Option<AccessToken>>,
}

impl AuthContext {
    pub fn new(credentials: PortalCredentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &PortalCredentials {
        &self.credentials
    }

    /// Cached token if still fresh, otherwise the result of `refresh`
    pub async fn token_or_refresh<F, Fut>(&self, refresh: F) -> Result<AccessToken, RemoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, RemoteError>>,
    {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh_at(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let token = refresh().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Forget `stale` after the portal rejected it. A token that another
    /// caller already refreshed in the meantime is kept.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref() == Some(stale) {
            *cached = None;
        }
    }
}
