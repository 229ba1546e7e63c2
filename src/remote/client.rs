//! HTTP client for the listing portal.
//!
//! ureq is blocking, so each request runs on tokio's blocking pool. Retry,
//! backoff and token handling stay on the async side.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AccessToken, AuthContext, RemoteAck, RemoteError, RemotePortal, RetryPolicy};
use crate::config::{DeactivationStyle, PortalConfig};
use crate::mapper::{AgentPayload, ListingPayload, from_remote_response};

/// Longest response excerpt carried in an error
const MAX_DETAIL_CHARS: usize = 512;

/// Token lifetime assumed when the portal does not state one
const DEFAULT_TOKEN_TTL_SECS: i64 = 1800;

fn encode_url_path_segment(segment: &str) -> String {
    // RFC3986 unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
    let mut out = String::with_capacity(segment.len());
    for &b in segment.as_bytes() {
        let is_unreserved =
            matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~');
        if is_unreserved {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Listing,
    Agent,
}

impl Resource {
    fn label(&self) -> &'static str {
        match self {
            Resource::Listing => "listing",
            Resource::Agent => "user",
        }
    }
}

/// A portal response of any status
#[derive(Debug, Clone)]
struct WireResponse {
    status: u16,
    body: Value,
    text: String,
}

impl WireResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Statuses worth another attempt with the same request
    fn is_transient(&self) -> bool {
        self.status >= 500 || self.status == 408 || self.status == 429
    }

    /// Human-readable rejection reason from the body
    fn detail(&self) -> String {
        for key in ["message", "detail", "error", "title"] {
            if let Some(text) = self.body.get(key).and_then(Value::as_str) {
                return truncate(text);
            }
        }
        if let Some(errors) = self.body.get("errors") {
            return truncate(&errors.to_string());
        }
        if self.text.trim().is_empty() {
            format!("HTTP {}", self.status)
        } else {
            truncate(self.text.trim())
        }
    }

    fn rejection(&self) -> RemoteError {
        RemoteError::Validation {
            status: self.status,
            detail: self.detail(),
        }
    }

    /// Portal wording for "nothing to deactivate"
    fn says_already_inactive(&self) -> bool {
        let text = self.text.to_ascii_lowercase();
        text.contains("already")
            && ["inactive", "deactivated", "unpublished", "archived", "disabled"]
                .iter()
                .any(|word| text.contains(word))
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_DETAIL_CHARS).collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: String,
    #[serde(rename = "expiresIn", alias = "expires_in", default)]
    expires_in: Option<i64>,
}

/// Production [`RemotePortal`] backed by the portal's REST API
pub struct PortalClient {
    http: ureq::Agent,
    config: PortalConfig,
    auth: Arc<AuthContext>,
    retry: RetryPolicy,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        let retry = RetryPolicy::from(&config.retry);
        let auth = Arc::new(AuthContext::new(config.credentials.clone()));

        Self {
            http,
            config,
            auth,
            retry,
        }
    }

    /// Override the retry schedule from the config
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn collection_url(&self, resource: Resource) -> String {
        let path = match resource {
            Resource::Listing => &self.config.listings_path,
            Resource::Agent => &self.config.agents_path,
        };
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_matches('/')
        )
    }

    fn record_url(&self, resource: Resource, remote_id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(resource),
            encode_url_path_segment(remote_id)
        )
    }

    /// One HTTP exchange. Non-2xx statuses are returned, not raised.
    async fn execute_once(
        &self,
        method: &'static str,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<WireResponse, RemoteError> {
        let http = self.http.clone();
        let url = url.to_string();
        let authorization = bearer.map(|token| format!("Bearer {}", token));
        let body = body.cloned();

        tokio::task::spawn_blocking(move || {
            let mut request = http.request(method, &url).set("Accept", "application/json");
            if let Some(value) = authorization.as_deref() {
                request = request.set("Authorization", value);
            }

            let result = match body {
                Some(body) => request.send_json(body),
                None => request.call(),
            };

            match result {
                Ok(response) | Err(ureq::Error::Status(_, response)) => read_response(response),
                Err(ureq::Error::Transport(transport)) => {
                    Err(RemoteError::Unavailable(transport.to_string()))
                }
            }
        })
        .await
        .map_err(|e| RemoteError::Unavailable(format!("request task failed: {}", e)))?
    }

    /// [`Self::execute_once`] with backoff on transient failures
    async fn execute_with_retry(
        &self,
        method: &'static str,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<WireResponse, RemoteError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            let outcome = self.execute_once(method, url, bearer, body).await;
            let retryable = match &outcome {
                Ok(response) => response.is_transient(),
                Err(err) => err.is_retryable(),
            };

            if retryable && attempt < max_attempts {
                let delay = self.retry.delay_for(attempt);
                let reason = match &outcome {
                    Ok(response) => format!("HTTP {}", response.status),
                    Err(err) => err.to_string(),
                };
                warn!(
                    "[portal-sync:remote] {} {} attempt {}/{} failed ({}), retrying in {:?}",
                    method, url, attempt, max_attempts, reason, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return match outcome {
                Ok(response) if response.is_transient() => Err(RemoteError::Unavailable(format!(
                    "HTTP {} after {} attempt(s): {}",
                    response.status,
                    attempt,
                    response.detail()
                ))),
                other => other,
            };
        }
    }

    async fn fetch_token(&self) -> Result<AccessToken, RemoteError> {
        let creds = self.auth.credentials();
        let body = serde_json::json!({
            "apiKey": creds.api_key,
            "apiSecret": creds.api_secret,
        });

        let response = match self
            .execute_with_retry("POST", &creds.token_url, None, Some(&body))
            .await
        {
            Ok(response) => response,
            Err(RemoteError::Unavailable(detail)) => {
                return Err(RemoteError::Authentication(format!(
                    "token endpoint unavailable: {}",
                    detail
                )));
            }
            Err(err) => return Err(err),
        };

        if !response.is_success() {
            return Err(RemoteError::Authentication(format!(
                "token request rejected (HTTP {}): {}",
                response.status,
                response.detail()
            )));
        }

        let token: TokenResponse = serde_json::from_value(response.body).map_err(|e| {
            RemoteError::Authentication(format!("unexpected token response: {}", e))
        })?;
        debug!("[portal-sync:remote] Obtained access token");
        Ok(AccessToken::expiring_in(
            token.access_token,
            token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        ))
    }

    async fn current_token(&self) -> Result<AccessToken, RemoteError> {
        self.auth.token_or_refresh(|| self.fetch_token()).await
    }

    /// Authenticated request; a 401 triggers exactly one re-authentication.
    async fn send_authorized(
        &self,
        method: &'static str,
        url: &str,
        body: Option<&Value>,
    ) -> Result<WireResponse, RemoteError> {
        let token = self.current_token().await?;
        let response = self
            .execute_with_retry(method, url, Some(token.secret()), body)
            .await?;
        if response.status != 401 {
            return Ok(response);
        }

        debug!("[portal-sync:remote] Token rejected by {} {}, re-authenticating", method, url);
        self.auth.invalidate(&token).await;
        let token = self.current_token().await?;
        let response = self
            .execute_with_retry(method, url, Some(token.secret()), body)
            .await?;
        if response.status == 401 {
            return Err(RemoteError::Authentication(
                "portal rejected a freshly issued token".to_string(),
            ));
        }
        Ok(response)
    }

    async fn create(&self, resource: Resource, payload: Value) -> Result<RemoteAck, RemoteError> {
        let url = self.collection_url(resource);
        let response = self.send_authorized("POST", &url, Some(&payload)).await?;
        if !response.is_success() {
            return Err(response.rejection());
        }

        let fields = from_remote_response(&response.body);
        let remote_id = fields.remote_id.ok_or_else(|| RemoteError::Validation {
            status: response.status,
            detail: format!("created {} but the response carried no id", resource.label()),
        })?;
        debug!("[portal-sync:remote] Created {} {}", resource.label(), remote_id);

        Ok(RemoteAck {
            remote_id,
            verification: fields.verification,
        })
    }

    async fn update(
        &self,
        resource: Resource,
        remote_id: &str,
        payload: Value,
    ) -> Result<RemoteAck, RemoteError> {
        let url = self.record_url(resource, remote_id);
        let response = self.send_authorized("PUT", &url, Some(&payload)).await?;

        match response.status {
            404 | 410 => Err(RemoteError::NotFound {
                remote_id: remote_id.to_string(),
            }),
            _ if response.is_success() => {
                let fields = from_remote_response(&response.body);
                Ok(RemoteAck {
                    remote_id: fields.remote_id.unwrap_or_else(|| remote_id.to_string()),
                    verification: fields.verification,
                })
            }
            _ => Err(response.rejection()),
        }
    }

    async fn deactivate(&self, resource: Resource, remote_id: &str) -> Result<(), RemoteError> {
        let record = self.record_url(resource, remote_id);
        let settings = &self.config.deactivation;

        let response = match settings.style {
            DeactivationStyle::Delete => self.send_authorized("DELETE", &record, None).await?,
            DeactivationStyle::PatchStatus => {
                let mut body = serde_json::Map::new();
                body.insert(
                    settings.status_field.clone(),
                    Value::String(settings.status_value.clone()),
                );
                self.send_authorized("PATCH", &record, Some(&Value::Object(body)))
                    .await?
            }
            DeactivationStyle::PostAction => {
                let url = format!("{}/{}", record, encode_url_path_segment(&settings.action));
                self.send_authorized("POST", &url, None).await?
            }
        };

        if response.is_success() {
            debug!("[portal-sync:remote] Deactivated {} {}", resource.label(), remote_id);
            return Ok(());
        }
        // A bare 409 (locked, under review) is a rejection.
        if matches!(response.status, 404 | 410) || response.says_already_inactive() {
            debug!(
                "[portal-sync:remote] {} {} already inactive (HTTP {})",
                resource.label(),
                remote_id,
                response.status
            );
            return Ok(());
        }
        Err(response.rejection())
    }
}

fn read_response(response: ureq::Response) -> Result<WireResponse, RemoteError> {
    let status = response.status();
    let text = response
        .into_string()
        .map_err(|e| RemoteError::Unavailable(format!("failed to read response body: {}", e)))?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::Null)
    };
    Ok(WireResponse { status, body, text })
}

fn encode<T: serde::Serialize>(payload: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(payload).map_err(|e| RemoteError::Validation {
        status: 0,
        detail: format!("payload could not be encoded: {}", e),
    })
}

#[async_trait]
impl RemotePortal for PortalClient {
    async fn authenticate(&self) -> Result<AccessToken, RemoteError> {
        self.current_token().await
    }

    async fn create_listing(&self, payload: &ListingPayload) -> Result<RemoteAck, RemoteError> {
        self.create(Resource::Listing, encode(payload)?).await
    }

    async fn update_listing(
        &self,
        remote_id: &str,
        payload: &ListingPayload,
    ) -> Result<RemoteAck, RemoteError> {
        self.update(Resource::Listing, remote_id, encode(payload)?)
            .await
    }

    async fn deactivate_listing(&self, remote_id: &str) -> Result<(), RemoteError> {
        self.deactivate(Resource::Listing, remote_id).await
    }

    async fn create_agent(&self, payload: &AgentPayload) -> Result<RemoteAck, RemoteError> {
        self.create(Resource::Agent, encode(payload)?).await
    }

    async fn update_agent(
        &self,
        remote_id: &str,
        payload: &AgentPayload,
    ) -> Result<RemoteAck, RemoteError> {
        self.update(Resource::Agent, remote_id, encode(payload)?).await
    }

    async fn deactivate_agent(&self, remote_id: &str) -> Result<(), RemoteError> {
        self.deactivate(Resource::Agent, remote_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> WireResponse {
        WireResponse {
            status,
            text: body.to_string(),
            body,
        }
    }

    #[test]
    fn test_urls() {
        let mut config = PortalConfig::default();
        config.base_url = "https://portal.test/".to_string();
        config.agents_path = "/v1/users/".to_string();
        let client = PortalClient::new(config);

        assert_eq!(
            client.collection_url(Resource::Listing),
            "https://portal.test/v1/listings"
        );
        assert_eq!(
            client.record_url(Resource::Agent, "a b/c"),
            "https://portal.test/v1/users/a%20b%2Fc"
        );
    }

    #[test]
    fn test_rejection_detail_prefers_message() {
        let rejected = response(422, json!({ "message": "price must be positive" }));
        assert_eq!(
            rejected.rejection(),
            RemoteError::Validation {
                status: 422,
                detail: "price must be positive".to_string()
            }
        );

        let errors = response(400, json!({ "errors": [{ "field": "title" }] }));
        assert!(errors.detail().contains("title"));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(response(503, Value::Null).is_transient());
        assert!(response(429, Value::Null).is_transient());
        assert!(!response(422, Value::Null).is_transient());
    }

    #[test]
    fn test_already_inactive_wording() {
        let body = json!({ "message": "Listing is already unpublished" });
        assert!(response(400, body).says_already_inactive());
        assert!(!response(400, json!({ "message": "bad id" })).says_already_inactive());
    }
}
