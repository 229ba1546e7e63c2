//! Listing portal connection settings

use serde::{Deserialize, Serialize};

/// Credentials exchanged for a bearer token
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PortalCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Full URL of the token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// How the portal expects a listing or user to be taken offline.
///
/// The portal's documentation does not settle this, so it is configured
/// instead of hard-coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationStyle {
    /// `DELETE {path}/{id}`
    Delete,
    /// `PATCH {path}/{id}` with `{ <status_field>: <status_value> }`
    #[default]
    PatchStatus,
    /// `POST {path}/{id}/{action}`
    PostAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivationSettings {
    #[serde(default)]
    pub style: DeactivationStyle,
    #[serde(default = "default_status_field")]
    pub status_field: String,
    #[serde(default = "default_status_value")]
    pub status_value: String,
    #[serde(default = "default_action")]
    pub action: String,
}

impl Default for DeactivationSettings {
    fn default() -> Self {
        Self {
            style: DeactivationStyle::default(),
            status_field: default_status_field(),
            status_value: default_status_value(),
            action: default_action(),
        }
    }
}

/// Retry schedule for transport errors, timeouts and 5xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// API root, e.g. `https://atlas.propertyfinder.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_listings_path")]
    pub listings_path: String,

    #[serde(default = "default_agents_path")]
    pub agents_path: String,

    /// Per-request timeout (connect + read)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub deactivation: DeactivationSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub credentials: PortalCredentials,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listings_path: default_listings_path(),
            agents_path: default_agents_path(),
            timeout_secs: default_timeout_secs(),
            deactivation: DeactivationSettings::default(),
            retry: RetrySettings::default(),
            credentials: PortalCredentials {
                token_url: default_token_url(),
                ..Default::default()
            },
        }
    }
}

fn default_base_url() -> String {
    "https://atlas.propertyfinder.com".to_string()
}

fn default_token_url() -> String {
    "https://atlas.propertyfinder.com/v1/auth/token".to_string()
}

fn default_listings_path() -> String {
    "/v1/listings".to_string()
}

fn default_agents_path() -> String {
    "/v1/users".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_status_field() -> String {
    "status".to_string()
}

fn default_status_value() -> String {
    "inactive".to_string()
}

fn default_action() -> String {
    "unpublish".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_backoff_factor() -> u32 {
    4
}
