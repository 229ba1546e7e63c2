//! Engine, server and store settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reconciler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Entities processed in parallel. 1 means strictly sequential.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Publish agents before properties when syncing everything, so listings
    /// can reference their agent's portal id.
    #[serde(default = "default_agents_first")]
    pub agents_first: bool,
}

/// Local control API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token required in `X-Portal-Sync-Token`. Empty disables auth.
    #[serde(default)]
    pub auth_token: String,
}

/// Local entity store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file; defaults to `~/.portal-sync/crm.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_workers() -> usize {
    1
}

fn default_agents_first() -> bool {
    true
}

fn default_port() -> u16 {
    9877
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            agents_first: default_agents_first(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_token: String::new(),
        }
    }
}
