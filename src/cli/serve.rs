//! Serve command: HTTP trigger for sync runs

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use portal_sync::config::Config;
use portal_sync::remote::PortalClient;
use portal_sync::server::{ControlApiState, ControlServer};
use portal_sync::sync::SyncService;

use super::open_store;

pub async fn serve_command(config_path: Option<&Path>, port: Option<u16>) -> Result<()> {
    let config = Config::load(config_path)?;
    config.ensure_valid()?;

    let store = Arc::new(open_store(&config)?);
    let portal = Arc::new(PortalClient::new(config.portal.clone()));
    let state = ControlApiState {
        service: Arc::new(SyncService::new(portal, store, &config.sync)),
        runtime: tokio::runtime::Handle::current(),
        shutdown: CancellationToken::new(),
    };

    let bind_addr = format!("127.0.0.1:{}", port.unwrap_or(config.server.port));
    let server = ControlServer::start(
        &bind_addr,
        Some(config.server.auth_token.clone()),
        state.clone(),
    )?;
    println!("Listening on http://{} (Ctrl-C to stop)", server.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("[portal-sync:http] Shutting down");
    state.shutdown.cancel();
    tokio::task::spawn_blocking(move || server.shutdown())
        .await
        .context("Control server did not shut down cleanly")?;
    Ok(())
}
