//! Request handlers for the control API.

use tracing::{error, info, warn};

use super::respond_json;
use super::types::{ControlApiState, runs_limit};
use crate::sync::{SyncError, SyncRequest};

pub fn handle_health(request: tiny_http::Request) {
    respond_json(
        request,
        200,
        serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
    );
}

/// POST /sync/run: reconcile and answer with the finished run
pub fn handle_sync_run(control: &ControlApiState, body: &str, request: tiny_http::Request) {
    let sync_request: SyncRequest = if body.trim().is_empty() {
        SyncRequest::default()
    } else {
        match serde_json::from_str(body) {
            Ok(req) => req,
            Err(e) => {
                respond_json(
                    request,
                    400,
                    serde_json::json!({ "error": "invalid_json", "details": e.to_string() }),
                );
                return;
            }
        }
    };

    info!(
        "[portal-sync:http] Sync triggered: type={:?}, ids={}, force={}",
        sync_request.entity_type,
        sync_request.ids.len(),
        sync_request.force
    );

    let cancel = control.shutdown.child_token();
    let outcome = control
        .runtime
        .block_on(control.service.run(&sync_request, &cancel));

    match outcome {
        Ok(run) => match serde_json::to_value(&run) {
            Ok(value) => respond_json(request, 200, value),
            Err(e) => {
                error!("[portal-sync:http] Failed to serialize run {}: {}", run.id, e);
                respond_json(request, 500, serde_json::json!({ "error": "serialize" }));
            }
        },
        Err(SyncError::Authentication(err)) => {
            warn!("[portal-sync:http] Sync aborted: {}", err);
            respond_json(
                request,
                502,
                serde_json::json!({ "error": "authentication_failed", "details": err.to_string() }),
            );
        }
        Err(err @ SyncError::Store(_)) => {
            error!("[portal-sync:http] Sync aborted: {}", err);
            respond_json(
                request,
                500,
                serde_json::json!({ "error": "store_error", "details": err.to_string() }),
            );
        }
    }
}

/// GET /sync/runs?limit=N
pub fn handle_sync_runs(control: &ControlApiState, query: &str, request: tiny_http::Request) {
    let limit = match runs_limit(query) {
        Ok(limit) => limit,
        Err(err) => {
            respond_json(request, 400, serde_json::json!({ "error": err }));
            return;
        }
    };

    match control.service.store().recent_runs(limit) {
        Ok(runs) => respond_json(request, 200, serde_json::json!({ "runs": runs })),
        Err(e) => {
            error!("[portal-sync:http] Failed to list runs: {:#}", e);
            respond_json(
                request,
                500,
                serde_json::json!({ "error": "store_error", "details": format!("{:#}", e) }),
            );
        }
    }
}
