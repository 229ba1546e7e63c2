//! Local control API for triggering sync runs
//!
//! Listens on localhost and accepts:
//! - POST /sync/run - Run a sync and return its summary (synchronous)
//! - GET /sync/runs - Recent runs from the audit log
//! - GET /health - Liveness probe (no token required)
//!
//! Requests are served one at a time on a dedicated thread, so two triggers
//! never reconcile the same entities concurrently.

mod handlers;
mod types;

pub use types::ControlApiState;

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tiny_http::{Response, Server};
use tracing::{error, info, warn};

const AUTH_HEADER: &str = "X-Portal-Sync-Token";
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Running control server; dropped or shut down to stop listening
pub struct ControlServer {
    server: Arc<Server>,
    addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind `bind_addr` (e.g. `127.0.0.1:9877`) and start serving requests
    pub fn start(bind_addr: &str, auth_token: Option<String>, state: ControlApiState) -> Result<Self> {
        let server = Server::http(bind_addr)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to start control server on {}", bind_addr))?;
        let addr = server
            .server_addr()
            .to_ip()
            .with_context(|| format!("Control server on {} has no IP address", bind_addr))?;

        let auth_token = auth_token.filter(|t| !t.trim().is_empty());
        info!(
            "[portal-sync:http] Server listening on http://{} (auth: {})",
            addr,
            if auth_token.is_some() { "enabled" } else { "disabled" }
        );

        let server = Arc::new(server);
        let worker = server.clone();
        let thread = thread::Builder::new()
            .name("portal-sync-http".to_string())
            .spawn(move || serve(&worker, auth_token.as_deref(), &state))
            .context("Failed to spawn control server thread")?;

        Ok(Self {
            server,
            addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for the current one to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[portal-sync:http] Server thread panicked");
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(server: &Server, auth_token: Option<&str>, state: &ControlApiState) {
    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (url.clone(), String::new()),
        };

        if path == "/health" && method == "GET" {
            handlers::handle_health(request);
            continue;
        }

        if !is_authorized(&request, auth_token) {
            warn!("[portal-sync:http] Rejected unauthorized {} {}", method, path);
            respond_json(request, 401, serde_json::json!({ "error": "unauthorized" }));
            continue;
        }

        match (method.as_str(), path.as_str()) {
            ("POST", "/sync/run") => {
                let body = match read_request_body(&mut request) {
                    Ok(body) => body,
                    Err(response) => {
                        let _ = request.respond(response);
                        continue;
                    }
                };
                handlers::handle_sync_run(state, &body, request);
            }
            ("GET", "/sync/runs") => handlers::handle_sync_runs(state, &query, request),
            (_, "/sync/run") | (_, "/sync/runs") => {
                respond_json(request, 405, serde_json::json!({ "error": "method_not_allowed" }));
            }
            _ => respond_json(request, 404, serde_json::json!({ "error": "not_found" })),
        }
    }
}

fn is_authorized(request: &tiny_http::Request, auth_token: Option<&str>) -> bool {
    let Some(expected) = auth_token else {
        return true;
    };
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(AUTH_HEADER))
        .map(|h| h.value.as_str() == expected)
        .unwrap_or(false)
}

fn json_response(body: impl Into<String>, status_code: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body.into()).with_status_code(status_code);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn read_request_body(
    request: &mut tiny_http::Request,
) -> Result<String, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    if let Err(e) = reader.read_to_string(&mut body) {
        error!("[portal-sync:http] Failed to read body: {}", e);
        return Err(json_response("{\"error\":\"bad_request\"}", 400));
    }

    if body.len() > MAX_BODY_BYTES {
        return Err(json_response("{\"error\":\"payload_too_large\"}", 413));
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: serde_json::Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let _ = request.respond(json_response(body, status_code));
}
