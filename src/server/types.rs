//! Type definitions for the control API.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::sync::SyncService;

const DEFAULT_RUNS_LIMIT: usize = 20;
const MAX_RUNS_LIMIT: usize = 200;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct ControlApiState {
    pub service: Arc<SyncService>,
    /// Runtime the (async) reconciler runs on
    pub runtime: tokio::runtime::Handle,
    /// Cancelled on server shutdown; in-flight runs stop between entities
    pub shutdown: CancellationToken,
}

/// `?limit=N` of `GET /sync/runs`
pub(super) fn runs_limit(query: &str) -> Result<usize, String> {
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key == "limit" {
            let limit: usize = value
                .parse()
                .map_err(|_| format!("invalid limit '{}'", value))?;
            return Ok(limit.clamp(1, MAX_RUNS_LIMIT));
        }
    }
    Ok(DEFAULT_RUNS_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_limit() {
        assert_eq!(runs_limit(""), Ok(DEFAULT_RUNS_LIMIT));
        assert_eq!(runs_limit("limit=5"), Ok(5));
        assert_eq!(runs_limit("x=1&limit=100000"), Ok(MAX_RUNS_LIMIT));
        assert!(runs_limit("limit=abc").is_err());
    }
}
