//! HTTP request handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use http::{Method, StatusCode, Uri};
use tracing::{debug, warn};

use crate::server::events::{dispatch, parse_callback};
use crate::server::state::ServerState;

/// Callback handler for every path
pub async fn callback_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> StatusCode {
    if !state.accepts(remote.ip()) {
        debug!("Rejected callback from {}", remote);
        return StatusCode::UNAUTHORIZED;
    }
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    match parse_callback(&uri) {
        Ok(Some(trigger)) => dispatch(&state, trigger).await,
        Ok(None) => debug!("Ignoring callback {}", uri),
        Err(e) => warn!("Ignoring callback {}: {}", uri, e),
    }
    StatusCode::NO_CONTENT
}
