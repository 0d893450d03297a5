//! HTTP server setup

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::BridgeError;
use crate::server::handlers::callback_handler;
use crate::server::state::ServerState;

/// Callback router; the device picks the path, so every path is handled
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(callback_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), BridgeError>>, BridgeError> {
    let app = router(state);

    let addr = (options.bind_host(), options.port);
    info!("Starting callback server on {} port {}", addr.0, addr.1);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::Server(format!("bind {} port {}: {}", addr.0, addr.1, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| BridgeError::Server(e.to_string()))
    });

    Ok(handle)
}
