//! The discovery endpoint.
//!
//! Every request, whatever its method or path, opens a fresh session channel
//! and answers with the port it listens on.

use axum::{
    extract::State,
    http::{Method, Uri},
    response::Json,
    Router,
};
use ghostsync_core::DiscoveryResponse;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::channel;
use crate::error::DiscoveryBindError;
use crate::state::SharedState;

/// Build the discovery router.
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .fallback(discovery_handler)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Handler for any request on the discovery port.
pub async fn discovery_handler(
    method: Method,
    uri: Uri,
    State(state): State<Arc<SharedState>>,
) -> Result<Json<DiscoveryResponse>, DiscoveryBindError> {
    log::debug!("Discovery request: {} {}", method, uri);

    let port = channel::open(Arc::clone(&state)).await?;
    log::info!("Session channel listening on port {}", port);

    Ok(Json(DiscoveryResponse::new(port)))
}
