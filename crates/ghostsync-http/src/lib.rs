//! # ghostsync-http
//!
//! The network surface of ghostsync: a discovery endpoint on a fixed port and
//! one WebSocket channel per editing session.
//!
//! ```text
//! client                       discovery (:4001)            channel (:ephemeral)
//!   | ---- any request ------------> |                              |
//!   |                                | -- bind ephemeral port ----> |
//!   | <--- {"ProtocolVersion":1, "WebSocketPort":N} --              |
//!   | ---- WebSocket upgrade ---------------------------------------> | Session
//!   | <=== SyncMessage frames, both directions ====================> |
//! ```

mod channel;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{DiscoveryBindError, ServerError};
pub use state::{SessionInfo, SharedState};

use ghostsync_core::EditorHost;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Handle to a running discovery server.
///
/// Dropping the handle without calling [`stop`](Self::stop) still signals
/// shutdown, but does not wait for it.
pub struct DiscoveryServerHandle {
    local_addr: SocketAddr,
    state: Arc<SharedState>,
    task: Option<JoinHandle<()>>,
}

impl DiscoveryServerHandle {
    /// Address the discovery endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Number of sessions with a connected channel.
    pub fn active_sessions(&self) -> usize {
        self.state.registry.len()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.state.registry.list()
    }

    /// Stop accepting discovery requests, close idle channels, end every
    /// session, and wait for the discovery listener to shut down.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.state.request_shutdown();
            if let Err(e) = task.await {
                log::warn!("Discovery server task failed: {}", e);
            }
        }
    }
}

impl Drop for DiscoveryServerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.state.request_shutdown();
        }
    }
}

/// Start the discovery server.
///
/// The discovery port is bound before this returns, so a port conflict is
/// reported here rather than logged from a background task.
pub async fn start(
    config: ServerConfig,
    host: Arc<dyn EditorHost>,
) -> Result<DiscoveryServerHandle, ServerError> {
    let shared = Arc::new(SharedState::new(host, config)?);
    let addr = SocketAddr::new(shared.bind_ip, shared.config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let app = routes::router(Arc::clone(&shared));
    let shutdown = shared.shutdown_signal();

    log::info!("GhostText discovery listening on http://{}", local_addr);

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                state::shutdown_requested(shutdown).await;
                log::info!("Discovery server shutting down");
            })
            .await;
        if let Err(e) = result {
            log::error!("Discovery server failed: {}", e);
        }
    });

    Ok(DiscoveryServerHandle {
        local_addr,
        state: shared,
        task: Some(task),
    })
}

// ============================================================================
// TESTS
// ============================================================================
