//! Shared state for the discovery server and its session channels.

use crate::config::ServerConfig;
use crate::error::ServerError;
use ghostsync_core::{EditorHost, SessionId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

/// A live session, as seen by the server.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    /// Port of the channel the session connected on.
    pub port: u16,
    pub connected_at: Instant,
}

/// Tracks live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionInfo>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: SessionId, port: u16) {
        let info = SessionInfo {
            id: id.clone(),
            port,
            connected_at: Instant::now(),
        };
        self.lock().insert(id, info);
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionInfo> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared state available to all handlers.
pub struct SharedState {
    pub host: Arc<dyn EditorHost>,
    pub config: ServerConfig,
    /// Interface every session channel binds to, parsed once from `config.host`.
    pub bind_ip: IpAddr,
    pub registry: SessionRegistry,
    shutdown: watch::Sender<bool>,
}

impl SharedState {
    pub fn new(host: Arc<dyn EditorHost>, config: ServerConfig) -> Result<Self, ServerError> {
        let bind_ip = config.ip()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            host,
            config,
            bind_ip,
            registry: SessionRegistry::new(),
            shutdown,
        })
    }

    /// Ask the server, every channel listener and every session to stop.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Resolves once shutdown has been requested.
pub async fn shutdown_requested(mut signal: watch::Receiver<bool>) {
    // Err means the sender is gone, which only happens once the state itself is dropped.
    let _ = signal.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghostsync_core::MemoryEditorHost;

    mod registry {
        use super::*;

        #[test]
        fn insert_and_remove() {
            let registry = SessionRegistry::new();
            assert!(registry.is_empty());

            let id = SessionId::new();
            registry.insert(id.clone(), 5000);
            assert_eq!(registry.len(), 1);
            assert_eq!(registry.list()[0].port, 5000);

            let removed = registry.remove(&id).unwrap();
            assert_eq!(removed.id, id);
            assert!(registry.is_empty());
            assert!(registry.remove(&id).is_none());
        }
    }

    mod shared_state {
        use super::*;

        #[tokio::test]
        async fn shutdown_reaches_existing_and_late_subscribers() {
            let state =
                SharedState::new(Arc::new(MemoryEditorHost::new()), ServerConfig::default()).unwrap();
            let early = state.shutdown_signal();
            assert!(!state.is_shutting_down());

            state.request_shutdown();
            assert!(state.is_shutting_down());

            shutdown_requested(early).await;
            shutdown_requested(state.shutdown_signal()).await;
        }

        #[test]
        fn host_is_parsed_once_up_front() {
            let config = ServerConfig {
                host: "::1".to_string(),
                ..ServerConfig::default()
            };
            let state = SharedState::new(Arc::new(MemoryEditorHost::new()), config).unwrap();
            assert_eq!(state.bind_ip, "::1".parse::<IpAddr>().unwrap());

            let invalid = ServerConfig {
                host: "not an ip".to_string(),
                ..ServerConfig::default()
            };
            assert!(matches!(
                SharedState::new(Arc::new(MemoryEditorHost::new()), invalid),
                Err(ServerError::InvalidAddress(_))
            ));
        }
    }
}
