//! Sync sessions.
//!
//! A session is one editing handoff: it binds the remote text to a local
//! document on the first inbound message, mirrors remote updates into the
//! document, reports local edits back after a debounce window, and tears
//! everything down when either side goes away.

mod binding;
mod debounce;
mod echo;
mod machine;

pub use binding::{DocumentBinding, DocumentSubscriptions};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use echo::EchoSuppressor;
pub use machine::Session;

use crate::host::EditorHostError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet window before a local edit is sent to the remote peer.
    pub debounce_window: Duration,
    /// Directory for wire transcripts; `None` disables them.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            transcript_dir: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Malformed sync message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Editor host failed: {0}")]
    EditorHost(#[from] EditorHostError),
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no document yet.
    Unbound,
    /// Document open and in sync.
    Bound,
    /// Torn down. Terminal.
    Closed,
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote peer closed the channel.
    ChannelClosed,
    /// The user closed the bound document.
    DocumentClosed,
    /// The server is shutting down.
    Shutdown,
}

/// Transport side of a session: inbound text frames, outbound text frames,
/// and an optional shutdown signal.
///
/// The session closes the channel by dropping `outbound` when it ends.
#[derive(Debug)]
pub struct SessionChannel {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<String>,
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl SessionChannel {
    pub fn new(inbound: mpsc::Receiver<String>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            inbound,
            outbound,
            shutdown: None,
        }
    }

    /// End the session once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}
