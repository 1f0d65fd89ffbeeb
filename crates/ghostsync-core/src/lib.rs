//! # ghostsync-core
//!
//! Sync engine for the GhostText protocol: a browser extension hands the
//! content of a text field to a local editor, and both copies stay in sync
//! until either side closes.
//!
//! This crate is transport-agnostic. The HTTP/WebSocket surface lives in
//! `ghostsync-http`; here a session only sees channels of text frames.
//!
//! ## Key Concepts
//!
//! - **Session**: one editing handoff, from first message to teardown
//! - **EditorHost**: the editing surface a session drives
//! - **SyncMessage**: full-content payload exchanged in both directions

pub mod host;
pub mod protocol;
pub mod session;
pub mod transcript;

// Re-export commonly used types
pub use host::{EditorHost, EditorHostError, ExternalEditorHost, MemoryEditorHost};
pub use protocol::{DiscoveryResponse, SyncMessage, PROTOCOL_VERSION};
pub use session::{
    Session, SessionChannel, SessionConfig, SessionEnd, SessionError, SessionId, SessionState,
};
