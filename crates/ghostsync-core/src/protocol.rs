//! Wire types for the GhostText protocol.
//!
//! Two payloads cross the wire:
//! - [`DiscoveryResponse`] - the JSON body returned by the discovery endpoint
//! - [`SyncMessage`] - the text frame exchanged on a session channel, in both directions

use serde::{Deserialize, Serialize};

/// Protocol version advertised by the discovery endpoint.
pub const PROTOCOL_VERSION: u32 = 1;

/// Syntax value sent with outbound changes. Syntax detection is not implemented.
pub const PLACEHOLDER_SYNTAX: &str = "TODO";

/// A selected range in the remote text field.
///
/// Carried on the wire, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

/// Full-content sync payload.
///
/// `text` is always the entire document, never a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub syntax: String,
    #[serde(default)]
    pub selections: Vec<Selection>,
}

impl SyncMessage {
    /// Build the message reporting a local edit back to the remote peer.
    pub fn local_change(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            syntax: PLACEHOLDER_SYNTAX.to_string(),
            selections: Vec::new(),
        }
    }

    /// Decode an inbound text frame.
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// Encode for an outbound text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Body of the discovery response: where the new session channel listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryResponse {
    pub protocol_version: u32,
    pub web_socket_port: u16,
}

impl DiscoveryResponse {
    pub fn new(web_socket_port: u16) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            web_socket_port,
        }
    }
}
