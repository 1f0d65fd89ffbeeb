//! Echo suppression.
//!
//! Writing remote text into the document makes the editor report a change.
//! That change must not travel back to the remote peer.

/// Remembers the last text written on behalf of the remote peer.
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    last_remote: Option<String>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record remote text. Call before the text is written to the document.
    pub fn record_remote(&mut self, text: &str) {
        self.last_remote = Some(text.to_string());
    }

    /// True when `current` is exactly what the remote side last wrote.
    pub fn is_echo(&self, current: &str) -> bool {
        self.last_remote.as_deref() == Some(current)
    }

    pub fn last_remote(&self) -> Option<&str> {
        self.last_remote.as_deref()
    }
}
