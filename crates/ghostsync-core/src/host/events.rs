//! Document notifications published by an editor host.
//!
//! Hosts emit [`DocumentEvent`]s on a [`DocumentEventBus`]. Sessions hold one
//! [`Subscription`] per event kind for the document they own; dropping or
//! releasing a subscription unsubscribes it.

use super::DocumentId;
use tokio::sync::broadcast;

/// Default channel capacity for the bus.
/// Subscribers further behind than this miss events (lag).
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEventKind {
    /// Content of the document changed (user edit or programmatic write).
    Changed,
    /// The document was closed by the user.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentEvent {
    pub kind: DocumentEventKind,
    pub document: DocumentId,
}

impl DocumentEvent {
    pub fn changed(document: DocumentId) -> Self {
        Self {
            kind: DocumentEventKind::Changed,
            document,
        }
    }

    pub fn closed(document: DocumentId) -> Self {
        Self {
            kind: DocumentEventKind::Closed,
            document,
        }
    }
}

/// Broadcasts document events to every live subscription.
pub struct DocumentEventBus {
    sender: broadcast::Sender<DocumentEvent>,
}

impl DocumentEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns how many subscriptions saw it.
    pub fn emit(&self, event: DocumentEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events of `kind` for `document`.
    pub fn subscribe(&self, kind: DocumentEventKind, document: DocumentId) -> Subscription {
        Subscription {
            kind,
            document,
            receiver: Some(self.sender.subscribe()),
        }
    }

    /// Number of subscriptions that have not been released.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DocumentEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered view of the bus: one event kind, one document.
#[derive(Debug)]
pub struct Subscription {
    kind: DocumentEventKind,
    document: DocumentId,
    receiver: Option<broadcast::Receiver<DocumentEvent>>,
}

impl Subscription {
    pub fn kind(&self) -> DocumentEventKind {
        self.kind
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn is_released(&self) -> bool {
        self.receiver.is_none()
    }

    /// Wait for the next matching event.
    ///
    /// Returns `None` once released or once the bus is gone.
    pub async fn recv(&mut self) -> Option<DocumentEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) if event.kind == self.kind && event.document == self.document => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    log::warn!("Subscription for {} lagged by {} events", self.document, count);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Unsubscribe. Safe to call more than once.
    pub fn release(&mut self) {
        self.receiver = None;
    }
}
