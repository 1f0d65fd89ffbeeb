//! Outbound change debouncing.
//!
//! Editors may report a final change (often to empty content) just before
//! reporting the document closed. Holding every outbound send for a quiet
//! window gives the close a chance to cancel it.

use std::time::Duration;
use tokio::time::Instant;

/// Default quiet window before a local change is sent.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Holds at most one pending item. Scheduling again replaces the item and
/// restarts the window; cancelling drops it.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `item`, replacing anything pending.
    pub fn schedule(&mut self, item: T) {
        self.pending = Some((Instant::now() + self.window, item));
    }

    /// Drop the pending item, if any, and return it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, item)| item)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the quiet window to elapse and take the pending item.
    ///
    /// Never resolves while nothing is pending. Cancel-safe: dropping the
    /// future leaves the pending item in place.
    pub async fn ready(&mut self) -> T {
        let deadline = match &self.pending {
            Some((deadline, _)) => *deadline,
            None => std::future::pending().await,
        };
        tokio::time::sleep_until(deadline).await;
        match self.pending.take() {
            Some((_, item)) => item,
            None => std::future::pending().await,
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
