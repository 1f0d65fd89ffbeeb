//! The per-connection sync state machine.
//!
//! ```text
//! Unbound --first SyncMessage--> Bound --document closed / channel closed--> Closed
//!                                  ^  |
//!                                  +--+ SyncMessage (remote write)
//!                                       document changed (debounced send)
//! ```

use super::{
    Debouncer, DocumentBinding, DocumentSubscriptions, EchoSuppressor, SessionChannel,
    SessionConfig, SessionEnd, SessionError, SessionId, SessionState,
};
use crate::host::{DocumentEvent, DocumentId, EditorHost, EditorHostError, Subscription};
use crate::protocol::SyncMessage;
use crate::transcript::{Direction, Transcript};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// One editing handoff between a remote text field and a local document.
pub struct Session {
    id: SessionId,
    host: Arc<dyn EditorHost>,
    title: Option<String>,
    binding: Option<DocumentBinding>,
    echo: EchoSuppressor,
    debouncer: Debouncer<SyncMessage>,
    subscriptions: DocumentSubscriptions,
    closed: bool,
    transcript: Transcript,
}

impl Session {
    pub fn new(host: Arc<dyn EditorHost>, config: &SessionConfig) -> Self {
        Self::with_id(SessionId::new(), host, config)
    }

    pub fn with_id(id: SessionId, host: Arc<dyn EditorHost>, config: &SessionConfig) -> Self {
        let transcript = Transcript::open(config.transcript_dir.as_deref(), &id.0);
        Self {
            id,
            host,
            title: None,
            binding: None,
            echo: EchoSuppressor::new(),
            debouncer: Debouncer::new(config.debounce_window),
            subscriptions: DocumentSubscriptions::default(),
            closed: false,
            transcript,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Title recorded from the first inbound message.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.binding.is_some() {
            SessionState::Bound
        } else {
            SessionState::Unbound
        }
    }

    pub fn document(&self) -> Option<DocumentId> {
        self.binding.as_ref().map(|b| b.document())
    }

    /// Whether a local change is waiting for its debounce window.
    pub fn has_pending_send(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Decode and apply one inbound text frame.
    pub async fn handle_frame(&mut self, frame: &str) -> Result<(), SessionError> {
        self.transcript.record(Direction::In, frame);
        let message = SyncMessage::decode(frame).map_err(SessionError::Decode)?;
        self.apply_remote(message).await
    }

    /// Bind on the first message, then mirror the remote text into the document.
    pub async fn apply_remote(&mut self, message: SyncMessage) -> Result<(), SessionError> {
        if self.closed {
            log::debug!("Session {}: ignoring message after close", self.id);
            return Ok(());
        }

        if self.binding.is_none() {
            self.bind(&message.title).await?;
        }
        let Some(binding) = self.binding.as_ref() else {
            return Ok(());
        };

        // Remote text is newer than any local edit still waiting to go out.
        if self.debouncer.cancel().is_some() {
            log::debug!("Session {}: remote update superseded pending send", self.id);
        }
        self.echo.record_remote(&message.text);
        binding.replace_all(self.host.as_ref(), &message.text).await?;
        Ok(())
    }

    async fn bind(&mut self, title: &str) -> Result<(), SessionError> {
        let (binding, subscriptions) = DocumentBinding::open(self.host.as_ref()).await?;
        let document = binding.document();

        log::info!(
            "Session {}: bound '{}' to {} ({})",
            self.id,
            title,
            document,
            binding.path().display()
        );
        self.transcript
            .record(Direction::Event, &format!("bound {} title={:?}", document, title));

        self.title = Some(title.to_string());
        self.subscriptions = subscriptions;
        self.binding = Some(binding);
        Ok(())
    }

    /// React to a change notification: schedule a send unless it is our own echo.
    pub async fn handle_document_changed(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        let Some(binding) = self.binding.as_ref() else {
            return Ok(());
        };

        let text = binding.current_text(self.host.as_ref()).await?;
        if self.echo.is_echo(&text) {
            log::trace!("Session {}: suppressed echo of remote write", self.id);
            return Ok(());
        }

        let title = self.title.clone().unwrap_or_default();
        self.debouncer.schedule(SyncMessage::local_change(title, text));
        Ok(())
    }

    /// React to a close notification. Returns `true` when it closed this session.
    pub fn handle_document_closed(&mut self, document: DocumentId) -> bool {
        if self.document() != Some(document) {
            return false;
        }
        log::info!("Session {}: document closed by user", self.id);
        self.teardown()
    }

    /// Release everything the session holds.
    ///
    /// Returns `true` only for the call that actually tore down.
    pub fn teardown(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        if let Some(discarded) = self.debouncer.cancel() {
            log::debug!(
                "Session {}: discarded pending send of {} bytes",
                self.id,
                discarded.text.len()
            );
        }
        self.subscriptions.release_all();
        if let Some(binding) = self.binding.as_mut() {
            binding.cleanup(self.host.as_ref());
        }
        self.transcript.record(Direction::Event, "closed");
        true
    }

    /// Drive the session until the channel or the document closes.
    ///
    /// Always tears down before returning; dropping `outbound` closes the channel.
    pub async fn run(mut self, channel: SessionChannel) -> Result<SessionEnd, SessionError> {
        let SessionChannel {
            mut inbound,
            outbound,
            mut shutdown,
        } = channel;

        log::debug!("Session {}: channel connected", self.id);
        let result = self.drive(&mut inbound, &outbound, &mut shutdown).await;
        self.teardown();

        match &result {
            Ok(end) => log::info!("Session {}: ended ({:?})", self.id, end),
            Err(e) => {
                log::warn!("Session {}: failed: {}", self.id, e);
                self.transcript.record(Direction::Event, &e.to_string());
            }
        }
        result
    }

    async fn drive(
        &mut self,
        inbound: &mut mpsc::Receiver<String>,
        outbound: &mpsc::Sender<String>,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> Result<SessionEnd, SessionError> {
        loop {
            tokio::select! {
                frame = inbound.recv() => {
                    let Some(frame) = frame else {
                        return Ok(SessionEnd::ChannelClosed);
                    };
                    match self.handle_frame(&frame).await {
                        Err(e) if document_gone(&e) => return Ok(SessionEnd::DocumentClosed),
                        other => other?,
                    }
                }
                Some(event) = next_event(&mut self.subscriptions.closed) => {
                    if self.handle_document_closed(event.document) {
                        return Ok(SessionEnd::DocumentClosed);
                    }
                }
                Some(_) = next_event(&mut self.subscriptions.changed) => {
                    match self.handle_document_changed().await {
                        // The close notification is right behind this one.
                        Err(e) if document_gone(&e) => return Ok(SessionEnd::DocumentClosed),
                        other => other?,
                    }
                }
                message = self.debouncer.ready() => {
                    if !self.send(outbound, message).await {
                        return Ok(SessionEnd::ChannelClosed);
                    }
                }
                _ = shutdown_requested(shutdown) => {
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    /// Send one outbound message. Returns `false` when the channel is gone.
    async fn send(&mut self, outbound: &mpsc::Sender<String>, message: SyncMessage) -> bool {
        if self.closed {
            return true;
        }
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Session {}: failed to encode change: {}", self.id, e);
                return true;
            }
        };
        self.transcript.record(Direction::Out, &frame);
        outbound.send(frame).await.is_ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The bound document was closed or dropped by the host under the session.
fn document_gone(err: &SessionError) -> bool {
    matches!(
        err,
        SessionError::EditorHost(
            EditorHostError::Closed(_)
                | EditorHostError::UnknownDocument(_)
                | EditorHostError::UnknownEditor(_)
        )
    )
}

async fn next_event(sub: &mut Option<Subscription>) -> Option<DocumentEvent> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without signalling; nothing will ever ask us to stop.
            return std::future::pending().await;
        }
    }
}
