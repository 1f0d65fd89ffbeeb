//! Editor host backed by an external editor process.
//!
//! The backing file is handed to a user-configured command (`code --wait`,
//! `gvim -f`, ...). A watcher task polls the file for content changes and
//! reports the document closed once the editor process exits, so the command
//! must block until the user is done editing.

use super::{DocumentEvent, DocumentEventBus, DocumentId, EditorHost, EditorHostError, EditorId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;

/// Default interval between file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ExternalEditorConfig {
    /// Editor command line; the file path is appended as the last argument.
    pub command: String,
    /// How often the backing file is checked for edits.
    pub poll_interval: Duration,
}

impl ExternalEditorConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

struct ExternalDocument {
    path: PathBuf,
    /// Content as last written by us or last reported as changed.
    last_seen: String,
    editor_started: bool,
    closed: bool,
}

type DocumentSlot = Arc<tokio::sync::Mutex<ExternalDocument>>;

/// A registered document and the signal that stops its watcher.
struct TrackedDocument {
    slot: DocumentSlot,
    released: Arc<Notify>,
}

type DocumentMap = Arc<Mutex<HashMap<DocumentId, TrackedDocument>>>;

pub struct ExternalEditorHost {
    config: ExternalEditorConfig,
    documents: DocumentMap,
    next_id: AtomicU64,
    events: Arc<DocumentEventBus>,
}

impl ExternalEditorHost {
    pub fn new(config: ExternalEditorConfig) -> Self {
        Self {
            config,
            documents: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            events: Arc::new(DocumentEventBus::new()),
        }
    }

    fn tracked(&self, document: DocumentId) -> Result<(DocumentSlot, Arc<Notify>), EditorHostError> {
        lock_documents(&self.documents)
            .get(&document)
            .map(|tracked| (Arc::clone(&tracked.slot), Arc::clone(&tracked.released)))
            .ok_or(EditorHostError::UnknownDocument(document))
    }

    fn slot(&self, document: DocumentId) -> Result<DocumentSlot, EditorHostError> {
        self.tracked(document).map(|(slot, _)| slot)
    }

    /// Number of documents opened and not yet released or closed.
    #[cfg(test)]
    fn open_documents(&self) -> usize {
        lock_documents(&self.documents).len()
    }

    fn build_command(&self, path: &Path) -> Result<Command, String> {
        let parts = shlex::split(&self.config.command)
            .ok_or_else(|| format!("Invalid editor command: {}", self.config.command))?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| "Empty editor command".to_string())?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(path);
        Ok(cmd)
    }
}

#[async_trait]
impl EditorHost for ExternalEditorHost {
    async fn open_document(&self, path: &Path) -> Result<DocumentId, EditorHostError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EditorHostError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let id = DocumentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let slot = Arc::new(tokio::sync::Mutex::new(ExternalDocument {
            path: path.to_path_buf(),
            last_seen: text,
            editor_started: false,
            closed: false,
        }));
        lock_documents(&self.documents).insert(
            id,
            TrackedDocument {
                slot,
                released: Arc::new(Notify::new()),
            },
        );
        Ok(id)
    }

    async fn show_document(&self, document: DocumentId) -> Result<EditorId, EditorHostError> {
        let (slot, released) = self.tracked(document)?;
        let mut doc = slot.lock().await;
        if doc.closed {
            return Err(EditorHostError::Show(document, "document is closed".to_string()));
        }
        if doc.editor_started {
            return Ok(EditorId(document.0));
        }

        let mut cmd = self
            .build_command(&doc.path)
            .map_err(|e| EditorHostError::Show(document, e))?;
        let child = cmd.spawn().map_err(|e| {
            EditorHostError::Show(document, format!("Failed to run '{}': {}", self.config.command, e))
        })?;
        doc.editor_started = true;
        drop(doc);

        log::info!("Opened {} in '{}'", document, self.config.command);
        tokio::spawn(watch_document(
            document,
            slot,
            child,
            Watch {
                documents: Arc::clone(&self.documents),
                released,
                events: Arc::clone(&self.events),
                poll_interval: self.config.poll_interval,
            },
        ));

        Ok(EditorId(document.0))
    }

    async fn replace_all_text(&self, editor: EditorId, text: &str) -> Result<(), EditorHostError> {
        let document = DocumentId(editor.0);
        let slot = self
            .slot(document)
            .map_err(|_| EditorHostError::UnknownEditor(editor))?;
        let mut doc = slot.lock().await;
        if doc.closed {
            return Err(EditorHostError::Closed(document));
        }

        // Write-then-rename so a poll never sees half the new content.
        let staging = doc.path.with_extension("ghostsync-staging");
        tokio::fs::write(&staging, text)
            .await
            .map_err(|e| EditorHostError::Edit(e.to_string()))?;
        tokio::fs::rename(&staging, &doc.path)
            .await
            .map_err(|e| EditorHostError::Edit(e.to_string()))?;
        doc.last_seen = text.to_string();
        drop(doc);

        self.events.emit(DocumentEvent::changed(document));
        Ok(())
    }

    async fn current_text(&self, document: DocumentId) -> Result<String, EditorHostError> {
        let slot = self.slot(document)?;
        let doc = slot.lock().await;
        Ok(tokio::fs::read_to_string(&doc.path).await?)
    }

    fn release_document(&self, document: DocumentId) {
        if let Some(tracked) = lock_documents(&self.documents).remove(&document) {
            // Stores a permit, so a watcher that has not started yet still sees it.
            tracked.released.notify_one();
            log::debug!("Released {}", document);
        }
    }

    fn events(&self) -> &DocumentEventBus {
        &self.events
    }
}

fn lock_documents(
    documents: &Mutex<HashMap<DocumentId, TrackedDocument>>,
) -> std::sync::MutexGuard<'_, HashMap<DocumentId, TrackedDocument>> {
    documents
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a document watcher needs from its host.
struct Watch {
    documents: DocumentMap,
    released: Arc<Notify>,
    events: Arc<DocumentEventBus>,
    poll_interval: Duration,
}

/// Poll the backing file until the editor process exits or the owner
/// releases the document.
async fn watch_document(
    document: DocumentId,
    slot: DocumentSlot,
    mut child: tokio::process::Child,
    watch: Watch,
) {
    let Watch {
        documents,
        released,
        events,
        poll_interval,
    } = watch;
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = released.notified() => {
                log::debug!("Stopped watching released {}", document);
                return;
            }
            status = child.wait() => {
                match status {
                    Ok(status) => log::debug!("Editor for {} exited: {}", document, status),
                    Err(e) => log::warn!("Failed to wait for editor of {}: {}", document, e),
                }
                break;
            }
            _ = interval.tick() => {
                let mut doc = slot.lock().await;
                let read = tokio::fs::read_to_string(&doc.path).await;
                match read {
                    Ok(text) if text != doc.last_seen => {
                        doc.last_seen = text;
                        drop(doc);
                        events.emit(DocumentEvent::changed(document));
                    }
                    Ok(_) => {}
                    // The file is gone once the session cleaned up; nothing left to watch.
                    Err(e) => {
                        log::debug!("Stopped watching {}: {}", document, e);
                        break;
                    }
                }
            }
        }
    }

    slot.lock().await.closed = true;
    lock_documents(&documents).remove(&document);
    events.emit(DocumentEvent::closed(document));
}
