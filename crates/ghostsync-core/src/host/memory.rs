//! In-process editor host.
//!
//! Documents live in a map behind a mutex. Every write, including the ones a
//! session makes on behalf of the remote peer, is followed by a change
//! notification, the way a real editor reports programmatic edits.

use super::{DocumentEvent, DocumentEventBus, DocumentId, EditorHost, EditorHostError, EditorId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemoryDocument {
    path: PathBuf,
    text: String,
    visible: bool,
    closed: bool,
}

/// Editor host that keeps documents in memory.
#[derive(Default)]
pub struct MemoryEditorHost {
    documents: Mutex<HashMap<DocumentId, MemoryDocument>>,
    next_id: AtomicU64,
    fail_open: AtomicBool,
    fail_show: AtomicBool,
    close_on_show: AtomicBool,
    events: DocumentEventBus,
}

impl MemoryEditorHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `open_document` fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `show_document` fail.
    pub fn set_fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    /// Close each document as soon as it is shown, like an editor that
    /// returns immediately.
    pub fn set_close_on_show(&self, close: bool) {
        self.close_on_show.store(close, Ordering::SeqCst);
    }

    /// Simulate the user typing: replace the text and notify.
    pub fn user_edit(&self, document: DocumentId, text: &str) -> Result<(), EditorHostError> {
        {
            let mut docs = self.lock();
            let doc = docs
                .get_mut(&document)
                .ok_or(EditorHostError::UnknownDocument(document))?;
            if doc.closed {
                return Err(EditorHostError::Closed(document));
            }
            doc.text = text.to_string();
        }
        self.events.emit(DocumentEvent::changed(document));
        Ok(())
    }

    /// Simulate the user closing the document.
    pub fn close_document(&self, document: DocumentId) -> Result<(), EditorHostError> {
        self.mark_closed(document)?;
        self.events.emit(DocumentEvent::closed(document));
        Ok(())
    }

    /// Emit a change notification without touching the text.
    pub fn notify_changed(&self, document: DocumentId) {
        self.events.emit(DocumentEvent::changed(document));
    }

    /// Current text, even for closed documents.
    pub fn text_of(&self, document: DocumentId) -> Option<String> {
        self.lock().get(&document).map(|doc| doc.text.clone())
    }

    pub fn path_of(&self, document: DocumentId) -> Option<PathBuf> {
        self.lock().get(&document).map(|doc| doc.path.clone())
    }

    pub fn is_visible(&self, document: DocumentId) -> bool {
        self.lock().get(&document).is_some_and(|doc| doc.visible)
    }

    /// Documents opened and not yet released, in open order.
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, MemoryDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_closed(&self, document: DocumentId) -> Result<(), EditorHostError> {
        let mut docs = self.lock();
        let doc = docs
            .get_mut(&document)
            .ok_or(EditorHostError::UnknownDocument(document))?;
        doc.closed = true;
        doc.visible = false;
        Ok(())
    }

    fn open_doc(&self, document: DocumentId) -> Result<(), EditorHostError> {
        match self.lock().get(&document) {
            None => Err(EditorHostError::UnknownDocument(document)),
            Some(doc) if doc.closed => Err(EditorHostError::Closed(document)),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl EditorHost for MemoryEditorHost {
    async fn open_document(&self, path: &Path) -> Result<DocumentId, EditorHostError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(EditorHostError::Open {
                path: path.to_path_buf(),
                reason: "opening disabled".to_string(),
            });
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EditorHostError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let id = DocumentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock().insert(
            id,
            MemoryDocument {
                path: path.to_path_buf(),
                text,
                visible: false,
                closed: false,
            },
        );
        Ok(id)
    }

    async fn show_document(&self, document: DocumentId) -> Result<EditorId, EditorHostError> {
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(EditorHostError::Show(document, "showing disabled".to_string()));
        }
        {
            let mut docs = self.lock();
            let doc = docs
                .get_mut(&document)
                .ok_or(EditorHostError::UnknownDocument(document))?;
            if doc.closed {
                return Err(EditorHostError::Show(document, "document is closed".to_string()));
            }
            doc.visible = true;
        }
        if self.close_on_show.load(Ordering::SeqCst) {
            self.close_document(document)?;
        }
        Ok(EditorId(document.0))
    }

    async fn replace_all_text(&self, editor: EditorId, text: &str) -> Result<(), EditorHostError> {
        let document = DocumentId(editor.0);
        {
            let mut docs = self.lock();
            let doc = docs
                .get_mut(&document)
                .ok_or(EditorHostError::UnknownEditor(editor))?;
            if doc.closed {
                return Err(EditorHostError::Closed(document));
            }
            doc.text = text.to_string();
        }
        self.events.emit(DocumentEvent::changed(document));
        Ok(())
    }

    async fn current_text(&self, document: DocumentId) -> Result<String, EditorHostError> {
        self.open_doc(document)?;
        self.text_of(document)
            .ok_or(EditorHostError::UnknownDocument(document))
    }

    fn release_document(&self, document: DocumentId) {
        if self.lock().remove(&document).is_some() {
            log::debug!("Released {}", document);
        }
    }

    fn events(&self) -> &DocumentEventBus {
        &self.events
    }
}
