//! The editor host seam.
//!
//! A session never edits text itself. It drives an [`EditorHost`], which owns
//! the actual editing surface: it opens a backing file as a document, shows it,
//! applies full-content replacements, and reports user edits and closes
//! through the [`DocumentEventBus`].
//!
//! Two hosts ship with the crate:
//! - [`MemoryEditorHost`] - documents live in memory; used for embedding and tests
//! - [`ExternalEditorHost`] - opens the backing file in an external editor process

mod events;
mod external;
mod memory;

pub use events::{DocumentEvent, DocumentEventBus, DocumentEventKind, Subscription};
pub use external::{ExternalEditorConfig, ExternalEditorHost};
pub use memory::MemoryEditorHost;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;

/// Identifies a document opened by an editor host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// Identifies the visible editor showing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditorId(pub u64);

#[derive(Error, Debug)]
pub enum EditorHostError {
    #[error("Failed to allocate temporary file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Failed to open document {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Failed to show document {0}: {1}")]
    Show(DocumentId, String),

    #[error("Failed to edit document: {0}")]
    Edit(String),

    #[error("Unknown or released document: {0}")]
    UnknownDocument(DocumentId),

    #[error("Unknown editor: {0:?}")]
    UnknownEditor(EditorId),

    #[error("Document {0} is closed")]
    Closed(DocumentId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capabilities a session needs from the editing surface.
///
/// Implementations must be shareable across sessions; every session only ever
/// touches the documents it opened itself.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Create an empty backing file. The file is deleted when the returned path is released.
    fn allocate_temporary_file(&self) -> Result<TempPath, EditorHostError> {
        tempfile::Builder::new()
            .prefix("ghostsync-")
            .suffix(".txt")
            .tempfile()
            .map(|file| file.into_temp_path())
            .map_err(EditorHostError::TempFile)
    }

    /// Open the file at `path` as an editable document.
    async fn open_document(&self, path: &Path) -> Result<DocumentId, EditorHostError>;

    /// Make the document visible to the user.
    async fn show_document(&self, document: DocumentId) -> Result<EditorId, EditorHostError>;

    /// Replace the entire content in one step.
    ///
    /// Change notifications must never observe a partially replaced document.
    async fn replace_all_text(&self, editor: EditorId, text: &str) -> Result<(), EditorHostError>;

    /// Full current content of the document.
    async fn current_text(&self, document: DocumentId) -> Result<String, EditorHostError>;

    /// Forget `document`. Called once by its owner; unknown ids are ignored.
    ///
    /// Synchronous so sessions can release from `Drop`.
    fn release_document(&self, document: DocumentId);

    /// The bus this host publishes change and close notifications on.
    fn events(&self) -> &DocumentEventBus;

    /// Subscribe to close notifications for `document`.
    fn on_document_closed(&self, document: DocumentId) -> Subscription {
        self.events().subscribe(DocumentEventKind::Closed, document)
    }

    /// Subscribe to change notifications for `document`.
    fn on_document_changed(&self, document: DocumentId) -> Subscription {
        self.events().subscribe(DocumentEventKind::Changed, document)
    }
}
