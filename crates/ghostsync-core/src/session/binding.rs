//! A session's document: backing file, open document and visible editor.

use crate::host::{DocumentId, EditorHost, EditorHostError, EditorId, Subscription};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Close and change subscriptions for one bound document.
#[derive(Debug, Default)]
pub struct DocumentSubscriptions {
    pub(crate) closed: Option<Subscription>,
    pub(crate) changed: Option<Subscription>,
}

impl DocumentSubscriptions {
    fn for_document(host: &dyn EditorHost, document: DocumentId) -> Self {
        Self {
            closed: Some(host.on_document_closed(document)),
            changed: Some(host.on_document_changed(document)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.closed.is_some() || self.changed.is_some()
    }

    pub fn release_all(&mut self) {
        if let Some(mut sub) = self.closed.take() {
            sub.release();
        }
        if let Some(mut sub) = self.changed.take() {
            sub.release();
        }
    }
}

/// Binds one editor-host document to a session.
///
/// Owns the temporary backing file; [`cleanup`](Self::cleanup) (or drop)
/// deletes it.
#[derive(Debug)]
pub struct DocumentBinding {
    document: DocumentId,
    editor: EditorId,
    path: PathBuf,
    backing: Option<TempPath>,
}

impl DocumentBinding {
    /// Allocate a backing file, open it as a document, subscribe to it and
    /// show it.
    ///
    /// Subscriptions exist before the editor is shown, so a close reported
    /// while showing is not lost. On failure the document is released and the
    /// backing file removed before returning.
    pub async fn open(
        host: &dyn EditorHost,
    ) -> Result<(Self, DocumentSubscriptions), EditorHostError> {
        let backing = host.allocate_temporary_file()?;
        let path = backing.to_path_buf();
        let document = host.open_document(&path).await?;
        let subscriptions = DocumentSubscriptions::for_document(host, document);

        let editor = match host.show_document(document).await {
            Ok(editor) => editor,
            Err(e) => {
                host.release_document(document);
                return Err(e);
            }
        };

        let binding = Self {
            document,
            editor,
            path,
            backing: Some(backing),
        };
        Ok((binding, subscriptions))
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn editor(&self) -> EditorId {
        self.editor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole document content in one host call.
    pub async fn replace_all(&self, host: &dyn EditorHost, text: &str) -> Result<(), EditorHostError> {
        host.replace_all_text(self.editor, text).await
    }

    pub async fn current_text(&self, host: &dyn EditorHost) -> Result<String, EditorHostError> {
        host.current_text(self.document).await
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.backing.is_none()
    }

    /// Release the document and delete the backing file. No-op after the
    /// first call.
    pub fn cleanup(&mut self, host: &dyn EditorHost) {
        if let Some(backing) = self.backing.take() {
            host.release_document(self.document);
            if let Err(e) = backing.close() {
                log::warn!("Failed to remove backing file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryEditorHost;
    use std::time::Duration;

    async fn open_binding(host: &MemoryEditorHost) -> DocumentBinding {
        DocumentBinding::open(host).await.unwrap().0
    }

    #[tokio::test]
    async fn open_creates_visible_document_on_backing_file() {
        let host = MemoryEditorHost::new();
        let binding = open_binding(&host).await;

        assert!(binding.path().exists());
        assert!(host.is_visible(binding.document()));
        assert_eq!(host.path_of(binding.document()).as_deref(), Some(binding.path()));
    }

    #[tokio::test]
    async fn replace_all_overwrites_content() {
        let host = MemoryEditorHost::new();
        let binding = open_binding(&host).await;

        binding.replace_all(&host, "first").await.unwrap();
        binding.replace_all(&host, "second").await.unwrap();
        assert_eq!(binding.current_text(&host).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let host = MemoryEditorHost::new();
        let mut binding = open_binding(&host).await;
        let path = binding.path().to_path_buf();

        binding.cleanup(&host);
        assert!(!path.exists());
        assert!(binding.is_cleaned_up());
        assert!(host.documents().is_empty());

        binding.cleanup(&host);
        assert!(binding.is_cleaned_up());
    }

    #[tokio::test]
    async fn drop_removes_backing_file() {
        let host = MemoryEditorHost::new();
        let binding = open_binding(&host).await;
        let path = binding.path().to_path_buf();
        drop(binding);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_open_reports_host_error() {
        let host = MemoryEditorHost::new();
        host.set_fail_open(true);
        let err = DocumentBinding::open(&host).await.unwrap_err();
        assert!(matches!(err, EditorHostError::Open { .. }));
        assert!(host.documents().is_empty());
    }

    #[tokio::test]
    async fn failed_show_releases_the_document() {
        let host = MemoryEditorHost::new();
        host.set_fail_show(true);

        let err = DocumentBinding::open(&host).await.unwrap_err();
        assert!(matches!(err, EditorHostError::Show(..)));
        assert!(host.documents().is_empty());
        assert_eq!(host.events().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_while_showing_is_observed() {
        let host = MemoryEditorHost::new();
        host.set_close_on_show(true);

        let (binding, mut subscriptions) = DocumentBinding::open(&host).await.unwrap();
        let closed = subscriptions.closed.as_mut().unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), closed.recv())
            .await
            .expect("close delivered")
            .unwrap();
        assert_eq!(event.document, binding.document());
    }

    #[tokio::test]
    async fn subscriptions_release_once() {
        let host = MemoryEditorHost::new();
        let (_binding, mut subscriptions) = DocumentBinding::open(&host).await.unwrap();
        assert!(subscriptions.is_active());
        assert_eq!(host.events().subscriber_count(), 2);

        subscriptions.release_all();
        subscriptions.release_all();
        assert!(!subscriptions.is_active());
        assert_eq!(host.events().subscriber_count(), 0);
    }
}
