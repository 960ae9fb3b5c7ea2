//! The document registry: every currently-open document, keyed by URI.
//!
//! A single process-wide `Mutex<HashMap<_>>` would serialize unrelated
//! documents' edits behind one lock, defeating the point of having a
//! worker per document. `DashMap` shards internally so that edits to two
//! different files take different shard locks almost all the time.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::document::{AstReadyReceiver, Document, DocumentId};
use crate::error::{Result, ServerError};

/// A slot starts `Reserved` the instant `open` claims the URI (closing the
/// race between the `contains_key` check and the eventual insert) and
/// becomes `Ready` once the caller hands the spawned workers back via
/// `insert_workers`. Only `Ready` holds anything `Drop` needs to abort.
enum Slot {
    Reserved,
    Ready { document: Arc<Document>, parser_worker: JoinHandle<()>, diagnostics_worker: JoinHandle<()> },
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Slot::Ready { parser_worker, diagnostics_worker, .. } = self {
            parser_worker.abort();
            diagnostics_worker.abort();
        }
    }
}

#[derive(Default)]
pub struct DocumentRegistry {
    documents: DashMap<DocumentId, Slot>,
}

/// What the registry hands back when a document is opened, so the caller
/// can spawn the workers that belong to it. The registry owns the
/// `JoinHandle`s (and aborts them on close/drop); it does not spawn tasks
/// itself, since that would require it to know about the parser and
/// diagnostics publisher rather than just storing whatever the caller
/// already built.
pub struct Opened {
    pub document: Arc<Document>,
    pub ast_ready: AstReadyReceiver,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly opened document. Returns [`ServerError::AlreadyOpen`]
    /// if the client sends `didOpen` twice for the same URI without an
    /// intervening `didClose` — the check-and-reserve happens under a
    /// single `DashMap` entry lock, so two concurrent callers for the same
    /// URI can never both observe the slot as free.
    pub fn open(
        &self,
        uri: DocumentId,
        language_id: String,
        text: String,
        version: i32,
    ) -> Result<Opened> {
        match self.documents.entry(uri.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ServerError::AlreadyOpen(uri.to_string())),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Slot::Reserved);
                let (document, ast_ready) = Document::new(uri, language_id, text, version);
                Ok(Opened { document: Arc::new(document), ast_ready })
            }
        }
    }

    /// Finishes registering a document once its workers have been spawned,
    /// turning its `Reserved` slot `Ready`.
    pub fn insert_workers(
        &self,
        uri: DocumentId,
        document: Arc<Document>,
        parser_worker: JoinHandle<()>,
        diagnostics_worker: JoinHandle<()>,
    ) {
        self.documents.insert(uri, Slot::Ready { document, parser_worker, diagnostics_worker });
    }

    pub fn get(&self, uri: &DocumentId) -> Result<Arc<Document>> {
        self.documents
            .get(uri)
            .and_then(|entry| match &*entry {
                Slot::Ready { document, .. } => Some(document.clone()),
                Slot::Reserved => None,
            })
            .ok_or_else(|| ServerError::UnknownDocument(uri.to_string()))
    }

    pub async fn change(&self, uri: &DocumentId, new_text: String, new_version: i32) -> Result<()> {
        let document = self.get(uri)?;
        document.replace_text(new_text, new_version).await;
        Ok(())
    }

    /// Removes the document and aborts its workers (via `Entry`'s `Drop`).
    pub fn close(&self, uri: &DocumentId) -> Result<()> {
        self.documents
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| ServerError::UnknownDocument(uri.to_string()))
    }

    pub fn is_open(&self, uri: &DocumentId) -> bool {
        matches!(self.documents.get(uri).as_deref(), Some(Slot::Ready { .. }))
    }

    pub fn len(&self) -> usize {
        self.documents.iter().filter(|e| matches!(*e, Slot::Ready { .. })).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(name: &str) -> DocumentId {
        format!("file:///repo/{name}/BUILD").parse().unwrap()
    }

    fn spawn_noop() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn opening_the_same_uri_twice_without_close_is_rejected() {
        let registry = DocumentRegistry::new();
        let opened = registry.open(uri("a"), "build".into(), String::new(), 1).unwrap();
        registry.insert_workers(uri("a"), opened.document, spawn_noop(), spawn_noop());

        let err = registry.open(uri("a"), "build".into(), String::new(), 1).unwrap_err();
        assert!(matches!(err, ServerError::AlreadyOpen(_)));
    }

    #[tokio::test]
    async fn close_then_reopen_succeeds() {
        let registry = DocumentRegistry::new();
        let opened = registry.open(uri("a"), "build".into(), String::new(), 1).unwrap();
        registry.insert_workers(uri("a"), opened.document, spawn_noop(), spawn_noop());
        registry.close(&uri("a")).unwrap();
        assert!(!registry.is_open(&uri("a")));

        let reopened = registry.open(uri("a"), "build".into(), String::new(), 1);
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn change_on_unknown_document_is_an_error() {
        let registry = DocumentRegistry::new();
        let err = registry.change(&uri("missing"), String::new(), 1).await.unwrap_err();
        assert!(matches!(err, ServerError::UnknownDocument(_)));
    }

    #[tokio::test]
    async fn close_on_unknown_document_is_an_error() {
        let registry = DocumentRegistry::new();
        assert!(registry.close(&uri("missing")).is_err());
    }
}
