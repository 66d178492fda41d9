//! Send+Sync command surface over the owned [`Document`].
//!
//! Every method marshals one closure onto the owner thread through the
//! dispatcher, so concurrent callers are serialized in enqueue order.

use std::path::PathBuf;

use scriptorium_dispatch::Dispatcher;

use crate::{Document, EditorError, Selection, SelectionSnapshot, TextSnapshot};

/// Cloneable handle to the document owner.
#[derive(Clone, Debug)]
pub struct EditorHandle {
    dispatcher: Dispatcher<Document>,
}

impl EditorHandle {
    pub fn new(dispatcher: Dispatcher<Document>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher<Document> {
        &self.dispatcher
    }

    // ── File lifecycle ──────────────────────────────────────────────────

    pub async fn new_document(&self) -> Result<(), EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("document_new", |doc| doc.new_document())
            .await?)
    }

    pub async fn open(&self, path: impl Into<PathBuf>) -> Result<PathBuf, EditorError> {
        let path = path.into();
        self.dispatcher
            .dispatch_async("document_open", move |doc| doc.open(&path))
            .await?
    }

    pub async fn save(&self, path: Option<PathBuf>) -> Result<PathBuf, EditorError> {
        self.dispatcher
            .dispatch_async("document_save", move |doc| doc.save(path.as_deref()))
            .await?
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> Result<TextSnapshot, EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("get_text", |doc| doc.snapshot())
            .await?)
    }

    pub async fn selection(&self) -> Result<SelectionSnapshot, EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("get_selection", |doc| doc.selection())
            .await?)
    }

    pub async fn current_path(&self) -> Result<Option<PathBuf>, EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("get_current_path", |doc| doc.path().map(PathBuf::from))
            .await?)
    }

    pub async fn is_dirty(&self) -> Result<bool, EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("get_dirty", |doc| doc.is_dirty())
            .await?)
    }

    // ── Edits ───────────────────────────────────────────────────────────

    pub async fn set_text(&self, text: String) -> Result<usize, EditorError> {
        Ok(self
            .dispatcher
            .dispatch_async("set_text", move |doc| doc.set_text(text))
            .await?)
    }

    pub async fn insert_text(&self, text: String, position: i64) -> Result<usize, EditorError> {
        self.dispatcher
            .dispatch_async("insert_text", move |doc| doc.insert(&text, position))
            .await?
    }

    pub async fn select(&self, start: i64, length: i64) -> Result<Selection, EditorError> {
        self.dispatcher
            .dispatch_async("set_selection", move |doc| doc.select(start, length))
            .await?
    }

    pub async fn replace_selection(&self, text: String) -> Result<usize, EditorError> {
        self.dispatcher
            .dispatch_async("replace_selection", move |doc| doc.replace_selection(&text))
            .await?
    }
}
