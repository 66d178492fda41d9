//! The editor document and its owner thread.
//!
//! [`Document`] holds the path, dirty flag, text and selection. It lives on
//! exactly one thread, spawned by [`spawn_editor`]; everything else talks to
//! it through an [`EditorHandle`].

mod document;
mod error;
mod handle;

use std::path::PathBuf;

use scriptorium_dispatch::{DispatchError, Owner, OwnerHandle, ReadyWait};

pub use document::{Document, Selection, SelectionSnapshot, TextSnapshot};
pub use error::{EditorError, ErrorKind};
pub use handle::EditorHandle;

/// Name of the document owner thread.
pub const OWNER_THREAD_NAME: &str = "document-owner";

/// Spawn the document owner thread.
///
/// When `initial` is given, the file is opened on the owner thread before the
/// startup gate opens; a failure is logged and leaves an empty document.
pub fn spawn_editor(
    initial: Option<PathBuf>,
) -> Result<(EditorHandle, OwnerHandle, ReadyWait), DispatchError> {
    let mut builder = Owner::builder::<Document>(OWNER_THREAD_NAME);
    if let Some(path) = initial {
        builder = builder.on_ready(move |dispatcher| {
            match dispatcher.dispatch("document_open", move |doc| doc.open(&path)) {
                Ok(Ok(opened)) => tracing::info!(path = %opened.display(), "Opened initial document"),
                Ok(Err(e)) => tracing::warn!("Initial document not opened: {e}"),
                Err(e) => tracing::warn!("Initial document not opened: {e}"),
            }
        });
    }

    let (dispatcher, owner, ready) = builder.spawn(Document::new)?;
    Ok((EditorHandle::new(dispatcher), owner, ready))
}
