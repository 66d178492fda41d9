//! The document state owned by the editor thread.
//!
//! Offsets and lengths are counted in chars (Unicode scalar values), so any
//! in-range position is a valid split point in the underlying `String`.
//!
//! Invariant: `selection.start + selection.length <= char_len()` after every
//! operation. `dirty` is cleared by new/open/save and set by every edit.

use std::fs;
use std::path::{Path, PathBuf};

use crate::EditorError;

/// A selected char range. A zero length means a bare caret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub length: usize,
}

impl Selection {
    pub fn caret(at: usize) -> Self {
        Self { start: at, length: 0 }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Read-only copy of the whole document, for get-text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub path: Option<PathBuf>,
    pub dirty: bool,
    pub length: usize,
    pub content: String,
}

/// Current selection and the text it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub start: usize,
    pub length: usize,
    pub text: String,
}

/// The single mutable document.
#[derive(Debug, Default)]
pub struct Document {
    path: Option<PathBuf>,
    dirty: bool,
    content: String,
    selection: Selection,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // File lifecycle
    // ========================================================================

    /// Discard the content and forget the path.
    pub fn new_document(&mut self) {
        self.content.clear();
        self.path = None;
        self.dirty = false;
        self.selection = Selection::default();
    }

    /// Load a file, replacing the content. Returns the canonical path.
    ///
    /// A missing file leaves the document untouched.
    pub fn open(&mut self, path: &Path) -> Result<PathBuf, EditorError> {
        let absolute = std::path::absolute(path).map_err(|e| EditorError::io(path, e))?;
        if !absolute.exists() {
            return Err(EditorError::NotFound(path.to_path_buf()));
        }
        let canonical = fs::canonicalize(&absolute).map_err(|e| EditorError::io(&absolute, e))?;
        let content = fs::read_to_string(&canonical).map_err(|e| EditorError::io(&canonical, e))?;

        self.content = content;
        self.path = Some(canonical.clone());
        self.dirty = false;
        self.selection = Selection::default();
        Ok(canonical)
    }

    /// Write the content to `path`, or to the current path when `None`.
    /// Returns the canonical path written, which becomes the current path.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf, EditorError> {
        let target = match path.filter(|p| !p.as_os_str().is_empty()) {
            Some(p) => std::path::absolute(p).map_err(|e| EditorError::io(p, e))?,
            None => self.path.clone().ok_or(EditorError::NoPath)?,
        };

        fs::write(&target, self.content.as_bytes()).map_err(|e| EditorError::io(&target, e))?;
        let canonical = fs::canonicalize(&target).map_err(|e| EditorError::io(&target, e))?;

        self.path = Some(canonical.clone());
        self.dirty = false;
        Ok(canonical)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn text(&self) -> &str {
        &self.content
    }

    pub fn snapshot(&self) -> TextSnapshot {
        TextSnapshot {
            path: self.path.clone(),
            dirty: self.dirty,
            length: self.char_len(),
            content: self.content.clone(),
        }
    }

    pub fn selection(&self) -> SelectionSnapshot {
        let from = self.byte_offset(self.selection.start);
        let to = self.byte_offset(self.selection.end());
        SelectionSnapshot {
            start: self.selection.start,
            length: self.selection.length,
            text: self.content[from..to].to_string(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Replace the whole content. Returns the new length in chars.
    pub fn set_text(&mut self, text: String) -> usize {
        self.content = text;
        self.selection = Selection::default();
        self.dirty = true;
        self.char_len()
    }

    /// Insert `text` before char `position`. The caret lands after the
    /// inserted text. Returns the number of chars inserted.
    pub fn insert(&mut self, text: &str, position: i64) -> Result<usize, EditorError> {
        let len = self.char_len();
        let at = usize::try_from(position)
            .ok()
            .filter(|p| *p <= len)
            .ok_or(EditorError::OutOfRange { position, len })?;

        let byte = self.byte_offset(at);
        self.content.insert_str(byte, text);

        let inserted = text.chars().count();
        self.selection = Selection::caret(at + inserted);
        self.dirty = true;
        Ok(inserted)
    }

    /// Select `length` chars starting at `start`.
    pub fn select(&mut self, start: i64, length: i64) -> Result<Selection, EditorError> {
        let len = self.char_len();
        let out_of_range = EditorError::SelectionOutOfRange { start, length, len };
        let (Ok(from), Ok(count)) = (usize::try_from(start), usize::try_from(length)) else {
            return Err(out_of_range);
        };
        match from.checked_add(count) {
            Some(end) if end <= len => {
                self.selection = Selection { start: from, length: count };
                Ok(self.selection)
            }
            _ => Err(out_of_range),
        }
    }

    /// Splice `text` over the selection. The new text stays selected.
    /// Returns the number of chars inserted.
    pub fn replace_selection(&mut self, text: &str) -> Result<usize, EditorError> {
        if self.selection.is_empty() {
            return Err(EditorError::NoSelection);
        }

        let from = self.byte_offset(self.selection.start);
        let to = self.byte_offset(self.selection.end());
        self.content.replace_range(from..to, text);

        let inserted = text.chars().count();
        self.selection = Selection {
            start: self.selection.start,
            length: inserted,
        };
        self.dirty = true;
        Ok(inserted)
    }

    /// Byte index of char `index`; `char_len()` maps to the end of the buffer.
    fn byte_offset(&self, index: usize) -> usize {
        self.content
            .char_indices()
            .nth(index)
            .map(|(byte, _)| byte)
            .unwrap_or(self.content.len())
    }
}
